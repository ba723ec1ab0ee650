use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use transcript_host::observability::init_tracing;
use transcript_host::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;
	init_tracing(&config)?;

	info!(engine = ?config.engine, bind = %config.bind_addr(), "🎯 Starting transcript host");

	let config = Arc::new(config);
	let state = AppState::build(config.clone()).await?;

	let recovered = state.recover().await?;
	if recovered > 0 {
		warn!(recovered, "Cleaned up after a previous run");
	}

	let pool = state.runner.pipeline().pool().clone();
	let app = build_router(state);

	let listener = TcpListener::bind(config.bind_addr()).await?;
	info!("listening on {}", listener.local_addr()?);

	let shutdown_token = CancellationToken::new();
	let signal_shutdown_token = shutdown_token.clone();
	tokio::spawn(async move {
		tokio::signal::ctrl_c().await.ok();
		info!("Received Ctrl+C, initiating shutdown...");
		signal_shutdown_token.cancel();
	});

	let server_token = shutdown_token.clone();
	axum::serve(listener, app)
		.with_graceful_shutdown(async move {
			server_token.cancelled().await;
		})
		.await?;
	info!("Server stopped");

	// Jobs still running are failed by the recovery sweep on next start.
	pool.shutdown();

	info!("Shutdown complete");
	Ok(())
}
