pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod observability;
pub mod routes;
pub mod store;

pub use config::*;
pub use error::TranscriptHostError;
pub use jobs::JobRunner;
pub use store::{JobId, JobRecord, JobState, JobStore, StoreError};

use crate::routes::{health::get_health, transcribe::post_transcribe, transcript::get_transcript};
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;
use transcribe_pipeline::{AudioUtility, CommandEngine, FfmpegAudio, Pipeline, Segmenter, TranscriptionEngine, WorkerPool};

#[derive(Clone)]
pub struct AppState {
	pub config: Arc<Config>,
	pub runner: JobRunner,
}

impl FromRef<AppState> for Arc<Config> {
	fn from_ref(state: &AppState) -> Self {
		state.config.clone()
	}
}

impl FromRef<AppState> for JobRunner {
	fn from_ref(state: &AppState) -> Self {
		state.runner.clone()
	}
}

impl AppState {
	/// Wire the configured engine and ffmpeg tooling into a runner.
	pub async fn build(config: Arc<Config>) -> anyhow::Result<Self> {
		let engine = build_engine(&config)?;
		let audio: Arc<dyn AudioUtility> = Arc::new(FfmpegAudio::new(&config.ffmpeg_bin, &config.ffprobe_bin, config.sample_rate));

		Self::with_backends(config, engine, audio).await
	}

	/// Same wiring as [`AppState::build`] with caller supplied backends.
	pub async fn with_backends(config: Arc<Config>, engine: Arc<dyn TranscriptionEngine>, audio: Arc<dyn AudioUtility>) -> anyhow::Result<Self> {
		tokio::fs::create_dir_all(config.uploads_dir()).await?;
		tokio::fs::create_dir_all(config.scratch_dir()).await?;

		let store = JobStore::open(config.jobs_dir()).await?;
		let segmenter = Segmenter::new(config.chunk_seconds, config.overlap_seconds)?;
		let pool = Arc::new(WorkerPool::new(engine, audio, config.max_workers, config.scratch_dir()));

		info!(
			engine = pool.engine_name(),
			max_workers = pool.max_workers(),
			chunk_secs = segmenter.chunk_secs(),
			overlap_secs = segmenter.overlap_secs(),
			data_dir = %config.data_dir.display(),
			"🔧 Pipeline ready"
		);

		let runner = JobRunner::new(store, Pipeline::new(segmenter, pool));
		Ok(Self { config, runner })
	}

	/// Startup sweep: fail jobs a previous run left unfinished, then drop its orphaned files.
	pub async fn recover(&self) -> Result<usize, StoreError> {
		let interrupted = self.runner.recover_interrupted().await?;
		let orphans = self.runner.sweep_orphans(&self.config.uploads_dir(), &self.config.scratch_dir()).await?;
		Ok(interrupted + orphans)
	}
}

fn build_engine(config: &Config) -> anyhow::Result<Arc<dyn TranscriptionEngine>> {
	match config.engine {
		EngineKind::Command => Ok(Arc::new(CommandEngine::new(config.engine_command.clone(), config.engine_argv()))),
		#[cfg(feature = "whisper")]
		EngineKind::Whisper => {
			let model = config
				.whisper_model_path
				.as_deref()
				.ok_or_else(|| anyhow::anyhow!("the whisper engine needs --whisper-model-path"))?;
			Ok(Arc::new(transcribe_pipeline::WhisperEngine::load(model, config.whisper_threads)?))
		}
		#[cfg(not(feature = "whisper"))]
		EngineKind::Whisper => anyhow::bail!("this build has no in-process whisper engine; rebuild with `--features whisper`"),
	}
}

/// Every route plus the HTTP middleware stack.
pub fn build_router(state: AppState) -> Router {
	let max_upload_bytes = state.config.max_upload_bytes();

	Router::new()
		.merge(post_transcribe())
		.merge(get_transcript())
		.merge(get_health())
		.route("/metrics", get(metrics::http::metrics_handler))
		.with_state(state)
		.layer(axum::middleware::from_fn(metrics::http::metrics_middleware))
		.layer(TraceLayer::new_for_http())
		.layer(DefaultBodyLimit::disable())
		.layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
