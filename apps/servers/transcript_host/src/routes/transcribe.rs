use crate::handlers::transcribe as routes;
use crate::jobs::JobRunner;
use crate::Config;
use axum::routing::post;
use axum::{extract::FromRef, Router};
use std::sync::Arc;

pub fn post_transcribe<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	JobRunner: FromRef<S>,
	Arc<Config>: FromRef<S>,
{
	Router::new().route("/transcribe", post(routes::transcribe))
}
