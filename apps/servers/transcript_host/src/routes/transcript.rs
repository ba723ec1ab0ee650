use crate::handlers::transcript as routes;
use crate::jobs::JobRunner;
use axum::routing::get;
use axum::{extract::FromRef, Router};

pub fn get_transcript<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	JobRunner: FromRef<S>,
{
	Router::new().route("/transcript/:job_id", get(routes::transcript))
}
