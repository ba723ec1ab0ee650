use crate::error::TranscriptHostError;
use crate::jobs::JobRunner;
use crate::store::{JobId, JobState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::instrument;
use transcribe_pipeline::ProgressSnapshot;

#[derive(Debug, Serialize)]
pub struct JobStatusBody {
	pub job_id: String,
	pub status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transcript: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub progress: Option<ProgressSnapshot>,
}

impl JobStatusBody {
	fn new(job_id: impl Into<String>, status: &'static str) -> Self {
		Self {
			job_id: job_id.into(),
			status,
			transcript: None,
			detail: None,
			progress: None,
		}
	}
}

/// Current state of a job: 202 while processing, 200 with the transcript, 500 with the failure detail.
#[axum::debug_handler(state = crate::AppState)]
#[instrument(name = "transcript", skip(runner))]
pub async fn transcript(State(runner): State<JobRunner>, Path(raw_id): Path<String>) -> Result<(StatusCode, Json<JobStatusBody>), TranscriptHostError> {
	let Some(job_id) = JobId::parse(&raw_id) else {
		return Ok((StatusCode::NOT_FOUND, Json(JobStatusBody::new(raw_id, "not_found"))));
	};

	let state = match runner.unpersisted(&job_id) {
		Some(state) => state,
		None => match runner.store().get(&job_id).await? {
			Some(record) => record.state,
			None => return Ok((StatusCode::NOT_FOUND, Json(JobStatusBody::new(raw_id, "not_found")))),
		},
	};

	let mut body = JobStatusBody::new(job_id.as_str(), state.label());
	let status = match state {
		JobState::Processing => {
			body.progress = runner.progress(&job_id);
			StatusCode::ACCEPTED
		}
		JobState::Done { transcript } => {
			body.transcript = Some(transcript);
			StatusCode::OK
		}
		JobState::Error { detail } => {
			body.detail = Some(detail);
			StatusCode::INTERNAL_SERVER_ERROR
		}
	};

	Ok((status, Json(body)))
}
