use crate::error::TranscriptHostError;
use crate::jobs::JobRunner;
use crate::metrics::JOBS_SUBMITTED;
use crate::store::JobId;
use crate::{AppState, Config};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
	pub job_id: JobId,
	pub status: &'static str,
}

/// Accept an upload, persist it, record the job and schedule it. Returns before any transcription work.
#[axum::debug_handler(state = AppState)]
#[instrument(name = "transcribe", skip_all)]
pub async fn transcribe(State(runner): State<JobRunner>, State(config): State<Arc<Config>>, mut multipart: Multipart) -> Result<Json<SubmitResponse>, TranscriptHostError> {
	while let Some(field) = multipart.next_field().await? {
		if field.name() != Some(FILE_FIELD) {
			continue;
		}

		let source_name = field.file_name().map_or_else(|| "upload".to_string(), sanitize_file_name);
		let job_id = JobId::generate();
		let working_file = config.uploads_dir().join(format!("{job_id}_{source_name}"));

		let bytes = match save_field(field, &working_file).await {
			Ok(bytes) => bytes,
			Err(e) => {
				discard(&working_file).await;
				return Err(e);
			}
		};

		if let Err(e) = runner.store().create(&job_id, &source_name, &working_file).await {
			discard(&working_file).await;
			return Err(e.into());
		}

		JOBS_SUBMITTED.inc();
		info!(job_id = %job_id, source = %source_name, bytes, "📥 Upload accepted");

		// The task owns the terminal write; nothing waits on it here.
		drop(runner.spawn(job_id.clone(), working_file));

		return Ok(Json(SubmitResponse { job_id, status: "processing" }));
	}

	Err(TranscriptHostError::MissingFile)
}

async fn save_field(mut field: Field<'_>, path: &Path) -> Result<u64, TranscriptHostError> {
	let mut file = tokio::fs::File::create(path).await?;
	let mut written = 0u64;

	while let Some(chunk) = field.chunk().await? {
		file.write_all(&chunk).await?;
		written += chunk.len() as u64;
	}

	file.flush().await?;
	Ok(written)
}

async fn discard(path: &Path) {
	if let Err(e) = tokio::fs::remove_file(path).await {
		if e.kind() != std::io::ErrorKind::NotFound {
			warn!(path = %path.display(), error = %e, "Failed to remove rejected upload");
		}
	}
}

/// Last path component of a client supplied name, restricted to a safe character set.
fn sanitize_file_name(raw: &str) -> String {
	let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
	let cleaned: String = base
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
		.collect();

	match cleaned.trim_start_matches('.') {
		"" => "upload".to_string(),
		name => name.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::sanitize_file_name;

	#[test]
	fn test_sanitize_file_name() {
		assert_eq!(sanitize_file_name("talk.mp3"), "talk.mp3");
		assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
		assert_eq!(sanitize_file_name("C:\\Users\\me\\my talk (1).m4a"), "my_talk__1_.m4a");
		assert_eq!(sanitize_file_name(".."), "upload");
		assert_eq!(sanitize_file_name(""), "upload");
	}
}
