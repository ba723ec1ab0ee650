use crate::store::StoreError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(thiserror::Error, Debug)]
pub enum TranscriptHostError {
	#[error("request has no `file` part")]
	MissingFile,

	#[error("malformed upload: {0}")]
	Multipart(#[from] MultipartError),

	#[error("upload could not be stored: {0}")]
	Io(#[from] std::io::Error),

	#[error("job store error: {0}")]
	Store(#[from] StoreError),

	#[error("an internal server error occurred")]
	Anyhow(#[from] anyhow::Error),
}

impl TranscriptHostError {
	fn status_code(&self) -> StatusCode {
		match self {
			Self::MissingFile => StatusCode::BAD_REQUEST,
			Self::Multipart(e) => e.status(),
			Self::Io(_) | Self::Store(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for TranscriptHostError {
	fn into_response(self) -> Response {
		#[derive(serde::Serialize)]
		struct ErrorBody {
			error: String,
		}

		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!(error = ?self, "Request failed");
		} else {
			tracing::warn!(error = %self, "Rejected request");
		}

		(status, Json(ErrorBody { error: self.to_string() })).into_response()
	}
}
