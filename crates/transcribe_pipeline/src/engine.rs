mod command;
#[cfg(feature = "whisper")]
mod whisper;

pub use command::CommandEngine;
#[cfg(feature = "whisper")]
pub use whisper::WhisperEngine;

use crate::error::EngineError;
use std::path::Path;

/// Speech-to-text backend.
///
/// Constructed once at startup and shared by every job through the worker pool.
/// `transcribe` is blocking and is only ever invoked from the blocking thread pool,
/// at most `max_workers` calls at a time.
pub trait TranscriptionEngine: Send + Sync {
	fn name(&self) -> &str;

	/// Transcribe a normalized mono WAV file into best-effort text.
	fn transcribe(&self, audio: &Path) -> Result<String, EngineError>;

	/// Release engine resources. Called once after the last job.
	fn shutdown(&self) {}
}
