use thiserror::Error;

/// Failures of the media utility (`ffprobe` / `ffmpeg` or a stand-in).
#[derive(Debug, Error)]
pub enum AudioError {
	#[error("{program} could not be started: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} exited with {status}: {stderr}")]
	Failed { program: String, status: String, stderr: String },

	#[error("unparseable duration output {output:?}")]
	UnparseableDuration { output: String },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Failures raised by a transcription engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("failed to load model {path}: {reason}")]
	ModelLoad { path: String, reason: String },

	#[error("failed to read audio {path}: {reason}")]
	AudioRead { path: String, reason: String },

	#[error("engine command `{command}` could not be started: {source}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("engine command `{command}` exited with {status}: {stderr}")]
	Failed { command: String, status: String, stderr: String },

	#[error("inference failed: {0}")]
	Inference(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
	#[error("could not determine media duration: {0}")]
	Probe(#[source] AudioError),

	#[error("invalid media duration: {0}s")]
	InvalidDuration(f64),

	#[error("invalid segmentation parameters: chunk={chunk}s overlap={overlap}s")]
	InvalidSegmentation { chunk: f64, overlap: f64 },

	#[error("audio extraction failed for window {index} at {start:.1}s: {source}")]
	Extract {
		index: usize,
		start: f64,
		#[source]
		source: AudioError,
	},

	#[error("transcription failed for window {index} at {start:.1}s: {source}")]
	Transcribe {
		index: usize,
		start: f64,
		#[source]
		source: EngineError,
	},

	#[error("worker pool is shut down")]
	PoolClosed,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("worker task failed: {0}")]
	Worker(#[from] tokio::task::JoinError),
}
