use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(name = "transcript_host")]
#[command(about = "Chunked speech-to-text job service", long_about = None)]
pub struct Config {
	/// Server host
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,

	/// Server port
	#[arg(long, env = "PORT", default_value = "8000")]
	pub port: u16,

	/// Root of persisted state: uploads, job records and window scratch files
	#[arg(long, env = "DATA_DIR", default_value = "./data")]
	pub data_dir: PathBuf,

	/// Segmentation window length in seconds
	#[arg(long, env = "CHUNK_SECONDS", default_value = "540")]
	pub chunk_seconds: f64,

	/// Audio shared between consecutive windows, in seconds
	#[arg(long, env = "OVERLAP_SECONDS", default_value = "2")]
	pub overlap_seconds: f64,

	/// Concurrent window transcriptions across all jobs
	#[arg(long, env = "MAX_WORKERS", default_value = "4")]
	pub max_workers: usize,

	/// Sample rate of extracted window audio
	#[arg(long, env = "TARGET_SAMPLE_RATE", default_value = "16000")]
	pub sample_rate: u32,

	/// Largest accepted upload, in megabytes
	#[arg(long, env = "MAX_UPLOAD_MB", default_value = "2048")]
	pub max_upload_mb: usize,

	#[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
	pub ffmpeg_bin: PathBuf,

	#[arg(long, env = "FFPROBE_BIN", default_value = "ffprobe")]
	pub ffprobe_bin: PathBuf,

	/// Speech-to-text backend
	#[arg(long, env = "TRANSCRIBE_ENGINE", value_enum, default_value = "command")]
	pub engine: EngineKind,

	/// Program run per window by the `command` engine
	#[arg(long, env = "ENGINE_COMMAND", default_value = "whisper-cli")]
	pub engine_command: String,

	/// Whitespace-separated arguments for the `command` engine; `{input}` is the window WAV path
	#[arg(long, env = "ENGINE_ARGS", default_value = "-nt -np -f {input}", allow_hyphen_values = true)]
	pub engine_args: String,

	/// Whisper model path (required by the `whisper` engine, passed as `-m` to the `command` engine)
	#[arg(long, env = "WHISPER_MODEL_PATH")]
	pub whisper_model_path: Option<String>,

	/// Number of threads for Whisper processing
	#[arg(long, env = "WHISPER_THREADS", default_value = "2")]
	pub whisper_threads: i32,

	/// Log filter
	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub rust_log: String,

	/// Use JSON formatting for tracing
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
	Command,
	Whisper,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.max_workers == 0 {
			return Err("max_workers must be at least 1".to_string());
		}

		if !(self.chunk_seconds.is_finite() && self.chunk_seconds > 0.0) {
			return Err("chunk_seconds must be greater than 0".to_string());
		}

		if !(self.overlap_seconds.is_finite() && self.overlap_seconds >= 0.0) {
			return Err("overlap_seconds must not be negative".to_string());
		}

		if self.overlap_seconds >= self.chunk_seconds {
			return Err("overlap_seconds must be smaller than chunk_seconds".to_string());
		}

		if self.sample_rate == 0 {
			return Err("sample_rate must be greater than 0".to_string());
		}

		if self.whisper_threads < 1 {
			return Err("whisper_threads must be at least 1".to_string());
		}

		if self.engine == EngineKind::Whisper && self.whisper_model_path.is_none() {
			return Err("the whisper engine needs --whisper-model-path".to_string());
		}

		Ok(())
	}

	pub fn uploads_dir(&self) -> PathBuf {
		self.data_dir.join("uploads")
	}

	pub fn jobs_dir(&self) -> PathBuf {
		self.data_dir.join("jobs")
	}

	pub fn scratch_dir(&self) -> PathBuf {
		self.data_dir.join("tmp")
	}

	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub const fn max_upload_bytes(&self) -> usize {
		self.max_upload_mb.saturating_mul(1024 * 1024)
	}

	/// Full argument list for the `command` engine.
	pub fn engine_argv(&self) -> Vec<String> {
		let mut argv = Vec::new();
		if let Some(model) = &self.whisper_model_path {
			argv.push("-m".to_string());
			argv.push(model.clone());
		}
		argv.extend(self.engine_args.split_whitespace().map(str::to_string));
		argv
	}
}
