use crate::error::AudioError;
use crate::segment::SegmentWindow;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Media probing and conversion collaborator.
#[async_trait]
pub trait AudioUtility: Send + Sync {
	/// Duration of the media at `path`, in seconds.
	async fn duration(&self, path: &Path) -> Result<f64, AudioError>;

	/// Write `window` of `source` to `dest` as normalized mono audio.
	async fn extract(&self, source: &Path, window: &SegmentWindow, dest: &Path) -> Result<(), AudioError>;
}

/// `ffprobe` for durations, `ffmpeg` for mono WAV extraction.
#[derive(Debug, Clone)]
pub struct FfmpegAudio {
	ffmpeg: PathBuf,
	ffprobe: PathBuf,
	sample_rate: u32,
}

impl FfmpegAudio {
	pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, sample_rate: u32) -> Self {
		Self {
			ffmpeg: ffmpeg.into(),
			ffprobe: ffprobe.into(),
			sample_rate,
		}
	}

	pub const fn sample_rate(&self) -> u32 {
		self.sample_rate
	}
}

impl Default for FfmpegAudio {
	fn default() -> Self {
		Self::new("ffmpeg", "ffprobe", 16_000)
	}
}

#[async_trait]
impl AudioUtility for FfmpegAudio {
	async fn duration(&self, path: &Path) -> Result<f64, AudioError> {
		let mut cmd = Command::new(&self.ffprobe);
		cmd.args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
			.arg(path)
			.kill_on_drop(true);

		let output = run(&self.ffprobe, &mut cmd).await?;
		parse_duration(&String::from_utf8_lossy(&output.stdout))
	}

	async fn extract(&self, source: &Path, window: &SegmentWindow, dest: &Path) -> Result<(), AudioError> {
		debug!(index = window.index, start = window.start, length = window.length, dest = %dest.display(), "Extracting window");

		let mut cmd = Command::new(&self.ffmpeg);
		cmd.args(["-y", "-nostdin", "-hide_banner", "-loglevel", "error"])
			.arg("-ss")
			.arg(window.start.to_string())
			.arg("-t")
			.arg(window.length.to_string())
			.arg("-i")
			.arg(source)
			.arg("-ar")
			.arg(self.sample_rate.to_string())
			.args(["-ac", "1", "-f", "wav"])
			.arg(dest)
			.kill_on_drop(true);

		run(&self.ffmpeg, &mut cmd).await.map(|_| ())
	}
}

async fn run(program: &Path, cmd: &mut Command) -> Result<Output, AudioError> {
	let program = program.display().to_string();

	let output = cmd.output().await.map_err(|source| AudioError::Spawn { program: program.clone(), source })?;

	if !output.status.success() {
		return Err(AudioError::Failed {
			program,
			status: output.status.to_string(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}

	Ok(output)
}

/// Parse the bare `format=duration` value printed by ffprobe.
pub fn parse_duration(raw: &str) -> Result<f64, AudioError> {
	let trimmed = raw.trim();
	trimmed.parse::<f64>().map_err(|_| AudioError::UnparseableDuration { output: trimmed.to_string() })
}
