use super::TranscriptionEngine;
use crate::error::EngineError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const INPUT_PLACEHOLDER: &str = "{input}";

/// Runs an external speech-to-text CLI (e.g. whisper.cpp's `whisper-cli`) per window.
///
/// `{input}` in any argument is replaced by the window's WAV path; without a
/// placeholder the path is appended as the last argument. Non-empty stdout lines
/// are trimmed and joined with a space.
#[derive(Debug, Clone)]
pub struct CommandEngine {
	program: String,
	args: Vec<String>,
}

impl CommandEngine {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self { program: program.into(), args }
	}

	fn build(&self, audio: &Path) -> Command {
		let input = audio.display().to_string();
		let mut cmd = Command::new(&self.program);

		if self.args.iter().any(|arg| arg.contains(INPUT_PLACEHOLDER)) {
			cmd.args(self.args.iter().map(|arg| arg.replace(INPUT_PLACEHOLDER, &input)));
		} else {
			cmd.args(&self.args).arg(audio);
		}

		cmd
	}
}

impl TranscriptionEngine for CommandEngine {
	fn name(&self) -> &str {
		&self.program
	}

	fn transcribe(&self, audio: &Path) -> Result<String, EngineError> {
		debug!(command = %self.program, audio = %audio.display(), "Running engine command");

		let output = self.build(audio).output().map_err(|source| EngineError::Spawn {
			command: self.program.clone(),
			source,
		})?;

		if !output.status.success() {
			return Err(EngineError::Failed {
				command: self.program.clone(),
				status: output.status.to_string(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		let stdout = String::from_utf8_lossy(&output.stdout);
		Ok(stdout.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join(" "))
	}
}
