use super::TranscriptionEngine;
use crate::error::EngineError;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// In-process whisper.cpp inference.
///
/// The model is loaded once; each call creates its own decoding state, so
/// concurrent calls share the weights but never a `WhisperState`.
pub struct WhisperEngine {
	ctx: WhisperContext,
	model_path: String,
	threads: i32,
}

impl WhisperEngine {
	/// Load a ggml model from disk
	pub fn load(model_path: &str, threads: i32) -> Result<Self, EngineError> {
		info!("🔄 Loading Whisper model from {}...", model_path);
		let start = Instant::now();

		let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default()).map_err(|e| EngineError::ModelLoad {
			path: model_path.to_string(),
			reason: e.to_string(),
		})?;

		info!(load_time_ms = start.elapsed().as_millis(), threads, "✅ Whisper model loaded");

		Ok(Self {
			ctx,
			model_path: model_path.to_string(),
			threads,
		})
	}

	fn params(&self) -> FullParams<'static, 'static> {
		let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
		params.set_language(Some("auto"));
		params.set_translate(false);
		params.set_print_special(false);
		params.set_print_progress(false);
		params.set_print_realtime(false);
		params.set_print_timestamps(false);
		params.set_n_threads(self.threads);
		params
	}
}

impl TranscriptionEngine for WhisperEngine {
	fn name(&self) -> &str {
		"whisper"
	}

	fn transcribe(&self, audio: &Path) -> Result<String, EngineError> {
		let samples = read_samples(audio)?;

		let mut state = self.ctx.create_state().map_err(|e| EngineError::Inference(format!("failed to create Whisper state: {e}")))?;
		state.full(self.params(), &samples).map_err(|e| EngineError::Inference(e.to_string()))?;

		let num_segments = state.full_n_segments();
		if num_segments == 0 {
			warn!(audio = %audio.display(), "⚠️ No segments extracted - audio may be silence");
			return Ok(String::new());
		}

		let mut text = Vec::new();
		for i in 0..num_segments {
			if let Some(segment) = state.get_segment(i) {
				if let Ok(chunk) = segment.to_str() {
					let trimmed = chunk.trim();
					if !trimmed.is_empty() {
						text.push(trimmed.to_string());
					}
				}
			}
		}

		Ok(text.join(" "))
	}

	fn shutdown(&self) {
		info!(model = %self.model_path, "Whisper engine released");
	}
}

/// Read a mono WAV file into f32 samples in [-1, 1].
#[allow(clippy::cast_precision_loss)]
fn read_samples(path: &Path) -> Result<Vec<f32>, EngineError> {
	let read_err = |reason: String| EngineError::AudioRead {
		path: path.display().to_string(),
		reason,
	};

	let mut reader = hound::WavReader::open(path).map_err(|e| read_err(e.to_string()))?;
	let spec = reader.spec();

	match spec.sample_format {
		hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>().map_err(|e| read_err(e.to_string())),
		hound::SampleFormat::Int => {
			let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
			reader
				.samples::<i32>()
				.map(|s| s.map(|v| v as f32 / scale))
				.collect::<Result<Vec<_>, _>>()
				.map_err(|e| read_err(e.to_string()))
		}
	}
}
