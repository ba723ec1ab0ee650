use crate::error::PipelineError;
use crate::pool::{SegmentResult, WorkerPool};
use crate::progress::Progress;
use crate::segment::Segmenter;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Joins segment texts in the final transcript.
pub const SEGMENT_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
	pub text: String,
	pub duration_secs: f64,
	pub windows: usize,
}

/// Duration lookup, segmentation, pooled transcription and reassembly for one file.
#[derive(Clone)]
pub struct Pipeline {
	segmenter: Segmenter,
	pool: Arc<WorkerPool>,
}

impl Pipeline {
	pub const fn new(segmenter: Segmenter, pool: Arc<WorkerPool>) -> Self {
		Self { segmenter, pool }
	}

	pub const fn segmenter(&self) -> &Segmenter {
		&self.segmenter
	}

	pub fn pool(&self) -> &Arc<WorkerPool> {
		&self.pool
	}

	pub async fn transcribe(&self, path: &Path, progress: &Progress) -> Result<Transcript, PipelineError> {
		let started = Instant::now();

		let duration = self.pool.audio().duration(path).await.map_err(PipelineError::Probe)?;
		if !(duration.is_finite() && duration > 0.0) {
			return Err(PipelineError::InvalidDuration(duration));
		}

		let windows = self.segmenter.windows(duration);
		info!(
			file = %path.display(),
			duration_secs = format!("{duration:.1}"),
			windows = windows.len(),
			chunk_secs = self.segmenter.chunk_secs(),
			overlap_secs = self.segmenter.overlap_secs(),
			"🎬 Transcribing in chunks"
		);

		let results = self.pool.run(path, &windows, progress).await?;
		let text = assemble_transcript(results);

		info!(file = %path.display(), chars = text.len(), elapsed_ms = started.elapsed().as_millis(), "✅ Transcript assembled");

		Ok(Transcript {
			text,
			duration_secs: duration,
			windows: windows.len(),
		})
	}
}

/// Concatenate segment texts in ascending start order, whatever order they arrived in.
pub fn assemble_transcript(mut results: Vec<SegmentResult>) -> String {
	results.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.index.cmp(&b.index)));
	results.into_iter().map(|r| r.text).collect::<Vec<_>>().join(SEGMENT_SEPARATOR)
}
