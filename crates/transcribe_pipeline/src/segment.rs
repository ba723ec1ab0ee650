use crate::error::PipelineError;
use serde::Serialize;

/// One bounded time range of the source, transcribed as an independent unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentWindow {
	/// Ordinal position, 0-based
	pub index: usize,
	/// Offset into the source, in seconds
	pub start: f64,
	/// Window length in seconds, never past end-of-file
	pub length: f64,
}

impl SegmentWindow {
	pub fn end(&self) -> f64 {
		self.start + self.length
	}
}

/// Computes overlapping windows covering a media duration.
///
/// Window `i` starts at `max(i*chunk - overlap, 0)` and ends at `min((i+1)*chunk, duration)`,
/// so every window after the first reaches back `overlap` seconds into its predecessor
/// and the final window is clipped to the end of the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segmenter {
	chunk_secs: f64,
	overlap_secs: f64,
}

impl Segmenter {
	pub fn new(chunk_secs: f64, overlap_secs: f64) -> Result<Self, PipelineError> {
		let valid = chunk_secs.is_finite() && overlap_secs.is_finite() && chunk_secs > 0.0 && overlap_secs >= 0.0 && overlap_secs < chunk_secs;

		if !valid {
			return Err(PipelineError::InvalidSegmentation {
				chunk: chunk_secs,
				overlap: overlap_secs,
			});
		}

		Ok(Self { chunk_secs, overlap_secs })
	}

	pub const fn chunk_secs(&self) -> f64 {
		self.chunk_secs
	}

	pub const fn overlap_secs(&self) -> f64 {
		self.overlap_secs
	}

	/// Number of windows for `duration`, `ceil(duration / chunk)`.
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub fn window_count(&self, duration: f64) -> usize {
		if !(duration.is_finite() && duration > 0.0) {
			return 0;
		}
		(duration / self.chunk_secs).ceil() as usize
	}

	/// Ordered windows for `duration`. Empty when `duration <= 0`; callers reject that first.
	#[allow(clippy::cast_precision_loss)]
	pub fn windows(&self, duration: f64) -> Vec<SegmentWindow> {
		(0..self.window_count(duration))
			.map(|index| {
				let nominal = index as f64 * self.chunk_secs;
				let start = (nominal - self.overlap_secs).max(0.0);
				let end = (nominal + self.chunk_secs).min(duration);

				SegmentWindow {
					index,
					start,
					length: (end - start).max(0.0),
				}
			})
			.collect()
	}
}
