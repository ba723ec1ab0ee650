use crate::audio::AudioUtility;
use crate::engine::TranscriptionEngine;
use crate::error::PipelineError;
use crate::metrics::{UNITS_IN_FLIGHT, WINDOWS_FAILED, WINDOWS_TRANSCRIBED, WINDOW_DURATION};
use crate::progress::Progress;
use crate::segment::SegmentWindow;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempPath;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Default number of concurrent window units.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// What a failed window does to its job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
	/// The first failing window fails the whole job; no partial transcript is kept.
	#[default]
	AbortJob,
}

/// Output of one window unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentResult {
	pub index: usize,
	pub start: f64,
	pub text: String,
}

/// Bounded-concurrency executor for window units.
///
/// One pool serves every job in the process: its permits cap the total number of
/// concurrent extraction + transcription units at `max_workers`, which is also the
/// most concurrent calls the engine will ever see.
pub struct WorkerPool {
	engine: Arc<dyn TranscriptionEngine>,
	audio: Arc<dyn AudioUtility>,
	permits: Arc<Semaphore>,
	max_workers: usize,
	scratch_dir: PathBuf,
	policy: FailurePolicy,
}

/// Holds a worker slot for the lifetime of one unit.
struct Slot {
	_permit: OwnedSemaphorePermit,
}

impl Slot {
	fn new(permit: OwnedSemaphorePermit) -> Self {
		UNITS_IN_FLIGHT.inc();
		Self { _permit: permit }
	}
}

impl Drop for Slot {
	fn drop(&mut self) {
		UNITS_IN_FLIGHT.dec();
	}
}

impl WorkerPool {
	pub fn new(engine: Arc<dyn TranscriptionEngine>, audio: Arc<dyn AudioUtility>, max_workers: usize, scratch_dir: impl Into<PathBuf>) -> Self {
		let max_workers = max_workers.max(1);

		Self {
			engine,
			audio,
			permits: Arc::new(Semaphore::new(max_workers)),
			max_workers,
			scratch_dir: scratch_dir.into(),
			policy: FailurePolicy::default(),
		}
	}

	pub const fn max_workers(&self) -> usize {
		self.max_workers
	}

	pub const fn policy(&self) -> FailurePolicy {
		self.policy
	}

	pub fn audio(&self) -> &dyn AudioUtility {
		self.audio.as_ref()
	}

	pub fn engine_name(&self) -> &str {
		self.engine.name()
	}

	/// Run one unit per window and return the results ordered by start offset.
	///
	/// Every window is attempted at most once. After the first failure no further unit
	/// starts; units already running are drained before the error is returned, so the
	/// job never leaves engine calls or window audio behind.
	pub async fn run(&self, source: &Path, windows: &[SegmentWindow], progress: &Progress) -> Result<Vec<SegmentResult>, PipelineError> {
		progress.set_total(windows.len());

		let mut results: Vec<SegmentResult> = match self.policy {
			FailurePolicy::AbortJob => {
				let aborted = AtomicBool::new(false);
				let mut units = stream::iter(windows.iter().copied())
					.map(|window| self.run_unit(source, window, progress, &aborted))
					.buffer_unordered(self.max_workers);

				let mut results = Vec::with_capacity(windows.len());
				let mut failure = None;
				while let Some(outcome) = units.next().await {
					match outcome {
						Ok(Some(result)) => results.push(result),
						Ok(None) => {}
						Err(e) if failure.is_none() => {
							aborted.store(true, Ordering::SeqCst);
							failure = Some(e);
						}
						Err(e) => debug!(error = %e, "Further window failure after abort"),
					}
				}

				if let Some(e) = failure {
					return Err(e);
				}
				results
			}
		};

		results.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.index.cmp(&b.index)));
		Ok(results)
	}

	/// `Ok(None)` when the job was aborted before this unit got to run.
	async fn run_unit(&self, source: &Path, window: SegmentWindow, progress: &Progress, aborted: &AtomicBool) -> Result<Option<SegmentResult>, PipelineError> {
		if aborted.load(Ordering::SeqCst) {
			return Ok(None);
		}
		let slot = Slot::new(Arc::clone(&self.permits).acquire_owned().await.map_err(|_| PipelineError::PoolClosed)?);
		if aborted.load(Ordering::SeqCst) {
			return Ok(None);
		}
		let started = Instant::now();

		let chunk = tempfile::Builder::new().prefix("chunk-").suffix(".wav").tempfile_in(&self.scratch_dir)?.into_temp_path();

		match self.extract_and_transcribe(source, window, chunk, slot).await {
			Ok(text) => {
				let elapsed = started.elapsed();
				WINDOWS_TRANSCRIBED.inc();
				WINDOW_DURATION.observe(elapsed.as_secs_f64());
				progress.mark_completed();

				info!(
					index = window.index,
					start = format!("{:.1}", window.start),
					end = format!("{:.1}", window.end()),
					chars = text.len(),
					elapsed_ms = elapsed.as_millis(),
					"📝 Window transcribed"
				);

				Ok(Some(SegmentResult {
					index: window.index,
					start: window.start,
					text,
				}))
			}
			Err(e) => {
				WINDOWS_FAILED.inc();
				warn!(index = window.index, start = window.start, error = %e, "❌ Window failed");
				Err(e)
			}
		}
	}

	/// The slot and the window audio move into the blocking call: the engine call cannot be
	/// cancelled, so both stay held until it returns even if this future is dropped.
	async fn extract_and_transcribe(&self, source: &Path, window: SegmentWindow, chunk: TempPath, slot: Slot) -> Result<String, PipelineError> {
		if let Err(source) = self.audio.extract(source, &window, &chunk).await {
			release(chunk);
			return Err(PipelineError::Extract {
				index: window.index,
				start: window.start,
				source,
			});
		}

		let engine = Arc::clone(&self.engine);
		let text = tokio::task::spawn_blocking(move || {
			let text = engine.transcribe(&chunk);
			release(chunk);
			drop(slot);
			text
		})
		.await?;

		text.map(|t| t.trim().to_string()).map_err(|source| PipelineError::Transcribe {
			index: window.index,
			start: window.start,
			source,
		})
	}

	/// Stop accepting units and release the engine.
	pub fn shutdown(&self) {
		self.permits.close();
		self.engine.shutdown();
		info!(engine = self.engine.name(), "Worker pool shut down");
	}
}

fn release(chunk: TempPath) {
	let path = chunk.to_path_buf();
	match chunk.close() {
		Ok(()) => debug!(path = %path.display(), "Removed window audio"),
		Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove window audio"),
	}
}
