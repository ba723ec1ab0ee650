use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-job window counters, shared between the job task and status readers.
#[derive(Debug, Default)]
pub struct Progress {
	total: AtomicUsize,
	completed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
	pub completed: usize,
	pub total: usize,
}

impl Progress {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn set_total(&self, total: usize) {
		self.total.store(total, Ordering::Relaxed);
	}

	pub fn mark_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	/// `None` until the job has been segmented.
	pub fn snapshot(&self) -> Option<ProgressSnapshot> {
		let total = self.total.load(Ordering::Relaxed);
		(total > 0).then(|| ProgressSnapshot {
			completed: self.completed.load(Ordering::Relaxed).min(total),
			total,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_snapshot_before_and_after_segmentation() {
		let progress = Progress::new();
		assert_eq!(progress.snapshot(), None);

		progress.set_total(3);
		progress.mark_completed();
		assert_eq!(progress.snapshot(), Some(ProgressSnapshot { completed: 1, total: 3 }));
	}
}
