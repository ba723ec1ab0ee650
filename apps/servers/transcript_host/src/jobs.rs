use crate::metrics::{JOBS_COMPLETED, JOBS_FAILED, JOBS_IN_PROGRESS};
use crate::store::{JobId, JobState, JobStore, StoreError};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use transcribe_pipeline::{Pipeline, Progress, ProgressSnapshot};

const INTERRUPTED_DETAIL: &str = "interrupted: service restarted before the job finished";
const FINISH_ATTEMPTS: u32 = 3;
const FINISH_BACKOFF: Duration = Duration::from_millis(100);

/// Schedules one background task per accepted upload and owns its terminal write.
#[derive(Clone)]
pub struct JobRunner {
	store: JobStore,
	pipeline: Pipeline,
	progress: Arc<DashMap<JobId, Arc<Progress>>>,
	/// Terminal states whose record could not be written; served instead of the stale record.
	unpersisted: Arc<DashMap<JobId, JobState>>,
}

impl JobRunner {
	pub fn new(store: JobStore, pipeline: Pipeline) -> Self {
		Self {
			store,
			pipeline,
			progress: Arc::new(DashMap::new()),
			unpersisted: Arc::new(DashMap::new()),
		}
	}

	pub const fn store(&self) -> &JobStore {
		&self.store
	}

	pub const fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	/// Window progress of a job that is still running.
	pub fn progress(&self, job_id: &JobId) -> Option<ProgressSnapshot> {
		self.progress.get(job_id).and_then(|p| p.snapshot())
	}

	/// Terminal state held in memory because writing it to the store failed.
	pub fn unpersisted(&self, job_id: &JobId) -> Option<JobState> {
		self.unpersisted.get(job_id).map(|state| state.clone())
	}

	/// Start processing `working_file` for an already recorded job.
	///
	/// The returned handle resolves to the terminal state once the working file is removed
	/// and the state persisted (or held in memory if the store rejects it). Callers may drop it.
	pub fn spawn(&self, job_id: JobId, working_file: PathBuf) -> JoinHandle<JobState> {
		let progress = Progress::new();
		self.progress.insert(job_id.clone(), Arc::clone(&progress));

		let runner = self.clone();
		let span = info_span!("job", job_id = %job_id);
		tokio::spawn(async move { runner.process(job_id, working_file, progress).await }.instrument(span))
	}

	async fn process(&self, job_id: JobId, working_file: PathBuf, progress: Arc<Progress>) -> JobState {
		JOBS_IN_PROGRESS.inc();

		let state = match self.pipeline.transcribe(&working_file, &progress).await {
			Ok(transcript) => {
				JOBS_COMPLETED.inc();
				info!(windows = transcript.windows, chars = transcript.text.len(), "✅ Job done");
				JobState::Done { transcript: transcript.text }
			}
			Err(e) => {
				JOBS_FAILED.inc();
				error!(error = %e, "❌ Job failed");
				JobState::Error { detail: e.to_string() }
			}
		};

		// Gone before the terminal state becomes visible to pollers.
		remove_working_file(&working_file).await;

		if let Err(e) = self.persist_terminal(&job_id, &state).await {
			error!(error = %e, "Failed to persist terminal job state; serving it from memory");
			self.unpersisted.insert(job_id.clone(), state.clone());
		}

		self.progress.remove(&job_id);
		JOBS_IN_PROGRESS.dec();

		state
	}

	async fn persist_terminal(&self, job_id: &JobId, state: &JobState) -> Result<(), StoreError> {
		let mut attempt = 1;
		loop {
			match self.store.finish(job_id, state.clone()).await {
				Ok(_) => return Ok(()),
				Err(e @ (StoreError::AlreadyTerminal { .. } | StoreError::InvalidTransition(_))) => return Err(e),
				Err(e) if attempt >= FINISH_ATTEMPTS => return Err(e),
				Err(e) => {
					warn!(attempt, error = %e, "Retrying terminal job write");
					tokio::time::sleep(FINISH_BACKOFF * attempt).await;
					attempt += 1;
				}
			}
		}
	}

	/// Fail every job a previous process left in `processing`.
	///
	/// Their tasks died with that process, so they would otherwise never reach a terminal state.
	pub async fn recover_interrupted(&self) -> Result<usize, StoreError> {
		let mut recovered = 0;

		for record in self.store.list().await? {
			if record.state.is_terminal() {
				continue;
			}

			self.store
				.finish(
					&record.job_id,
					JobState::Error {
						detail: INTERRUPTED_DETAIL.to_string(),
					},
				)
				.await?;
			remove_working_file(&record.working_file).await;

			warn!(job_id = %record.job_id, source = %record.source_name, "Marked interrupted job as failed");
			recovered += 1;
		}

		Ok(recovered)
	}

	/// Remove what a killed process left behind: uploads that never got a job record and
	/// window audio in the scratch directory. Only safe before jobs are accepted.
	pub async fn sweep_orphans(&self, uploads_dir: &Path, scratch_dir: &Path) -> Result<usize, StoreError> {
		let mut removed = 0;

		let mut uploads = tokio::fs::read_dir(uploads_dir).await?;
		while let Some(entry) = uploads.next_entry().await? {
			let name = entry.file_name();
			let Some(job_id) = name.to_str().and_then(|n| n.split_once('_')).and_then(|(id, _)| JobId::parse(id)) else {
				continue;
			};
			if matches!(self.store.get(&job_id).await, Ok(None)) {
				remove_working_file(&entry.path()).await;
				removed += 1;
			}
		}

		let mut scratch = tokio::fs::read_dir(scratch_dir).await?;
		while let Some(entry) = scratch.next_entry().await? {
			if entry.file_type().await?.is_file() {
				remove_working_file(&entry.path()).await;
				removed += 1;
			}
		}

		if removed > 0 {
			warn!(removed, "Removed files left by a previous run");
		}
		Ok(removed)
	}
}

async fn remove_working_file(path: &Path) {
	match tokio::fs::remove_file(path).await {
		Ok(()) => info!(path = %path.display(), "🧹 Working file removed"),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove working file"),
	}
}
