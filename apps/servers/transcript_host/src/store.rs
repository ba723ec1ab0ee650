use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("job store I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("job record could not be encoded: {0}")]
	Encode(#[from] serde_json::Error),

	#[error("job record {path} is corrupt: {source}")]
	Corrupt {
		path: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("unknown job {0}")]
	UnknownJob(JobId),

	#[error("job {job_id} is already {status}")]
	AlreadyTerminal { job_id: JobId, status: &'static str },

	#[error("job {0} can only move to done or error")]
	InvalidTransition(JobId),

	#[error("job store task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Opaque job identifier: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().simple().to_string())
	}

	/// Accepts only well-formed ids, so an id never escapes the jobs directory.
	pub fn parse(raw: &str) -> Option<Self> {
		let valid = raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
		valid.then(|| Self(raw.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
	Processing,
	Done { transcript: String },
	Error { detail: String },
}

impl JobState {
	pub const fn is_terminal(&self) -> bool {
		!matches!(self, Self::Processing)
	}

	pub const fn label(&self) -> &'static str {
		match self {
			Self::Processing => "processing",
			Self::Done { .. } => "done",
			Self::Error { .. } => "error",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
	pub job_id: JobId,
	#[serde(flatten)]
	pub state: JobState,
	pub source_name: String,
	pub working_file: PathBuf,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// File-backed job records, one JSON document per job.
///
/// Every write goes to a temp file in the same directory and is renamed over the
/// record, so readers see either the previous or the next state, never a partial one.
#[derive(Debug, Clone)]
pub struct JobStore {
	root: PathBuf,
}

impl JobStore {
	pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let root = root.into();
		tokio::fs::create_dir_all(&root).await?;
		Ok(Self { root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn record_path(&self, job_id: &JobId) -> PathBuf {
		self.root.join(format!("{job_id}.json"))
	}

	/// Record a freshly accepted upload as `processing`.
	pub async fn create(&self, job_id: &JobId, source_name: &str, working_file: &Path) -> Result<JobRecord, StoreError> {
		let now = Utc::now();
		let record = JobRecord {
			job_id: job_id.clone(),
			state: JobState::Processing,
			source_name: source_name.to_string(),
			working_file: working_file.to_path_buf(),
			created_at: now,
			updated_at: now,
		};

		self.write_atomic(&record).await?;
		Ok(record)
	}

	pub async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError> {
		read_record(&self.record_path(job_id)).await
	}

	/// Move a `processing` job to its terminal state. Terminal records are never rewritten.
	pub async fn finish(&self, job_id: &JobId, state: JobState) -> Result<JobRecord, StoreError> {
		if !state.is_terminal() {
			return Err(StoreError::InvalidTransition(job_id.clone()));
		}

		let mut record = self.get(job_id).await?.ok_or_else(|| StoreError::UnknownJob(job_id.clone()))?;
		if record.state.is_terminal() {
			return Err(StoreError::AlreadyTerminal {
				job_id: job_id.clone(),
				status: record.state.label(),
			});
		}

		record.state = state;
		record.updated_at = Utc::now();
		self.write_atomic(&record).await?;
		Ok(record)
	}

	/// All readable records. Stray temp files and records that fail to decode are skipped.
	pub async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
		let mut records = Vec::new();
		let mut entries = tokio::fs::read_dir(&self.root).await?;

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some("json") {
				continue;
			}
			match read_record(&path).await {
				Ok(Some(record)) => records.push(record),
				Ok(None) => {}
				Err(e @ StoreError::Corrupt { .. }) => warn!(error = %e, "Skipping unreadable job record"),
				Err(e) => return Err(e),
			}
		}

		records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
		Ok(records)
	}

	async fn write_atomic(&self, record: &JobRecord) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec_pretty(record)?;
		let dir = self.root.clone();
		let path = self.record_path(&record.job_id);

		tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
			let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
			tmp.write_all(&bytes)?;
			tmp.as_file().sync_all()?;
			tmp.persist(&path).map_err(|e| e.error)?;
			debug!(path = %path.display(), "Job record written");
			Ok(())
		})
		.await?
	}
}

async fn read_record(path: &Path) -> Result<Option<JobRecord>, StoreError> {
	let bytes = match tokio::fs::read(path).await {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e.into()),
	};

	serde_json::from_slice(&bytes).map(Some).map_err(|source| StoreError::Corrupt {
		path: path.display().to_string(),
		source,
	})
}
