pub mod http;

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static! {
	pub static ref JOBS_SUBMITTED: IntCounter = register_int_counter!("transcript_jobs_submitted_total", "Uploads accepted as jobs").expect("Failed to register JOBS_SUBMITTED");
	pub static ref JOBS_COMPLETED: IntCounter = register_int_counter!("transcript_jobs_completed_total", "Jobs that finished with a transcript").expect("Failed to register JOBS_COMPLETED");
	pub static ref JOBS_FAILED: IntCounter = register_int_counter!("transcript_jobs_failed_total", "Jobs that finished in error").expect("Failed to register JOBS_FAILED");
	pub static ref JOBS_IN_PROGRESS: IntGauge = register_int_gauge!("transcript_jobs_in_progress", "Jobs currently being processed").expect("Failed to register JOBS_IN_PROGRESS");
}
