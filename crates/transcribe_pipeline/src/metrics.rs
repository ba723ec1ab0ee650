use lazy_static::lazy_static;
use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};

lazy_static! {
	pub static ref WINDOWS_TRANSCRIBED: IntCounter =
		register_int_counter!("transcribe_windows_total", "Segment windows transcribed successfully").expect("Failed to register WINDOWS_TRANSCRIBED");
	pub static ref WINDOWS_FAILED: IntCounter =
		register_int_counter!("transcribe_windows_failed_total", "Segment windows whose extraction or transcription failed").expect("Failed to register WINDOWS_FAILED");
	pub static ref WINDOW_DURATION: Histogram = register_histogram!(
		"transcribe_window_duration_seconds",
		"Wall time to extract and transcribe one window",
		vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
	)
	.expect("Failed to register WINDOW_DURATION");
	pub static ref UNITS_IN_FLIGHT: IntGauge = register_int_gauge!("transcribe_units_in_flight", "Window units currently holding a worker slot").expect("Failed to register UNITS_IN_FLIGHT");
}
