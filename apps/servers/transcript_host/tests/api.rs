use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use clap::Parser;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use transcribe_pipeline::{AudioError, AudioUtility, EngineError, SegmentWindow, TranscriptionEngine};
use transcript_host::{build_router, AppState, Config, JobId, JobState};

const BOUNDARY: &str = "X-TRANSCRIPT-HOST-BOUNDARY";

// ============================================================================
// Test doubles
// ============================================================================

/// Reads the duration from an upload containing `duration=<secs>`; anything else is unreadable media.
struct FakeAudio;

#[async_trait]
impl AudioUtility for FakeAudio {
	async fn duration(&self, path: &Path) -> Result<f64, AudioError> {
		let content = tokio::fs::read_to_string(path).await?;
		content
			.trim()
			.strip_prefix("duration=")
			.and_then(|secs| secs.parse().ok())
			.ok_or(AudioError::UnparseableDuration { output: content })
	}

	async fn extract(&self, _source: &Path, window: &SegmentWindow, dest: &Path) -> Result<(), AudioError> {
		tokio::fs::write(dest, window.index.to_string()).await?;
		Ok(())
	}
}

/// Answers `segment <index>`; blocks while the gate is closed.
struct FakeEngine {
	open: AtomicBool,
	calls: AtomicUsize,
	fail_at: Option<usize>,
}

impl FakeEngine {
	fn new(open: bool) -> Arc<Self> {
		Arc::new(Self {
			open: AtomicBool::new(open),
			calls: AtomicUsize::new(0),
			fail_at: None,
		})
	}

	fn failing_at(index: usize) -> Arc<Self> {
		Arc::new(Self {
			open: AtomicBool::new(true),
			calls: AtomicUsize::new(0),
			fail_at: Some(index),
		})
	}
}

impl TranscriptionEngine for FakeEngine {
	fn name(&self) -> &str {
		"fake"
	}

	fn transcribe(&self, audio: &Path) -> Result<String, EngineError> {
		while !self.open.load(Ordering::SeqCst) {
			std::thread::sleep(Duration::from_millis(5));
		}
		self.calls.fetch_add(1, Ordering::SeqCst);

		let index = std::fs::read_to_string(audio).map_err(|e| EngineError::AudioRead {
			path: audio.display().to_string(),
			reason: e.to_string(),
		})?;
		if self.fail_at.is_some_and(|i| i.to_string() == index) {
			return Err(EngineError::Inference(format!("decoder crashed on window {index}")));
		}
		Ok(format!("  segment {index}\n"))
	}
}

// ============================================================================
// Helpers
// ============================================================================

struct TestApp {
	_dir: tempfile::TempDir,
	state: AppState,
	router: Router,
}

async fn app(engine: Arc<FakeEngine>) -> TestApp {
	let dir = tempfile::tempdir().unwrap();
	let data_dir = dir.path().to_str().unwrap();
	let config = Config::try_parse_from(["transcript_host", "--data-dir", data_dir, "--max-workers", "2"]).unwrap();

	let state = AppState::with_backends(Arc::new(config), engine, Arc::new(FakeAudio)).await.unwrap();
	let router = build_router(state.clone());

	TestApp { _dir: dir, state, router }
}

fn multipart(field: &str, file_name: &str, content: &str) -> Request<Body> {
	let body = format!(
		"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
	);

	Request::builder()
		.method("POST")
		.uri("/transcribe")
		.header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
		.body(Body::from(body))
		.unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = router.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
	(status, body)
}

async fn status(router: &Router, job_id: &str) -> (StatusCode, Value) {
	send(router, Request::builder().uri(format!("/transcript/{job_id}")).body(Body::empty()).unwrap()).await
}

async fn submit(router: &Router, content: &str) -> String {
	let (code, body) = send(router, multipart("file", "talk.wav", content)).await;
	assert_eq!(code, StatusCode::OK, "{body}");
	assert_eq!(body["status"], "processing");
	body["job_id"].as_str().unwrap().to_string()
}

async fn wait_terminal(router: &Router, job_id: &str) -> (StatusCode, Value) {
	for _ in 0..500 {
		let (code, body) = status(router, job_id).await;
		if code != StatusCode::ACCEPTED {
			return (code, body);
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("job {job_id} never finished");
}

fn uploads_left(app: &TestApp) -> usize {
	std::fs::read_dir(app.state.config.uploads_dir()).unwrap().count()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_short_upload_yields_single_segment_transcript() {
	let engine = FakeEngine::new(true);
	let app = app(engine.clone()).await;

	let job_id = submit(&app.router, "duration=10").await;
	let (code, body) = wait_terminal(&app.router, &job_id).await;

	assert_eq!(code, StatusCode::OK);
	assert_eq!(body["status"], "done");
	assert_eq!(body["transcript"], "segment 0");
	assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
	assert_eq!(uploads_left(&app), 0);
}

#[tokio::test]
async fn test_long_upload_reports_progress_then_ordered_transcript() {
	let engine = FakeEngine::new(false);
	let app = app(engine.clone()).await;

	let job_id = submit(&app.router, "duration=1000").await;

	let mut progress = Value::Null;
	for _ in 0..500 {
		let (code, body) = status(&app.router, &job_id).await;
		assert_eq!(code, StatusCode::ACCEPTED);
		assert_eq!(body["status"], "processing");
		if !body["progress"].is_null() {
			progress = body["progress"].clone();
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	assert_eq!(progress["total"], 2);
	assert_eq!(progress["completed"], 0);

	engine.open.store(true, Ordering::SeqCst);
	let (code, body) = wait_terminal(&app.router, &job_id).await;

	assert_eq!(code, StatusCode::OK);
	assert_eq!(body["transcript"], "segment 0\nsegment 1");
	assert!(body.get("progress").is_none());
}

#[tokio::test]
async fn test_unreadable_upload_reports_duration_error() {
	let app = app(FakeEngine::new(true)).await;

	let job_id = submit(&app.router, "not audio at all").await;
	let (code, body) = wait_terminal(&app.router, &job_id).await;

	assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["status"], "error");
	assert!(body["detail"].as_str().unwrap().contains("duration"), "{body}");
	assert_eq!(uploads_left(&app), 0);
}

#[tokio::test]
async fn test_terminal_status_is_stable() {
	let app = app(FakeEngine::new(true)).await;

	let job_id = submit(&app.router, "duration=600").await;
	let first = wait_terminal(&app.router, &job_id).await;

	for _ in 0..3 {
		assert_eq!(status(&app.router, &job_id).await, first);
	}
}

#[tokio::test]
async fn test_missing_file_part_is_rejected() {
	let app = app(FakeEngine::new(true)).await;

	let (code, body) = send(&app.router, multipart("audio", "talk.wav", "duration=10")).await;

	assert_eq!(code, StatusCode::BAD_REQUEST);
	assert!(body["error"].as_str().unwrap().contains("file"));
	assert_eq!(uploads_left(&app), 0);
	assert!(app.state.runner.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
	let app = app(FakeEngine::new(true)).await;

	let unknown = JobId::generate();
	let (code, body) = status(&app.router, unknown.as_str()).await;
	assert_eq!(code, StatusCode::NOT_FOUND);
	assert_eq!(body["status"], "not_found");
	assert_eq!(body["job_id"], unknown.as_str());

	let (code, _) = status(&app.router, "..%2F..%2Fetc%2Fpasswd").await;
	assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_interrupted_jobs_are_failed_on_recovery() {
	let app = app(FakeEngine::new(true)).await;

	let job_id = JobId::generate();
	let working_file = app.state.config.uploads_dir().join(format!("{job_id}_talk.wav"));
	std::fs::write(&working_file, "duration=10").unwrap();
	app.state.runner.store().create(&job_id, "talk.wav", &working_file).await.unwrap();

	assert_eq!(app.state.runner.recover_interrupted().await.unwrap(), 1);
	assert!(!working_file.exists());

	let (code, body) = status(&app.router, job_id.as_str()).await;
	assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body["detail"].as_str().unwrap().starts_with("interrupted"));

	assert_eq!(app.state.runner.recover_interrupted().await.unwrap(), 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
	let app = app(FakeEngine::new(true)).await;

	let response = app.router.clone().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let response = app.router.clone().oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	assert!(String::from_utf8_lossy(&bytes).contains("http_requests_total"));
}

#[tokio::test]
async fn test_failing_window_fails_whole_job() {
	let engine = FakeEngine::failing_at(1);
	let app = app(engine.clone()).await;

	let job_id = submit(&app.router, "duration=1600").await;
	let (code, body) = wait_terminal(&app.router, &job_id).await;

	assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["status"], "error");
	let detail = body["detail"].as_str().unwrap();
	assert!(detail.contains("window 1"), "{detail}");
	assert!(body.get("transcript").is_none());
	assert_eq!(uploads_left(&app), 0);

	let record = app.state.runner.store().get(&JobId::parse(&job_id).unwrap()).await.unwrap().unwrap();
	assert!(matches!(record.state, JobState::Error { .. }));
}

#[tokio::test]
async fn test_recovery_skips_corrupt_records() {
	let app = app(FakeEngine::new(true)).await;

	let job_id = JobId::generate();
	let working_file = app.state.config.uploads_dir().join(format!("{job_id}_talk.wav"));
	std::fs::write(&working_file, "duration=10").unwrap();
	app.state.runner.store().create(&job_id, "talk.wav", &working_file).await.unwrap();
	std::fs::write(app.state.config.jobs_dir().join(format!("{}.json", JobId::generate())), "{trunc").unwrap();

	assert_eq!(app.state.runner.recover_interrupted().await.unwrap(), 1);

	let (code, body) = status(&app.router, job_id.as_str()).await;
	assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body["detail"].as_str().unwrap().starts_with("interrupted"));
}

#[tokio::test]
async fn test_startup_sweep_removes_orphaned_files() {
	let app = app(FakeEngine::new(true)).await;
	let config = &app.state.config;

	let orphan = config.uploads_dir().join(format!("{}_lost.wav", JobId::generate()));
	std::fs::write(&orphan, "duration=10").unwrap();
	let foreign = config.uploads_dir().join("README");
	std::fs::write(&foreign, "not ours").unwrap();
	let stray_chunk = config.scratch_dir().join("chunk-abc123.wav");
	std::fs::write(&stray_chunk, "0").unwrap();

	assert_eq!(app.state.recover().await.unwrap(), 2);
	assert!(!orphan.exists());
	assert!(!stray_chunk.exists());
	assert!(foreign.exists());
}

#[tokio::test]
async fn test_terminal_state_served_when_store_write_fails() {
	let engine = FakeEngine::new(false);
	let app = app(engine.clone()).await;

	let job_id = submit(&app.router, "duration=10").await;

	// Swap the jobs directory for a plain file so every record read and write fails.
	let jobs_dir = app.state.config.jobs_dir();
	std::fs::rename(&jobs_dir, jobs_dir.with_extension("moved")).unwrap();
	std::fs::write(&jobs_dir, "").unwrap();

	engine.open.store(true, Ordering::SeqCst);
	let id = JobId::parse(&job_id).unwrap();
	for _ in 0..500 {
		if app.state.runner.unpersisted(&id).is_some() && uploads_left(&app) == 0 {
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let (code, body) = status(&app.router, &job_id).await;
	assert_eq!(code, StatusCode::OK);
	assert_eq!(body["status"], "done");
	assert_eq!(body["transcript"], "segment 0");
	assert_eq!(uploads_left(&app), 0);
}
