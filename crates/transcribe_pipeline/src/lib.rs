pub mod audio;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod segment;

pub use audio::{AudioUtility, FfmpegAudio};
pub use engine::{CommandEngine, TranscriptionEngine};
#[cfg(feature = "whisper")]
pub use engine::WhisperEngine;
pub use error::{AudioError, EngineError, PipelineError};
pub use pipeline::{assemble_transcript, Pipeline, Transcript, SEGMENT_SEPARATOR};
pub use pool::{FailurePolicy, SegmentResult, WorkerPool};
pub use progress::{Progress, ProgressSnapshot};
pub use segment::{SegmentWindow, Segmenter};
