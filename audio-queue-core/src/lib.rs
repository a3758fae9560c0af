//! # audio-queue-core
//!
//! Platform-agnostic buffer-queue audio engines.
//!
//! Records a microphone into a single 44.1 kHz mono 16-bit PCM container
//! through a callback-driven buffer ring, plays that container back
//! through a mirrored ring (optionally pitch shifted), and turns the
//! per-callback amplitude series into a paginated chart document.
//! Audio backends implement the `QueueDevice` trait; `VirtualQueueDevice`
//! is a software implementation for tests and headless use.
//!
//! ## Architecture
//!
//! ```text
//! audio-queue-core (this crate)
//! ├── traits/       ← QueueDevice, BufferCallback, EngineDelegate
//! ├── models/       ← EngineError, EngineState, PcmFormat, configurations
//! ├── processing/   ← BufferRing, PCM container codec, AmplitudeSampler, PitchShifter
//! ├── engine/       ← BufferQueueEngine, CaptureEngine, PlaybackEngine
//! ├── device/       ← VirtualQueueDevice
//! ├── session/      ← AudioSession (UI-facing controller)
//! ├── storage/      ← PcmFileWriter/Reader, metadata sidecar
//! └── report/       ← Document, GraphRenderer, PaginatedReportBuilder, PDF writer
//! ```

pub mod device;
pub mod engine;
pub mod models;
pub mod processing;
pub mod report;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use device::virtual_device::{VirtualDeviceHandle, VirtualQueueDevice, VirtualSignal};
pub use engine::capture::CaptureEngine;
pub use engine::playback::PlaybackEngine;
pub use engine::queue_engine::{BufferQueueEngine, QueueStage, StageOutcome};
pub use models::audio_models::{EngineDiagnostics, PcmFormat, QueueDirection, DEFAULT_SAMPLE_RATE};
pub use models::config::{EngineConfiguration, ReportConfiguration, SessionConfiguration};
pub use models::error::EngineError;
pub use models::recording_result::{RecordingMetadata, RecordingSummary};
pub use models::state::{EngineEvent, EngineState, PitchMode};
pub use processing::amplitude::{AmplitudeSampler, AmplitudeSeries};
pub use processing::buffer_ring::{AudioBuffer, BufferRing};
pub use processing::pitch::PitchShifter;
pub use report::document::{Canvas, Document};
pub use report::graph::GraphRenderer;
pub use report::layout::PaginatedReportBuilder;
pub use session::controller::AudioSession;
pub use traits::engine_delegate::{event_channel, ChannelDelegate, EngineDelegate};
pub use traits::queue_device::{BufferCallback, BufferDisposition, QueueDevice};
