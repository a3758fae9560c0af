//! # audio-queue-cpal
//!
//! Hardware backend for audio-queue-core, built on cpal.
//!
//! Provides:
//! - `CpalQueueDevice`: `QueueDevice` over a cpal input or output stream
//! - `DeviceEnumerator`: input/output device listing on the default host
//! - `permissions`: microphone availability gate
//!
//! ## Usage
//! ```ignore
//! use audio_queue_core::{CaptureEngine, EngineConfiguration};
//! use audio_queue_cpal::CpalQueueDevice;
//!
//! let mic = CpalQueueDevice::system_default();
//! let mut capture = CaptureEngine::new(mic, EngineConfiguration::default());
//! capture.start();
//! ```

pub mod cpal_queue;
pub mod device_enumerator;
pub mod permissions;

pub use cpal_queue::CpalQueueDevice;
pub use device_enumerator::{AudioDeviceInfo, DeviceEnumerator};
pub use permissions::{check_microphone_permission, check_output_available};
