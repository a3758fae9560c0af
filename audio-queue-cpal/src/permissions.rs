//! Microphone availability gate.
//!
//! cpal has no permission API. Access is probed by asking the default
//! input device for its config: hosts that deny microphone access (macOS
//! privacy settings, Windows privacy toggle, a missing ALSA device) fail
//! here before a stream is ever built.

use cpal::traits::{DeviceTrait, HostTrait};

use audio_queue_core::models::error::EngineError;

/// Check whether the default input device can be opened.
///
/// `Ok(false)` when there is no input device or it refuses to report a
/// config; `Err` is reserved for host-level failures.
pub fn check_microphone_permission() -> Result<bool, EngineError> {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        log::warn!("no default input device on host {}", host.id().name());
        return Ok(false);
    };

    match device.default_input_config() {
        Ok(_) => Ok(true),
        Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => Ok(false),
        Err(cpal::DefaultStreamConfigError::StreamTypeNotSupported) => Ok(false),
        Err(e) => Err(EngineError::Device(format!(
            "failed to query input device: {}",
            e
        ))),
    }
}

/// Playback needs no permission on any cpal host.
pub fn check_output_available() -> bool {
    cpal::default_host().default_output_device().is_some()
}
