//! Audio device enumeration via the default cpal host.
//!
//! Lists input (microphone) and output (speaker/headphone) devices with
//! their default config and whether they can run the recording format.

use cpal::traits::{DeviceTrait, HostTrait};

use audio_queue_core::models::audio_models::{PcmFormat, QueueDirection};
use audio_queue_core::models::error::EngineError;

/// One input or output device as seen by the default host.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub direction: QueueDirection,
    pub is_default: bool,
    pub default_sample_rate: Option<u32>,
    pub default_channels: Option<u16>,
    /// Whether any supported config covers the given format's sample rate.
    pub supports_format: bool,
}

/// Device enumerator over the default cpal host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    /// List input devices.
    pub fn list_input_devices(&self, format: &PcmFormat) -> Result<Vec<AudioDeviceInfo>, EngineError> {
        self.list_devices(QueueDirection::Capture, format)
    }

    /// List output devices.
    pub fn list_output_devices(&self, format: &PcmFormat) -> Result<Vec<AudioDeviceInfo>, EngineError> {
        self.list_devices(QueueDirection::Playback, format)
    }

    pub fn default_device_name(&self, direction: QueueDirection) -> Option<String> {
        let device = match direction {
            QueueDirection::Capture => self.host.default_input_device(),
            QueueDirection::Playback => self.host.default_output_device(),
        }?;
        device.name().ok()
    }

    fn list_devices(
        &self,
        direction: QueueDirection,
        format: &PcmFormat,
    ) -> Result<Vec<AudioDeviceInfo>, EngineError> {
        let devices = match direction {
            QueueDirection::Capture => self.host.input_devices(),
            QueueDirection::Playback => self.host.output_devices(),
        }
        .map_err(|e| EngineError::Device(format!("failed to enumerate devices: {}", e)))?;

        let default_name = self.default_device_name(direction);
        let rate = cpal::SampleRate(format.sample_rate);

        let mut out = Vec::new();
        for (i, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| format!("Device {}", i));

            let default_config = match direction {
                QueueDirection::Capture => device.default_input_config(),
                QueueDirection::Playback => device.default_output_config(),
            }
            .ok();

            let supports_format = match direction {
                QueueDirection::Capture => device
                    .supported_input_configs()
                    .map(|configs| configs.into_iter().any(|r| covers(&r, rate)))
                    .unwrap_or(false),
                QueueDirection::Playback => device
                    .supported_output_configs()
                    .map(|configs| configs.into_iter().any(|r| covers(&r, rate)))
                    .unwrap_or(false),
            };

            out.push(AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                direction,
                default_sample_rate: default_config.as_ref().map(|c| c.sample_rate().0),
                default_channels: default_config.as_ref().map(|c| c.channels()),
                supports_format,
            });
        }

        Ok(out)
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

fn covers(range: &cpal::SupportedStreamConfigRange, rate: cpal::SampleRate) -> bool {
    range.min_sample_rate() <= rate && rate <= range.max_sample_rate()
}
