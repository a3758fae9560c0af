//! `QueueDevice` over cpal streams.
//!
//! cpal pulls (output) or pushes (input) arbitrarily sized sample slices.
//! This adapter repackages them into the engine's fixed-size buffers:
//! input samples are converted to 16-bit and packed into the front queued
//! buffer, which is handed to the engine callback once full; output
//! samples are unpacked from the front queued buffer, which goes back to
//! the engine once drained. Underruns play silence, overruns are counted
//! and dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use parking_lot::Mutex;

use audio_queue_core::models::audio_models::{PcmFormat, QueueDirection};
use audio_queue_core::models::error::EngineError;
use audio_queue_core::processing::buffer_ring::AudioBuffer;
use audio_queue_core::traits::queue_device::{BufferCallback, BufferDisposition, QueueDevice};

/// State touched by the cpal data callback. The callback holds the lock
/// for its whole run, which is what makes `stop` synchronous.
struct StreamShared {
    callback: Option<BufferCallback>,
    queue: VecDeque<AudioBuffer>,
    read_offset: usize,
    running: bool,
    frames: u64,
    dropped_frames: u64,
    file_channels: usize,
}

impl StreamShared {
    fn new() -> Self {
        Self {
            callback: None,
            queue: VecDeque::new(),
            read_offset: 0,
            running: false,
            frames: 0,
            dropped_frames: 0,
            file_channels: 1,
        }
    }

    /// Give a buffer to the engine. A requeued capture buffer has been
    /// consumed and goes back empty.
    fn hand_back(&mut self, buffer: AudioBuffer, empty_on_requeue: bool) {
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        if let BufferDisposition::Requeue(mut buffer) = callback(buffer) {
            if empty_on_requeue {
                buffer.clear();
            }
            self.queue.push_back(buffer);
        }
    }

    /// Pack one file frame into the front buffer.
    fn push_frame(&mut self, frame: &[i16]) {
        let Some(front) = self.queue.front_mut() else {
            self.dropped_frames += 1;
            return;
        };
        for sample in frame {
            front.push_bytes(&sample.to_le_bytes());
        }
        self.frames += 1;
        let full = front.capacity() - front.len() < frame.len() * 2;
        if full {
            if let Some(buffer) = self.queue.pop_front() {
                self.hand_back(buffer, true);
            }
        }
    }

    /// Unpack one file frame from the front buffer. `false` on underrun.
    fn pop_frame(&mut self, frame: &mut [i16]) -> bool {
        let needed = frame.len() * 2;
        let Some(front) = self.queue.front() else {
            return false;
        };
        let bytes = &front.bytes()[self.read_offset.min(front.len())..];
        if bytes.len() < needed {
            // Drained (or a partial trailing frame): return it and retry.
            if let Some(mut buffer) = self.queue.pop_front() {
                buffer.clear();
                self.read_offset = 0;
                self.hand_back(buffer, false);
            }
            return self.queue.front().is_some_and(|b| b.len() >= needed) && self.pop_frame(frame);
        }
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample = i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        }
        self.read_offset += needed;
        self.frames += 1;
        true
    }
}

/// Which device a queue opens at `create`.
enum DeviceSelector {
    /// The host default for the queue's direction, resolved per session.
    SystemDefault,
    Fixed,
}

/// cpal-backed buffer queue on one input or output device.
pub struct CpalQueueDevice {
    selector: DeviceSelector,
    device: Option<cpal::Device>,
    shared: Arc<Mutex<StreamShared>>,
    stream: Option<cpal::Stream>,
    format: PcmFormat,
}

impl CpalQueueDevice {
    fn with_selector(selector: DeviceSelector, device: Option<cpal::Device>) -> Self {
        Self {
            selector,
            device,
            shared: Arc::new(Mutex::new(StreamShared::new())),
            stream: None,
            format: PcmFormat::default(),
        }
    }

    /// Use the host's default input or output device, whichever the
    /// engine asks for, looked up again on every `create`.
    pub fn system_default() -> Self {
        Self::with_selector(DeviceSelector::SystemDefault, None)
    }

    pub fn with_device(device: cpal::Device) -> Self {
        Self::with_selector(DeviceSelector::Fixed, Some(device))
    }

    /// Find a device by exact name among inputs or outputs.
    pub fn by_name(direction: QueueDirection, name: &str) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let mut devices = match direction {
            QueueDirection::Capture => host.input_devices(),
            QueueDirection::Playback => host.output_devices(),
        }
        .map_err(|e| EngineError::Device(format!("failed to list devices: {}", e)))?;

        devices
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .map(Self::with_device)
            .ok_or_else(|| EngineError::Device(format!("no {:?} device named {:?}", direction, name)))
    }

    /// Device name: the fixed device, or the default opened by the
    /// current session.
    pub fn name(&self) -> Option<String> {
        self.device.as_ref().and_then(|d| d.name().ok())
    }

    /// Frames the last session dropped because no buffer was queued.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.lock().dropped_frames
    }

    /// Make sure `self.device` points at the device for this session.
    fn resolve(&mut self, direction: QueueDirection) -> Result<(), EngineError> {
        if matches!(self.selector, DeviceSelector::Fixed) && self.device.is_some() {
            return Ok(());
        }
        let host = cpal::default_host();
        let device = match direction {
            QueueDirection::Capture => host.default_input_device(),
            QueueDirection::Playback => host.default_output_device(),
        }
        .ok_or_else(|| {
            EngineError::Device(format!(
                "no default {:?} device on host {}",
                direction,
                host.id().name()
            ))
        })?;
        self.device = Some(device);
        Ok(())
    }

    fn build_stream(
        &self,
        device: &cpal::Device,
        direction: QueueDirection,
        config: &cpal::SupportedStreamConfig,
    ) -> Result<cpal::Stream, EngineError> {
        let stream_config: cpal::StreamConfig = config.config();
        match (direction, config.sample_format()) {
            (QueueDirection::Capture, SampleFormat::I16) => self.build_input::<i16>(device, &stream_config),
            (QueueDirection::Capture, SampleFormat::F32) => self.build_input::<f32>(device, &stream_config),
            (QueueDirection::Capture, SampleFormat::U16) => self.build_input::<u16>(device, &stream_config),
            (QueueDirection::Playback, SampleFormat::I16) => self.build_output::<i16>(device, &stream_config),
            (QueueDirection::Playback, SampleFormat::F32) => self.build_output::<f32>(device, &stream_config),
            (QueueDirection::Playback, SampleFormat::U16) => self.build_output::<u16>(device, &stream_config),
            (_, format) => Err(EngineError::UnsupportedFormat(format!(
                "device sample format {:?}",
                format
            ))),
        }
    }

    fn build_input<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream, EngineError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let shared = Arc::clone(&self.shared);
        let device_channels = config.channels.max(1) as usize;

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mut state = shared.lock();
                    if !state.running {
                        return;
                    }
                    let file_channels = state.file_channels;
                    let mut frame = vec![0i16; file_channels];
                    for device_frame in data.chunks(device_channels) {
                        downmix(device_frame, &mut frame);
                        state.push_frame(&frame);
                    }
                },
                |err| log::error!("input stream error: {}", err),
                None,
            )
            .map_err(|e| EngineError::Device(format!("failed to build input stream: {}", e)))
    }

    fn build_output<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream, EngineError>
    where
        T: SizedSample + FromSample<i16>,
    {
        let shared = Arc::clone(&self.shared);
        let device_channels = config.channels.max(1) as usize;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut state = shared.lock();
                    let mut frame = vec![0i16; state.file_channels];
                    for device_frame in data.chunks_mut(device_channels) {
                        if !(state.running && state.pop_frame(&mut frame)) {
                            frame.iter_mut().for_each(|s| *s = 0);
                        }
                        fan_out(&frame, device_frame);
                    }
                },
                |err| log::error!("output stream error: {}", err),
                None,
            )
            .map_err(|e| EngineError::Device(format!("failed to build output stream: {}", e)))
    }
}

/// Map one device frame onto the file's channel layout.
fn downmix<T>(device_frame: &[T], out: &mut [i16])
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let values: Vec<f32> = device_frame
        .iter()
        .map(|&s| <f32 as cpal::Sample>::from_sample(s))
        .collect();
    if out.len() == 1 {
        let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;
        out[0] = to_i16(mean);
    } else {
        for (i, slot) in out.iter_mut().enumerate() {
            let v = values.get(i).or_else(|| values.first()).copied().unwrap_or(0.0);
            *slot = to_i16(v);
        }
    }
}

/// Spread one file frame over the device's channels.
fn fan_out<T>(frame: &[i16], device_frame: &mut [T])
where
    T: SizedSample + FromSample<i16>,
{
    let mono = if frame.len() == 1 || device_frame.len() == 1 {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        Some((sum / frame.len().max(1) as i32) as i16)
    } else {
        None
    };
    for (i, slot) in device_frame.iter_mut().enumerate() {
        let value = match mono {
            Some(v) => v,
            None => frame.get(i).copied().unwrap_or(0),
        };
        *slot = T::from_sample(value);
    }
}

fn to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Choose a device config that runs at the file's rate, preferring 16-bit
/// and then the closest channel count.
fn pick_config(
    device: &cpal::Device,
    direction: QueueDirection,
    format: &PcmFormat,
) -> Result<cpal::SupportedStreamConfig, EngineError> {
    let rate = cpal::SampleRate(format.sample_rate);
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match direction {
        QueueDirection::Capture => device.supported_input_configs().map(|c| c.collect::<Vec<_>>()),
        QueueDirection::Playback => device.supported_output_configs().map(|c| c.collect::<Vec<_>>()),
    }
    .map_err(|e| EngineError::Device(format!("failed to query device configs: {}", e)))?;

    let rank = |format: SampleFormat| match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    };

    ranges
        .into_iter()
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .filter_map(|r| rank(r.sample_format()).map(|score| (score, r)))
        .min_by_key(|(score, r)| (*score, (r.channels() as i32 - format.channels as i32).abs()))
        .map(|(_, r)| r.with_sample_rate(rate))
        .ok_or_else(|| {
            EngineError::UnsupportedFormat(format!(
                "device does not run at {} Hz with a supported sample format",
                format.sample_rate
            ))
        })
}

impl QueueDevice for CpalQueueDevice {
    fn create(
        &mut self,
        direction: QueueDirection,
        format: PcmFormat,
        callback: BufferCallback,
    ) -> Result<(), EngineError> {
        if self.stream.is_some() {
            return Err(EngineError::Device("queue already created".into()));
        }
        self.resolve(direction)?;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| EngineError::Device("no device resolved".into()))?;
        let config = pick_config(device, direction, &format)?;
        log::debug!(
            "{}: {:?} stream {} ch, {:?} at {} Hz",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            direction,
            config.channels(),
            config.sample_format(),
            config.sample_rate().0
        );

        {
            let mut state = self.shared.lock();
            *state = StreamShared::new();
            state.file_channels = format.channels.max(1) as usize;
            state.callback = Some(callback);
        }

        let stream = match self.build_stream(device, direction, &config) {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.lock().callback = None;
                return Err(e);
            }
        };
        // Some hosts start streams on creation; hold it until `start`.
        if let Err(e) = stream.pause() {
            log::debug!("pause after build not supported: {}", e);
        }
        self.stream = Some(stream);
        self.format = format;
        Ok(())
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<(), EngineError> {
        let mut state = self.shared.lock();
        if state.callback.is_none() {
            return Err(EngineError::Device("enqueue on a queue that was not created".into()));
        }
        state.queue.push_back(buffer);
        Ok(())
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| EngineError::Device("start on a queue that was not created".into()))?;
        self.shared.lock().running = true;
        stream
            .play()
            .map_err(|e| EngineError::Device(format!("failed to start stream: {}", e)))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let paused = match self.stream.as_ref() {
            Some(stream) => stream
                .pause()
                .map_err(|e| EngineError::Device(format!("failed to pause stream: {}", e))),
            None => Ok(()),
        };
        // Taking the lock waits out a callback that is mid-run.
        self.shared.lock().running = false;
        paused
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        self.stream = None;
        let mut state = self.shared.lock();
        state.running = false;
        state.queue.clear();
        state.callback = None;
        if state.dropped_frames > 0 {
            log::warn!(
                "{}: dropped {} frames (no buffer queued)",
                self.name().unwrap_or_default(),
                state.dropped_frames
            );
        }
        drop(state);
        if matches!(self.selector, DeviceSelector::SystemDefault) {
            self.device = None;
        }
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        self.stream.as_ref()?;
        Some(self.format.frames_to_secs(self.shared.lock().frames))
    }
}
