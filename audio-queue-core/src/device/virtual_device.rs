//! Software `QueueDevice`.
//!
//! Runs the full buffer-queue protocol without audio hardware. In manual
//! mode callbacks fire only when a test calls `VirtualDeviceHandle::pump`,
//! on the caller's thread. In paced mode a worker thread pumps one buffer
//! per period, like a real device clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{PcmFormat, QueueDirection};
use crate::models::error::EngineError;
use crate::processing::buffer_ring::AudioBuffer;
use crate::processing::pcm_container::write_samples_i16;
use crate::traits::queue_device::{BufferCallback, BufferDisposition, QueueDevice};

/// Input generated by a virtual capture device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VirtualSignal {
    Silence,
    Constant(i16),
    Sine { frequency: f32, amplitude: i16 },
}

impl VirtualSignal {
    fn sample(&self, index: u64, sample_rate: u32) -> i16 {
        match *self {
            Self::Silence => 0,
            Self::Constant(v) => v,
            Self::Sine {
                frequency,
                amplitude,
            } => {
                let t = index as f64 / sample_rate.max(1) as f64;
                ((std::f64::consts::TAU * frequency as f64 * t).sin() * amplitude as f64) as i16
            }
        }
    }
}

struct VirtualState {
    direction: Option<QueueDirection>,
    format: PcmFormat,
    callback: Option<BufferCallback>,
    queue: VecDeque<AudioBuffer>,
    running: bool,
    frames: u64,
    callbacks_fired: u64,
    rendered: Vec<u8>,
    signal: VirtualSignal,
    fail_create: bool,
    timeline_available: bool,
}

impl VirtualState {
    fn fire_one(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let Some(direction) = self.direction else {
            return false;
        };
        let Some(mut buffer) = self.queue.pop_front() else {
            return false;
        };

        let frame = self.format.bytes_per_frame().max(1);
        match direction {
            QueueDirection::Capture => {
                let samples: Vec<i16> = (0..buffer.capacity() / 2)
                    .map(|i| {
                        let frame_index = self.frames + (i * 2 / frame) as u64;
                        self.signal.sample(frame_index, self.format.sample_rate)
                    })
                    .collect();
                let written = write_samples_i16(&samples, buffer.storage_mut());
                buffer.set_len(written);
            }
            QueueDirection::Playback => {
                self.rendered.extend_from_slice(buffer.bytes());
            }
        }
        self.frames += (buffer.len() / frame) as u64;
        if direction == QueueDirection::Playback {
            buffer.clear();
        }

        self.callbacks_fired += 1;
        let Some(callback) = self.callback.as_mut() else {
            return false;
        };
        if let BufferDisposition::Requeue(buffer) = callback(buffer) {
            self.queue.push_back(buffer);
        }
        true
    }
}

/// Shareable control surface for a `VirtualQueueDevice` owned by an engine.
#[derive(Clone)]
pub struct VirtualDeviceHandle {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualDeviceHandle {
    /// Fire up to `n` callbacks on the calling thread. Returns how many fired.
    ///
    /// Stops early when the device is not running or its queue is empty.
    pub fn pump(&self, n: usize) -> usize {
        let mut state = self.state.lock();
        (0..n).take_while(|_| state.fire_one()).count()
    }

    /// Bytes drained by playback since the queue was created.
    pub fn rendered(&self) -> Vec<u8> {
        self.state.lock().rendered.clone()
    }

    pub fn callbacks_fired(&self) -> u64 {
        self.state.lock().callbacks_fired
    }

    /// Buffers currently queued with the device.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_created(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn set_signal(&self, signal: VirtualSignal) {
        self.state.lock().signal = signal;
    }

    pub fn set_timeline_available(&self, available: bool) {
        self.state.lock().timeline_available = available;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }
}

struct Pacer {
    running: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

/// In-process buffer queue with a simulated device timeline.
pub struct VirtualQueueDevice {
    handle: VirtualDeviceHandle,
    period: Option<Duration>,
    pacer: Option<Pacer>,
}

impl VirtualQueueDevice {
    /// Manual device: callbacks fire only through `VirtualDeviceHandle::pump`.
    pub fn new() -> Self {
        Self {
            handle: VirtualDeviceHandle {
                state: Arc::new(Mutex::new(VirtualState {
                    direction: None,
                    format: PcmFormat::default(),
                    callback: None,
                    queue: VecDeque::new(),
                    running: false,
                    frames: 0,
                    callbacks_fired: 0,
                    rendered: Vec::new(),
                    signal: VirtualSignal::Silence,
                    fail_create: false,
                    timeline_available: true,
                })),
            },
            period: None,
            pacer: None,
        }
    }

    /// Paced device: a worker thread fires one callback every `period`.
    pub fn paced(period: Duration) -> Self {
        let mut device = Self::new();
        device.period = Some(period);
        device
    }

    pub fn with_signal(self, signal: VirtualSignal) -> Self {
        self.handle.set_signal(signal);
        self
    }

    /// Make every `create` fail with a device error.
    pub fn with_create_failure(self) -> Self {
        self.handle.set_fail_create(true);
        self
    }

    /// Report no device timeline, as when the hardware cannot provide one.
    pub fn with_timeline_unavailable(self) -> Self {
        self.handle.set_timeline_available(false);
        self
    }

    pub fn handle(&self) -> VirtualDeviceHandle {
        self.handle.clone()
    }

    fn stop_pacer(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.running.store(false, Ordering::Release);
            if pacer.thread.join().is_err() {
                log::error!("virtual device pacer thread panicked");
            }
        }
    }
}

impl Default for VirtualQueueDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueDevice for VirtualQueueDevice {
    fn create(
        &mut self,
        direction: QueueDirection,
        format: PcmFormat,
        callback: BufferCallback,
    ) -> Result<(), EngineError> {
        let mut state = self.handle.state.lock();
        if state.fail_create {
            return Err(EngineError::Device("virtual queue refused to create".into()));
        }
        if state.callback.is_some() {
            return Err(EngineError::Device("queue already created".into()));
        }
        state.direction = Some(direction);
        state.format = format;
        state.callback = Some(callback);
        state.queue.clear();
        state.frames = 0;
        state.callbacks_fired = 0;
        state.rendered.clear();
        Ok(())
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<(), EngineError> {
        let mut state = self.handle.state.lock();
        if state.callback.is_none() {
            return Err(EngineError::Device("enqueue on a queue that was not created".into()));
        }
        state.queue.push_back(buffer);
        Ok(())
    }

    fn start(&mut self) -> Result<(), EngineError> {
        {
            let mut state = self.handle.state.lock();
            if state.callback.is_none() {
                return Err(EngineError::Device("start on a queue that was not created".into()));
            }
            state.running = true;
        }

        if let Some(period) = self.period {
            if self.pacer.is_none() {
                let running = Arc::new(AtomicBool::new(true));
                let flag = Arc::clone(&running);
                let handle = self.handle.clone();
                let thread = thread::Builder::new()
                    .name("virtual-queue".into())
                    .spawn(move || {
                        while flag.load(Ordering::Acquire) {
                            handle.pump(1);
                            thread::sleep(period);
                        }
                    })
                    .map_err(|e| EngineError::Device(format!("failed to spawn pacer: {}", e)))?;
                self.pacer = Some(Pacer { running, thread });
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.stop_pacer();
        self.handle.state.lock().running = false;
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        self.stop_pacer();
        let mut state = self.handle.state.lock();
        state.running = false;
        state.queue.clear();
        state.callback = None;
        state.direction = None;
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        let state = self.handle.state.lock();
        if !state.timeline_available || state.direction.is_none() {
            return None;
        }
        Some(state.format.frames_to_secs(state.frames))
    }
}

impl Drop for VirtualQueueDevice {
    fn drop(&mut self) {
        self.stop_pacer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::buffer_ring::BufferRing;
    use crate::processing::pcm_container::samples_i16;

    fn counting_callback(requeue: bool) -> (BufferCallback, Arc<Mutex<Vec<Vec<u8>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: BufferCallback = Box::new(move |buffer: AudioBuffer| {
            sink.lock().push(buffer.bytes().to_vec());
            if requeue {
                BufferDisposition::Requeue(buffer)
            } else {
                BufferDisposition::Reclaimed
            }
        });
        (callback, seen)
    }

    #[test]
    fn capture_fills_buffers_from_signal() {
        let mut device = VirtualQueueDevice::new().with_signal(VirtualSignal::Constant(1000));
        let handle = device.handle();
        let (callback, seen) = counting_callback(true);

        device
            .create(QueueDirection::Capture, PcmFormat::default(), callback)
            .unwrap();
        let mut ring = BufferRing::new(2, 64);
        device.enqueue(ring.checkout().unwrap()).unwrap();
        device.enqueue(ring.checkout().unwrap()).unwrap();

        assert_eq!(handle.pump(1), 0, "not started yet");
        device.start().unwrap();
        assert_eq!(handle.pump(5), 5);
        assert_eq!(handle.queued(), 2);

        let blocks = seen.lock();
        assert_eq!(blocks.len(), 5);
        assert!(samples_i16(&blocks[0]).all(|s| s == 1000));
        assert_eq!(device.current_time(), Some(5.0 * 32.0 / 44_100.0));
    }

    #[test]
    fn playback_renders_and_clears_buffers() {
        let mut device = VirtualQueueDevice::new();
        let handle = device.handle();
        let (callback, seen) = counting_callback(false);

        device
            .create(QueueDirection::Playback, PcmFormat::default(), callback)
            .unwrap();
        let mut buffer = AudioBuffer::standalone(8);
        buffer.push_bytes(&[1, 2, 3, 4]);
        device.enqueue(buffer).unwrap();
        device.start().unwrap();

        assert_eq!(handle.pump(3), 1);
        assert_eq!(handle.rendered(), vec![1, 2, 3, 4]);
        assert_eq!(seen.lock()[0], Vec::<u8>::new());
    }

    #[test]
    fn dispose_releases_callback_and_queue() {
        let mut device = VirtualQueueDevice::new();
        let handle = device.handle();
        let (callback, _) = counting_callback(true);
        device
            .create(QueueDirection::Capture, PcmFormat::default(), callback)
            .unwrap();
        device.enqueue(AudioBuffer::standalone(16)).unwrap();
        device.start().unwrap();

        device.stop().unwrap();
        assert_eq!(handle.pump(1), 0);
        device.dispose().unwrap();
        assert!(!handle.is_created());
        assert_eq!(handle.queued(), 0);
        assert_eq!(device.current_time(), None);
        assert!(device.enqueue(AudioBuffer::standalone(16)).is_err());
    }

    #[test]
    fn injected_failures() {
        let mut device = VirtualQueueDevice::new().with_create_failure();
        let (callback, _) = counting_callback(true);
        let err = device
            .create(QueueDirection::Capture, PcmFormat::default(), callback)
            .unwrap_err();
        assert!(err.is_device());

        let mut device = VirtualQueueDevice::new().with_timeline_unavailable();
        let (callback, _) = counting_callback(true);
        device
            .create(QueueDirection::Capture, PcmFormat::default(), callback)
            .unwrap();
        assert_eq!(device.current_time(), None);
    }

    #[test]
    fn paced_device_fires_on_its_own() {
        let mut device = VirtualQueueDevice::paced(Duration::from_millis(1));
        let handle = device.handle();
        let (callback, seen) = counting_callback(true);
        device
            .create(QueueDirection::Capture, PcmFormat::default(), callback)
            .unwrap();
        device.enqueue(AudioBuffer::standalone(32)).unwrap();
        device.start().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while seen.lock().len() < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        device.stop().unwrap();
        let fired = handle.callbacks_fired();
        assert!(fired >= 3);

        thread::sleep(Duration::from_millis(5));
        assert_eq!(handle.callbacks_fired(), fired);
    }
}
