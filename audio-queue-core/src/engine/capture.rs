use std::sync::Arc;

use crate::models::audio_models::{EngineDiagnostics, PcmFormat, QueueDirection};
use crate::models::config::EngineConfiguration;
use crate::models::error::EngineError;
use crate::models::recording_result::RecordingSummary;
use crate::models::state::EngineState;
use crate::processing::amplitude::{AmplitudeSampler, AmplitudeSeries};
use crate::processing::buffer_ring::AudioBuffer;
use crate::storage::pcm_file::PcmFileWriter;
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::queue_device::QueueDevice;

use super::queue_engine::{BufferQueueEngine, QueueStage, StageOutcome, StartOutcome};

/// Capture half: filled buffers go to the container and the amplitude series.
#[derive(Debug, Default)]
pub struct CaptureStage {
    writer: Option<PcmFileWriter>,
    sampler: AmplitudeSampler,
    series: AmplitudeSeries,
    last_bytes_written: u64,
}

impl QueueStage for CaptureStage {
    fn direction(&self) -> QueueDirection {
        QueueDirection::Capture
    }

    fn open(&mut self, config: &EngineConfiguration) -> Result<PcmFormat, EngineError> {
        self.series.clear();
        self.last_bytes_written = 0;
        self.writer = Some(PcmFileWriter::create(&config.file_path, config.format)?);
        Ok(config.format)
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> StageOutcome {
        let block = buffer.bytes();
        // One value per callback, whether or not the write lands.
        self.series.push(self.sampler.sample(block));

        let written = match self.writer.as_mut() {
            Some(writer) => writer.write(block),
            None => Err(EngineError::File("recording file is not open".into())),
        };
        match written {
            Ok(_) => StageOutcome::Continue,
            Err(e) => StageOutcome::Stalled(e),
        }
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if let Some(mut writer) = self.writer.take() {
            self.last_bytes_written = writer.close()?;
        }
        Ok(())
    }

    fn cursor(&self) -> u64 {
        self.writer.as_ref().map_or(0, PcmFileWriter::cursor)
    }
}

/// Records from a `QueueDevice` into the PCM container.
///
/// Keeps the amplitude series and session duration of the last recording
/// after it stops, for the report.
pub struct CaptureEngine<D: QueueDevice> {
    engine: BufferQueueEngine<D, CaptureStage>,
    session_duration: Option<f64>,
}

impl<D: QueueDevice> CaptureEngine<D> {
    pub fn new(device: D, config: EngineConfiguration) -> Self {
        Self {
            engine: BufferQueueEngine::new(device, CaptureStage::default(), config),
            session_duration: None,
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn EngineDelegate>) {
        self.engine.set_delegate(delegate);
    }

    /// Start recording. Returns whether a recording is running afterwards.
    ///
    /// Setup failures are logged and sent to the delegate, never returned.
    pub fn start(&mut self) -> bool {
        match self.engine.start(EngineState::Recording) {
            Ok(StartOutcome::Started) => {
                log::info!("recording to {}", self.engine.config().file_path.display());
                true
            }
            Ok(StartOutcome::AlreadyRunning) => {
                log::debug!("capture already running");
                true
            }
            Ok(StartOutcome::Exhausted) => false,
            Err(e) => {
                log::error!("failed to start capture: {}", e);
                self.engine.report_error(&e);
                false
            }
        }
    }

    /// Stop recording. `None` if no recording was running.
    pub fn stop(&mut self) -> Option<RecordingSummary> {
        let Some(outcome) = self.engine.stop() else {
            log::debug!("capture already stopped");
            return None;
        };

        match outcome.device_time {
            Some(secs) => self.session_duration = Some(secs),
            None => log::warn!(
                "device timeline unavailable, keeping previous session duration {:?}",
                self.session_duration
            ),
        }

        let summary = self.engine.with_stage(|stage| RecordingSummary {
            file_path: self.engine.config().file_path.clone(),
            duration_secs: self.session_duration,
            bytes_written: stage.last_bytes_written,
            amplitude_count: stage.series.len(),
        });
        log::info!(
            "recording stopped: {} bytes, {} amplitude samples, {:?} s",
            summary.bytes_written,
            summary.amplitude_count,
            summary.duration_secs
        );

        if let Some(delegate) = self.engine.delegate() {
            delegate.on_recording_finished(&summary);
        }
        Some(summary)
    }

    pub fn is_recording(&self) -> bool {
        self.engine.is_active()
    }

    /// Amplitude values of the current or last recording.
    pub fn amplitude_series(&self) -> AmplitudeSeries {
        self.engine.with_stage(|stage| stage.series.clone())
    }

    /// Device-timeline duration of the last recording.
    pub fn session_duration(&self) -> Option<f64> {
        self.session_duration
    }

    /// Payload bytes written in the running session, 0 when stopped.
    pub fn cursor(&self) -> u64 {
        self.engine.cursor()
    }

    pub fn ring_len(&self) -> usize {
        self.engine.ring_len()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.engine.diagnostics()
    }

    pub fn config(&self) -> &EngineConfiguration {
        self.engine.config()
    }

    pub fn set_config(&mut self, config: EngineConfiguration) {
        self.engine.set_config(config);
    }

    pub fn device(&self) -> &D {
        self.engine.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::virtual_device::{VirtualQueueDevice, VirtualSignal};
    use crate::models::state::EngineEvent;
    use crate::processing::pcm_container::{self, HEADER_SIZE};
    use crate::traits::engine_delegate::event_channel;
    use approx::assert_relative_eq;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_queue_capture_{}_{}", std::process::id(), name))
    }

    fn engine(name: &str, device: VirtualQueueDevice) -> CaptureEngine<VirtualQueueDevice> {
        CaptureEngine::new(device, EngineConfiguration::with_file(temp_file_path(name)))
    }

    #[test]
    fn records_one_amplitude_per_callback() {
        let device = VirtualQueueDevice::new().with_signal(VirtualSignal::Constant(16_384));
        let handle = device.handle();
        let mut capture = engine("amplitudes.wav", device);

        assert!(capture.start());
        assert_eq!(capture.ring_len(), 3);
        assert_eq!(handle.pump(10), 10);
        assert_eq!(capture.cursor(), 10 * 1024);

        let summary = capture.stop().unwrap();
        assert_eq!(summary.amplitude_count, 10);
        assert_eq!(summary.bytes_written, 10 * 1024);
        assert_eq!(capture.amplitude_series().len() as u64, handle.callbacks_fired());

        let expected = 512.0 * 16_384.0 / i16::MAX as f32;
        for value in capture.amplitude_series().iter() {
            assert_relative_eq!(*value, expected, epsilon = 1e-2);
        }
        fs::remove_file(temp_file_path("amplitudes.wav")).ok();
    }

    #[test]
    fn stop_empties_ring_and_closes_file() {
        for count in 1..=4 {
            let name = format!("teardown_{count}.wav");
            let device = VirtualQueueDevice::new();
            let handle = device.handle();
            let mut config = EngineConfiguration::with_file(temp_file_path(&name));
            config.buffer_count = count;
            let mut capture = CaptureEngine::new(device, config);

            assert!(capture.start());
            assert_eq!(handle.queued(), count);
            handle.pump(count * 2);
            capture.stop();

            assert_eq!(capture.ring_len(), 0);
            assert_eq!(capture.cursor(), 0);
            assert!(!handle.is_created());
            // Closed: the header now carries the real size.
            let data = fs::read(temp_file_path(&name)).unwrap();
            let (_, size) = pcm_container::parse_header(&data).unwrap();
            assert_eq!(size as usize, data.len() - HEADER_SIZE);
            fs::remove_file(temp_file_path(&name)).ok();
        }
    }

    #[test]
    fn file_size_tracks_recorded_duration() {
        let device = VirtualQueueDevice::new().with_signal(VirtualSignal::Sine {
            frequency: 440.0,
            amplitude: 8_000,
        });
        let handle = device.handle();
        let mut capture = engine("duration.wav", device);

        capture.start();
        // 2 seconds of 512-frame buffers.
        let callbacks = (2 * 44_100) / 512 + 1;
        handle.pump(callbacks);
        let summary = capture.stop().unwrap();

        let duration = summary.duration_secs.unwrap();
        let expected = duration * 44_100.0 * 2.0;
        let payload = fs::metadata(temp_file_path("duration.wav")).unwrap().len() - HEADER_SIZE as u64;
        assert!((payload as f64 - expected).abs() <= 1024.0);
        assert!((duration - 2.0).abs() < 0.02);
        fs::remove_file(temp_file_path("duration.wav")).ok();
    }

    #[test]
    fn stop_before_any_callback_leaves_empty_series() {
        let mut capture = engine("empty.wav", VirtualQueueDevice::new());
        assert!(capture.start());
        let summary = capture.stop().unwrap();
        assert_eq!(summary.amplitude_count, 0);
        assert!(capture.amplitude_series().is_empty());
        assert_eq!(capture.session_duration(), Some(0.0));
        fs::remove_file(temp_file_path("empty.wav")).ok();
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = engine("idempotent.wav", device);
        let (delegate, events) = event_channel();
        capture.set_delegate(delegate);

        assert!(capture.start());
        assert!(capture.start());
        assert_eq!(handle.queued(), 3);
        assert!(capture.stop().is_some());
        assert!(capture.stop().is_none());

        let states: Vec<EngineEvent> = events
            .try_iter()
            .filter(|e| matches!(e, EngineEvent::StateChanged(_)))
            .collect();
        assert_eq!(
            states,
            vec![
                EngineEvent::StateChanged(EngineState::Recording),
                EngineEvent::StateChanged(EngineState::Idle),
            ]
        );
        fs::remove_file(temp_file_path("idempotent.wav")).ok();
    }

    #[test]
    fn device_create_failure_leaves_engine_stopped() {
        let mut capture = engine("create_fail.wav", VirtualQueueDevice::new().with_create_failure());
        let (delegate, events) = event_channel();
        capture.set_delegate(delegate);

        assert!(!capture.start());
        assert!(!capture.is_recording());
        assert_eq!(capture.ring_len(), 0);
        assert!(capture.stop().is_none());

        let errors: Vec<EngineEvent> = events.try_iter().collect();
        assert!(matches!(errors.as_slice(), [EngineEvent::Error(EngineError::Device(_))]));
        fs::remove_file(temp_file_path("create_fail.wav")).ok();
    }

    #[test]
    fn file_create_failure_leaves_engine_stopped() {
        let blocker = temp_file_path("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = CaptureEngine::new(device, EngineConfiguration::with_file(blocker.join("rec.wav")));

        assert!(!capture.start());
        assert!(!handle.is_created());
        assert!(!capture.is_recording());
        fs::remove_file(&blocker).ok();
    }

    #[test]
    fn unavailable_timeline_keeps_previous_duration() {
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = engine("stale.wav", device);

        capture.start();
        handle.pump(86);
        capture.stop();
        let first = capture.session_duration().unwrap();
        assert!(first > 0.9);

        handle.set_timeline_available(false);
        capture.start();
        handle.pump(10);
        let summary = capture.stop().unwrap();
        assert_eq!(capture.session_duration(), Some(first));
        assert_eq!(summary.duration_secs, Some(first));
        assert_eq!(summary.amplitude_count, 10);
        fs::remove_file(temp_file_path("stale.wav")).ok();
    }

    #[test]
    fn new_recording_truncates_and_resets_series() {
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = engine("truncate.wav", device);

        capture.start();
        handle.pump(20);
        capture.stop();

        capture.start();
        handle.pump(2);
        let summary = capture.stop().unwrap();
        assert_eq!(summary.amplitude_count, 2);
        let len = fs::metadata(temp_file_path("truncate.wav")).unwrap().len();
        assert_eq!(len, HEADER_SIZE as u64 + 2 * 1024);
        fs::remove_file(temp_file_path("truncate.wav")).ok();
    }

    #[test]
    fn recording_finished_follows_idle() {
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = engine("finished.wav", device);
        let (delegate, events) = event_channel();
        capture.set_delegate(delegate);

        capture.start();
        handle.pump(4);
        capture.stop();

        let received: Vec<EngineEvent> = events.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[1], EngineEvent::StateChanged(EngineState::Idle));
        assert!(matches!(
            received[2],
            EngineEvent::RecordingFinished(ref s) if s.amplitude_count == 4 && s.bytes_written == 4096
        ));
        fs::remove_file(temp_file_path("finished.wav")).ok();
    }

    #[test]
    fn diagnostics_count_callbacks_and_bytes() {
        let device = VirtualQueueDevice::new();
        let handle = device.handle();
        let mut capture = engine("diagnostics.wav", device);

        capture.start();
        handle.pump(7);
        let diagnostics = capture.diagnostics();
        assert_eq!(diagnostics.callback_count, 7);
        assert_eq!(diagnostics.requeue_count, 7);
        assert_eq!(diagnostics.bytes_transferred, 7 * 1024);
        assert_eq!(diagnostics.io_failures, 0);
        capture.stop();
        fs::remove_file(temp_file_path("diagnostics.wav")).ok();
    }

    #[test]
    fn stop_races_paced_device_cleanly() {
        let device = VirtualQueueDevice::paced(Duration::from_millis(1))
            .with_signal(VirtualSignal::Constant(1_000));
        let handle = device.handle();
        let mut capture = engine("paced.wav", device);

        assert!(capture.start());
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.callbacks_fired() < 8 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let summary = capture.stop().unwrap();

        let fired = handle.callbacks_fired();
        assert!(fired >= 8);
        assert!(!handle.is_running());
        assert_eq!(summary.amplitude_count as u64, fired);
        assert_eq!(summary.bytes_written, fired * 1024);

        let data = fs::read(temp_file_path("paced.wav")).unwrap();
        let (_, size) = pcm_container::parse_header(&data).unwrap();
        assert_eq!(size as usize, data.len() - HEADER_SIZE);
        assert_eq!(size as u64, summary.bytes_written);

        // No callback lands after stop returned.
        thread::sleep(Duration::from_millis(10));
        assert_eq!(handle.callbacks_fired(), fired);
        fs::remove_file(temp_file_path("paced.wav")).ok();
    }
}
