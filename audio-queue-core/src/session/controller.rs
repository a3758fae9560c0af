use std::sync::Arc;

use crate::engine::capture::CaptureEngine;
use crate::engine::playback::PlaybackEngine;
use crate::models::config::SessionConfiguration;
use crate::models::error::EngineError;
use crate::models::recording_result::{RecordingMetadata, RecordingSummary};
use crate::models::state::EngineState;
use crate::report::document::Document;
use crate::report::layout::PaginatedReportBuilder;
use crate::storage::metadata;
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::queue_device::QueueDevice;

/// Front door for a UI layer: one capture and one playback pipeline over
/// the same container file.
///
/// ```text
/// record_start/stop ──► CaptureEngine<C> ──► file + amplitude series
/// play_start/stop   ──► PlaybackEngine<P> ◄── file
/// request_report    ──► PaginatedReportBuilder(series, duration)
/// ```
///
/// Capture and playback are mutually exclusive: starting one while the
/// other runs is refused.
pub struct AudioSession<C: QueueDevice, P: QueueDevice> {
    capture: CaptureEngine<C>,
    playback: PlaybackEngine<P>,
    report: PaginatedReportBuilder,
    config: SessionConfiguration,
    delegate: Option<Arc<dyn EngineDelegate>>,
}

impl<C: QueueDevice, P: QueueDevice> AudioSession<C, P> {
    pub fn new(capture_device: C, playback_device: P, config: SessionConfiguration) -> Self {
        Self {
            capture: CaptureEngine::new(capture_device, config.engine.clone()),
            playback: PlaybackEngine::new(playback_device, config.engine.clone()),
            report: PaginatedReportBuilder::new(config.report.clone()),
            config,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn EngineDelegate>) {
        self.capture.set_delegate(Arc::clone(&delegate));
        self.playback.set_delegate(Arc::clone(&delegate));
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> EngineState {
        if self.capture.is_recording() {
            EngineState::Recording
        } else if self.playback.is_playing() {
            EngineState::Playing(self.playback.pitch_mode())
        } else {
            EngineState::Idle
        }
    }

    pub fn record_start(&mut self) -> bool {
        if self.playback.is_playing() {
            log::warn!("cannot record while playing");
            return false;
        }
        self.capture.start()
    }

    /// Stop recording and, if configured, write the metadata sidecar.
    pub fn record_stop(&mut self) -> Option<RecordingSummary> {
        let summary = self.capture.stop()?;
        if self.config.write_metadata {
            if let Err(e) = self.write_metadata(&summary) {
                log::error!("failed to write recording metadata: {}", e);
                if let Some(delegate) = &self.delegate {
                    delegate.on_error(&e);
                }
            }
        }
        Some(summary)
    }

    pub fn play_start(&mut self, pitch_offset_cents: Option<f32>) -> bool {
        if self.capture.is_recording() {
            log::warn!("cannot play while recording");
            return false;
        }
        self.playback.start(pitch_offset_cents)
    }

    pub fn play_stop(&mut self) {
        self.playback.stop();
    }

    /// Chart document for the last recording. `None` if nothing was
    /// recorded or its duration is unknown.
    pub fn request_report(&self) -> Option<Document> {
        let series = self.capture.amplitude_series();
        let document = self
            .report
            .build_report(series.as_slice(), self.capture.session_duration());
        if document.is_none() {
            log::info!(
                "no report: {} amplitude samples, duration {:?}",
                series.len(),
                self.capture.session_duration()
            );
        }
        document
    }

    pub fn capture(&self) -> &CaptureEngine<C> {
        &self.capture
    }

    pub fn playback(&self) -> &PlaybackEngine<P> {
        &self.playback
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.config
    }

    fn write_metadata(&self, summary: &RecordingSummary) -> Result<(), EngineError> {
        let checksum = metadata::file_checksum(&summary.file_path)?;
        let record = RecordingMetadata::new(
            summary,
            self.config.engine.format,
            &checksum,
            self.capture.amplitude_series().into_vec(),
        );
        metadata::write_metadata(&record, &summary.file_path)?;
        log::debug!(
            "wrote {}",
            metadata::metadata_path(&summary.file_path).display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::virtual_device::{VirtualDeviceHandle, VirtualQueueDevice, VirtualSignal};
    use crate::models::config::EngineConfiguration;
    use crate::models::state::{EngineEvent, PitchMode};
    use crate::traits::engine_delegate::event_channel;
    use std::fs;
    use std::path::PathBuf;

    type VirtualSession = AudioSession<VirtualQueueDevice, VirtualQueueDevice>;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_queue_session_{}_{}", std::process::id(), name))
    }

    fn session(name: &str, write_metadata: bool) -> (VirtualSession, VirtualDeviceHandle, VirtualDeviceHandle) {
        let mic = VirtualQueueDevice::new().with_signal(VirtualSignal::Sine {
            frequency: 220.0,
            amplitude: 12_000,
        });
        let speaker = VirtualQueueDevice::new();
        let (mic_handle, speaker_handle) = (mic.handle(), speaker.handle());
        let config = SessionConfiguration {
            engine: EngineConfiguration::with_file(temp_file_path(name)),
            write_metadata,
            ..Default::default()
        };
        (AudioSession::new(mic, speaker, config), mic_handle, speaker_handle)
    }

    fn cleanup(name: &str) {
        let path = temp_file_path(name);
        fs::remove_file(metadata::metadata_path(&path)).ok();
        fs::remove_file(path).ok();
    }

    #[test]
    fn record_play_report_round() {
        let (mut session, mic, speaker) = session("round.wav", false);
        let (delegate, events) = event_channel();
        session.set_delegate(delegate);

        assert!(session.record_start());
        assert_eq!(session.state(), EngineState::Recording);
        // ~25 s of audio at 512 frames per callback.
        mic.pump(2154);
        let summary = session.record_stop().unwrap();
        assert_eq!(session.state(), EngineState::Idle);
        assert_eq!(summary.amplitude_count, 2154);

        let report = session.request_report().unwrap();
        assert_eq!(report.page_count(), 1);
        assert_eq!(report.pages[0].rects().count(), 3);

        assert!(session.play_start(Some(-200.0)));
        assert_eq!(session.state(), EngineState::Playing(PitchMode::Low));
        speaker.pump(5000);
        assert_eq!(session.state(), EngineState::Idle);
        assert_eq!(speaker.rendered().len() as u64, summary.bytes_written);

        let states: Vec<EngineState> = events
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                EngineState::Recording,
                EngineState::Idle,
                EngineState::Playing(PitchMode::Low),
                EngineState::Idle,
            ]
        );
        cleanup("round.wav");
    }

    #[test]
    fn capture_and_playback_are_exclusive() {
        let (mut session, mic, _speaker) = session("exclusive.wav", false);

        session.record_start();
        mic.pump(10);
        assert!(!session.play_start(None));
        session.record_stop();

        assert!(session.play_start(None));
        assert!(!session.record_start());
        assert!(session.state().is_playing());
        session.play_stop();
        assert!(session.state().is_idle());
        cleanup("exclusive.wav");
    }

    #[test]
    fn report_is_none_before_any_callback() {
        let (mut session, _mic, _speaker) = session("no_report.wav", false);
        assert!(session.request_report().is_none());

        session.record_start();
        session.record_stop();
        assert!(session.request_report().is_none());
        cleanup("no_report.wav");
    }

    #[test]
    fn record_stop_writes_metadata_sidecar() {
        let (mut session, mic, _speaker) = session("sidecar.wav", true);
        session.record_start();
        mic.pump(40);
        let summary = session.record_stop().unwrap();

        let stored = metadata::read_metadata(&summary.file_path).unwrap();
        assert_eq!(stored.amplitudes.len(), 40);
        assert_eq!(stored.bytes_written, 40 * 1024);
        assert_eq!(stored.duration_secs, summary.duration_secs);
        assert_eq!(
            stored.checksum,
            metadata::file_checksum(&summary.file_path).unwrap()
        );
        cleanup("sidecar.wav");
    }

    #[test]
    fn stopping_idle_session_is_harmless() {
        let (mut session, _mic, _speaker) = session("idle.wav", true);
        assert!(session.record_stop().is_none());
        session.play_stop();
        assert!(session.state().is_idle());
        assert!(!metadata::metadata_path(&temp_file_path("idle.wav")).exists());
    }
}
