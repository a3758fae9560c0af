use std::sync::Arc;

use crate::models::audio_models::{EngineDiagnostics, PcmFormat, QueueDirection};
use crate::models::config::EngineConfiguration;
use crate::models::error::EngineError;
use crate::models::state::{EngineState, PitchMode};
use crate::processing::buffer_ring::AudioBuffer;
use crate::processing::pitch::PitchShifter;
use crate::storage::pcm_file::PcmFileReader;
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::queue_device::QueueDevice;

use super::queue_engine::{BufferQueueEngine, QueueStage, StageOutcome, StartOutcome};

/// Playback half: drained buffers are refilled from the container.
#[derive(Debug, Default)]
pub struct PlaybackStage {
    reader: Option<PcmFileReader>,
    pitch_offset: Option<f32>,
    shifter: Option<PitchShifter>,
}

impl PlaybackStage {
    /// Offset applied from the next `open`. `None` or 0 plays unmodified.
    pub fn set_pitch_offset(&mut self, cents: Option<f32>) {
        self.pitch_offset = cents;
    }

    /// Offset in effect for the open session, after clamping.
    pub fn effective_pitch(&self) -> Option<f32> {
        self.shifter.as_ref().map(PitchShifter::cents)
    }
}

impl QueueStage for PlaybackStage {
    fn direction(&self) -> QueueDirection {
        QueueDirection::Playback
    }

    fn open(&mut self, config: &EngineConfiguration) -> Result<PcmFormat, EngineError> {
        let reader = PcmFileReader::open(&config.file_path)?;
        let format = reader.format();
        log::debug!(
            "playing {} ({:.2} s, {:?})",
            config.file_path.display(),
            reader.duration_secs(),
            format
        );
        self.shifter = self
            .pitch_offset
            .filter(|cents| *cents != 0.0)
            .map(|cents| PitchShifter::new(cents, format.channels));
        self.reader = Some(reader);
        Ok(format)
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> StageOutcome {
        let Some(reader) = self.reader.as_mut() else {
            buffer.clear();
            return StageOutcome::EndOfStream;
        };
        match reader.read_frames(buffer.storage_mut()) {
            Ok(0) => {
                buffer.clear();
                StageOutcome::EndOfStream
            }
            Ok(n) => {
                buffer.set_len(n);
                if let Some(shifter) = self.shifter.as_mut() {
                    shifter.process_bytes(buffer.bytes_mut());
                }
                StageOutcome::Continue
            }
            Err(e) => {
                buffer.clear();
                StageOutcome::Stalled(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
        self.shifter = None;
        Ok(())
    }

    fn cursor(&self) -> u64 {
        self.reader.as_ref().map_or(0, PcmFileReader::cursor)
    }
}

/// Streams the PCM container to a `QueueDevice`, optionally pitch shifted.
///
/// Playback ends by itself once the file is exhausted and every queued
/// buffer has been drained; observers see `Playing → Idle`.
pub struct PlaybackEngine<D: QueueDevice> {
    engine: BufferQueueEngine<D, PlaybackStage>,
    mode: PitchMode,
}

impl<D: QueueDevice> PlaybackEngine<D> {
    pub fn new(device: D, config: EngineConfiguration) -> Self {
        Self {
            engine: BufferQueueEngine::new(device, PlaybackStage::default(), config),
            mode: PitchMode::Plain,
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn EngineDelegate>) {
        self.engine.set_delegate(delegate);
    }

    /// Start playback. Returns whether playback is running afterwards.
    ///
    /// Calling this while already playing keeps the current session and its
    /// pitch.
    pub fn start(&mut self, pitch_offset_cents: Option<f32>) -> bool {
        if self.engine.is_active() {
            log::debug!("playback already running");
            return true;
        }

        let mode = PitchMode::from_offset(pitch_offset_cents);
        self.engine
            .with_stage(|stage| stage.set_pitch_offset(pitch_offset_cents));

        match self.engine.start(EngineState::Playing(mode)) {
            Ok(StartOutcome::Started) | Ok(StartOutcome::AlreadyRunning) => {
                self.mode = mode;
                log::info!(
                    "playing {} ({:?}, offset {:?} cents)",
                    self.engine.config().file_path.display(),
                    mode,
                    self.engine.with_stage(|stage| stage.effective_pitch())
                );
                true
            }
            Ok(StartOutcome::Exhausted) => {
                log::warn!(
                    "{} has no audio to play",
                    self.engine.config().file_path.display()
                );
                false
            }
            Err(e) => {
                log::error!("failed to start playback: {}", e);
                self.engine.report_error(&e);
                false
            }
        }
    }

    pub fn stop(&mut self) {
        match self.engine.stop() {
            Some(outcome) if outcome.was_active => log::info!("playback stopped"),
            Some(_) => log::debug!("released finished playback queue"),
            None => log::debug!("playback already stopped"),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_active()
    }

    /// Pitch flavour of the current or last session.
    pub fn pitch_mode(&self) -> PitchMode {
        self.mode
    }

    /// Payload bytes read in the running session, 0 when stopped.
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
