use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::models::audio_models::{EngineDiagnostics, PcmFormat, QueueDirection};
use crate::models::config::EngineConfiguration;
use crate::models::error::EngineError;
use crate::models::state::EngineState;
use crate::processing::buffer_ring::{AudioBuffer, BufferRing};
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::queue_device::{BufferDisposition, QueueDevice};

/// Result of pushing one buffer through a stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// Buffer handled; hand it back to the device if the engine is still active.
    Continue,
    /// This buffer failed. It is held back, the session goes on.
    Stalled(EngineError),
    /// No more data for this direction.
    EndOfStream,
}

/// Direction-specific half of a buffer-queue engine.
///
/// A capture stage consumes the bytes the device filled; a playback stage
/// fills the buffer the device drained.
pub trait QueueStage: Send + 'static {
    fn direction(&self) -> QueueDirection;

    /// Prepare for a new session and return the stream format.
    fn open(&mut self, config: &EngineConfiguration) -> Result<PcmFormat, EngineError>;

    /// Handle one buffer.
    fn process(&mut self, buffer: &mut AudioBuffer) -> StageOutcome;

    /// Release the session's file. Must tolerate being called when not open.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Bytes transferred in the current session.
    fn cursor(&self) -> u64;
}

/// What `BufferQueueEngine::start` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed.
    AlreadyRunning,
    /// The stage had nothing to stream, so no session was started.
    Exhausted,
}

/// What `BufferQueueEngine::stop` tore down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopOutcome {
    /// The session was still running (not already ended by the stage).
    pub was_active: bool,
    /// Device timeline position read before the queue was halted.
    pub device_time: Option<f64>,
}

/// State shared between the control side and the device callback.
///
/// `active` is the only guard the callback consults before extending a
/// session. The locks below it protect data, never control flow.
struct QueueShared<S> {
    direction: QueueDirection,
    active: AtomicBool,
    announced: AtomicBool,
    stage: Mutex<S>,
    ring: Mutex<BufferRing>,
    diagnostics: Mutex<EngineDiagnostics>,
    delegate: RwLock<Option<Arc<dyn EngineDelegate>>>,
}

impl<S: QueueStage> QueueShared<S> {
    fn handle_buffer(&self, mut buffer: AudioBuffer) -> BufferDisposition {
        self.diagnostics.lock().callback_count += 1;

        if self.direction == QueueDirection::Playback && !self.active.load(Ordering::Acquire) {
            return self.reclaim(buffer);
        }

        let outcome = self.stage.lock().process(&mut buffer);
        match outcome {
            StageOutcome::Continue => {
                let mut diagnostics = self.diagnostics.lock();
                diagnostics.bytes_transferred += buffer.len() as u64;
                if self.active.load(Ordering::Acquire) {
                    diagnostics.requeue_count += 1;
                    return BufferDisposition::Requeue(buffer);
                }
                drop(diagnostics);
                self.reclaim(buffer)
            }
            StageOutcome::Stalled(error) => {
                self.diagnostics.lock().io_failures += 1;
                log::error!("{:?} buffer {} failed: {}", self.direction, buffer.index(), error);
                self.report_error(&error);
                self.reclaim_and_drain(buffer)
            }
            StageOutcome::EndOfStream => {
                log::debug!("{:?} end of stream at buffer {}", self.direction, buffer.index());
                self.reclaim_and_drain(buffer)
            }
        }
    }

    fn reclaim(&self, buffer: AudioBuffer) -> BufferDisposition {
        self.ring.lock().reclaim(buffer);
        BufferDisposition::Reclaimed
    }

    /// Reclaim, and end the session once no buffer is left with the device.
    fn reclaim_and_drain(&self, buffer: AudioBuffer) -> BufferDisposition {
        let drained = {
            let mut ring = self.ring.lock();
            ring.reclaim(buffer);
            ring.in_flight_count() == 0
        };
        if drained {
            self.end_session();
        }
        BufferDisposition::Reclaimed
    }

    /// Stop from the device side. The device itself is disposed by the next
    /// control call.
    fn end_session(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            log::info!("{:?} queue drained, stopping", self.direction);
            self.close_stage();
            self.announce_idle();
        }
    }

    fn close_stage(&self) {
        if let Err(e) = self.stage.lock().close() {
            log::error!("failed to close {:?} stage: {}", self.direction, e);
            self.report_error(&e);
        }
    }

    fn announce(&self, state: EngineState) {
        self.announced.store(true, Ordering::Release);
        self.notify_state(&state);
    }

    fn announce_idle(&self) {
        if self.announced.swap(false, Ordering::AcqRel) {
            self.notify_state(&EngineState::Idle);
        }
    }

    fn notify_state(&self, state: &EngineState) {
        if let Some(delegate) = self.delegate.read().as_ref() {
            delegate.on_state_changed(state);
        }
    }

    fn report_error(&self, error: &EngineError) {
        if let Some(delegate) = self.delegate.read().as_ref() {
            delegate.on_error(error);
        }
    }
}

/// Buffer-queue engine generic over device and direction.
///
/// ```text
///  start: stage.open → ring alloc → device.create → active=true
///         → enqueue/prime every buffer → device.start
///  callback: stage.process → requeue only while active
///  stop:  active=false → device time → device.stop/dispose
///         → stage.close → ring clear
/// ```
pub struct BufferQueueEngine<D: QueueDevice, S: QueueStage> {
    device: D,
    config: EngineConfiguration,
    shared: Arc<QueueShared<S>>,
    created: bool,
}

impl<D: QueueDevice, S: QueueStage> BufferQueueEngine<D, S> {
    pub fn new(device: D, stage: S, config: EngineConfiguration) -> Self {
        Self {
            device,
            config,
            shared: Arc::new(QueueShared {
                direction: stage.direction(),
                active: AtomicBool::new(false),
                announced: AtomicBool::new(false),
                stage: Mutex::new(stage),
                ring: Mutex::new(BufferRing::empty()),
                diagnostics: Mutex::new(EngineDiagnostics::default()),
                delegate: RwLock::new(None),
            }),
            created: false,
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn EngineDelegate>) {
        *self.shared.delegate.write() = Some(delegate);
    }

    pub fn direction(&self) -> QueueDirection {
        self.shared.direction
    }

    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next `start`.
    pub fn set_config(&mut self, config: EngineConfiguration) {
        self.config = config;
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Slots currently allocated in the ring (0 when stopped).
    pub fn ring_len(&self) -> usize {
        self.shared.ring.lock().len()
    }

    pub fn cursor(&self) -> u64 {
        self.shared.stage.lock().cursor()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    pub fn with_stage<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.shared.stage.lock())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub(crate) fn report_error(&self, error: &EngineError) {
        self.shared.report_error(error);
    }

    pub(crate) fn delegate(&self) -> Option<Arc<dyn EngineDelegate>> {
        self.shared.delegate.read().clone()
    }

    /// Start a session, announcing `running_state` once the ring is primed.
    ///
    /// On error everything set up so far is torn down and the engine is left
    /// stopped.
    pub fn start(&mut self, running_state: EngineState) -> Result<StartOutcome, EngineError> {
        if self.is_active() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        if self.created {
            // Previous session ended itself; its device is still allocated.
            self.teardown();
        }
        self.config
            .validate()
            .map_err(EngineError::ConfigurationFailed)?;

        match self.try_start(running_state) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    fn try_start(&mut self, running_state: EngineState) -> Result<StartOutcome, EngineError> {
        let format = self.shared.stage.lock().open(&self.config)?;
        let frame = format.bytes_per_frame().max(1);
        let buffer_size = (self.config.buffer_size_bytes / frame).max(1) * frame;
        let count = self.config.buffer_count;

        *self.shared.ring.lock() = BufferRing::new(count, buffer_size);
        *self.shared.diagnostics.lock() = EngineDiagnostics::default();

        let shared = Arc::clone(&self.shared);
        self.device.create(
            self.shared.direction,
            format,
            Box::new(move |buffer: AudioBuffer| shared.handle_buffer(buffer)),
        )?;
        self.created = true;
        self.shared.active.store(true, Ordering::Release);

        for _ in 0..count {
            let Some(buffer) = self.shared.ring.lock().checkout() else {
                break;
            };
            match self.shared.direction {
                QueueDirection::Capture => self.device.enqueue(buffer)?,
                QueueDirection::Playback => {
                    if let BufferDisposition::Requeue(buffer) = self.shared.handle_buffer(buffer) {
                        self.device.enqueue(buffer)?;
                    }
                }
            }
        }

        if !self.is_active() {
            log::info!("{:?} stage had no data, not starting", self.shared.direction);
            self.teardown();
            return Ok(StartOutcome::Exhausted);
        }

        self.shared.announce(running_state);
        self.device.start()?;
        log::debug!(
            "{:?} queue started: {} x {} bytes, {:?}",
            self.shared.direction,
            count,
            buffer_size,
            format
        );
        Ok(StartOutcome::Started)
    }

    /// Tear down the current session. `None` if there was nothing to stop.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        if !self.created && !self.is_active() {
            return None;
        }
        let was_active = self.is_active();
        let device_time = self.teardown();
        Some(StopOutcome {
            was_active,
            device_time,
        })
    }

    fn teardown(&mut self) -> Option<f64> {
        self.shared.active.store(false, Ordering::Release);

        let mut device_time = None;
        if self.created {
            device_time = self.device.current_time();
            if let Err(e) = self.device.stop() {
                log::warn!("{:?} queue stop failed: {}", self.shared.direction, e);
            }
            if let Err(e) = self.device.dispose() {
                log::warn!("{:?} queue dispose failed: {}", self.shared.direction, e);
            }
            self.created = false;
        }

        self.shared.close_stage();
        self.shared.ring.lock().clear();
        self.shared.announce_idle();
        device_time
    }
}

impl<D: QueueDevice, S: QueueStage> Drop for BufferQueueEngine<D, S> {
    fn drop(&mut self) {
        if self.created || self.is_active() {
            self.teardown();
        }
    }
}
