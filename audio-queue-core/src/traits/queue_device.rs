use crate::models::audio_models::{PcmFormat, QueueDirection};
use crate::models::error::EngineError;
use crate::processing::buffer_ring::AudioBuffer;

/// What the engine does with a buffer the device just handed back.
#[derive(Debug)]
pub enum BufferDisposition {
    /// Give the buffer back to the device queue.
    Requeue(AudioBuffer),
    /// The engine kept the buffer; the device must not expect it again.
    Reclaimed,
}

/// Per-buffer callback registered at queue creation.
///
/// For capture the device passes a buffer it has filled; for playback it
/// passes a buffer it has drained and expects it back filled. The closure
/// captures the engine's shared state, so it only fires while the device
/// holds it: `dispose` drops it.
pub type BufferCallback = Box<dyn FnMut(AudioBuffer) -> BufferDisposition + Send + 'static>;

/// A callback-driven audio buffer queue.
///
/// Implemented by:
/// - `VirtualQueueDevice` (software, in this crate)
/// - `CpalQueueDevice` (audio hardware, in `audio-queue-cpal`)
///
/// The lifecycle is `create` → `enqueue`* → `start` → `stop` → `dispose`.
/// Callbacks may run on a device-owned thread, concurrently with the
/// control calls here.
pub trait QueueDevice {
    /// Allocate the device queue for `format` and register `callback`.
    fn create(
        &mut self,
        direction: QueueDirection,
        format: PcmFormat,
        callback: BufferCallback,
    ) -> Result<(), EngineError>;

    /// Hand a buffer to the device queue.
    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<(), EngineError>;

    /// Begin firing callbacks.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Halt the queue. Returns once no callback is running.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Release the queue, any buffers still queued, and the callback.
    fn dispose(&mut self) -> Result<(), EngineError>;

    /// Seconds of audio the device timeline has processed, if a timeline exists.
    fn current_time(&self) -> Option<f64>;
}

/// Lets a front end pick the backend at runtime (`Box<dyn QueueDevice>`).
impl<D: QueueDevice + ?Sized> QueueDevice for Box<D> {
    fn create(
        &mut self,
        direction: QueueDirection,
        format: PcmFormat,
        callback: BufferCallback,
    ) -> Result<(), EngineError> {
        (**self).create(direction, format, callback)
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<(), EngineError> {
        (**self).enqueue(buffer)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        (**self).stop()
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        (**self).dispose()
    }

    fn current_time(&self) -> Option<f64> {
        (**self).current_time()
    }
}
