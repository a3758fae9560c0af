use std::sync::mpsc;
use std::sync::Arc;

use crate::models::error::EngineError;
use crate::models::recording_result::RecordingSummary;
use crate::models::state::{EngineEvent, EngineState};

/// Receives engine notifications.
///
/// Methods may be called from a device callback thread as well as the
/// control thread. Implementations must not block.
pub trait EngineDelegate: Send + Sync {
    /// Called on every state transition.
    fn on_state_changed(&self, state: &EngineState);

    /// Called when a setup or mid-stream error stops a pipeline.
    fn on_error(&self, error: &EngineError);

    /// Called after a recording is closed.
    fn on_recording_finished(&self, _summary: &RecordingSummary) {}
}

/// Forwards every notification into an mpsc channel as an `EngineEvent`.
#[derive(Debug)]
pub struct ChannelDelegate {
    sender: mpsc::Sender<EngineEvent>,
}

impl ChannelDelegate {
    fn send(&self, event: EngineEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(event);
    }
}

impl EngineDelegate for ChannelDelegate {
    fn on_state_changed(&self, state: &EngineState) {
        self.send(EngineEvent::StateChanged(*state));
    }

    fn on_error(&self, error: &EngineError) {
        self.send(EngineEvent::Error(error.clone()));
    }

    fn on_recording_finished(&self, summary: &RecordingSummary) {
        self.send(EngineEvent::RecordingFinished(summary.clone()));
    }
}

/// Create a delegate and the receiver for its events.
pub fn event_channel() -> (Arc<ChannelDelegate>, mpsc::Receiver<EngineEvent>) {
    let (sender, receiver) = mpsc::channel();
    let delegate = Arc::new(ChannelDelegate { sender });
    (delegate, receiver)
}
