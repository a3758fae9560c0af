use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::recording_result::RecordingSummary;

/// Pitch offset applied to playback, in cents. Larger offsets are clamped.
pub const MAX_PITCH_OFFSET_CENTS: f32 = 600.0;

/// Preset offset used for the high/low playback buttons.
pub const PRESET_PITCH_OFFSET_CENTS: f32 = 200.0;

/// Playback flavour reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchMode {
    Plain,
    High,
    Low,
}

impl PitchMode {
    /// Classifies an optional offset by sign. Absent or zero is `Plain`.
    pub fn from_offset(cents: Option<f32>) -> Self {
        match cents {
            Some(c) if c > 0.0 => Self::High,
            Some(c) if c < 0.0 => Self::Low,
            _ => Self::Plain,
        }
    }

    /// Preset offset for this mode, `None` for plain playback.
    pub fn cents(self) -> Option<f32> {
        match self {
            Self::Plain => None,
            Self::High => Some(PRESET_PITCH_OFFSET_CENTS),
            Self::Low => Some(-PRESET_PITCH_OFFSET_CENTS),
        }
    }
}

/// Externally visible engine state.
///
/// Transitions:
/// ```text
/// idle → recording → idle
/// idle → playing(plain | high | low) → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "pitch", rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Recording,
    Playing(PitchMode),
}

impl EngineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing(_))
    }
}

/// Discrete events delivered through `ChannelDelegate`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    Error(EngineError),
    RecordingFinished(RecordingSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_mode_follows_offset_sign() {
        assert_eq!(PitchMode::from_offset(None), PitchMode::Plain);
        assert_eq!(PitchMode::from_offset(Some(0.0)), PitchMode::Plain);
        assert_eq!(PitchMode::from_offset(Some(150.0)), PitchMode::High);
        assert_eq!(PitchMode::from_offset(Some(-1.0)), PitchMode::Low);
    }

    #[test]
    fn presets_round_trip_through_mode() {
        for mode in [PitchMode::Plain, PitchMode::High, PitchMode::Low] {
            assert_eq!(PitchMode::from_offset(mode.cents()), mode);
        }
    }

    #[test]
    fn state_serializes_with_pitch() {
        let json = serde_json::to_string(&EngineState::Playing(PitchMode::Low)).unwrap();
        assert_eq!(json, r#"{"state":"playing","pitch":"low"}"#);
        let json = serde_json::to_string(&EngineState::Idle).unwrap();
        assert_eq!(json, r#"{"state":"idle"}"#);
    }
}
