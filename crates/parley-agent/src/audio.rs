//! Audio device state.
//!
//! The microphone and the speaker are never active together. [`AudioController`]
//! enforces that with a three-state machine and exposes its current state as
//! packet metadata, so the rest of the turn can see whether the agent is
//! mid-utterance without the packet ever reaching the model.

use std::fmt;

use parley_context::ContextPacket;
use parley_settings::PacketPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// Source tag on audio-state packets.
pub const AUDIO_SOURCE: &str = "audio";

/// Kind tag on audio-state packets. Not a renderable kind.
pub const AUDIO_STATE_KIND: &str = "audio_state";

/// What the audio devices are doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioState {
    /// Both devices off.
    #[default]
    Idle,
    /// Microphone on.
    Listening,
    /// Speaker on.
    Speaking,
}

impl AudioState {
    /// Lower-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
        }
    }
}

impl fmt::Display for AudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal audio transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    /// A device was requested while the other one is active.
    #[error("cannot start {requested} while {current}")]
    Busy {
        /// State that was requested.
        requested: AudioState,
        /// State the controller is in.
        current: AudioState,
    },
}

/// Mutual-exclusion state machine for microphone and speaker.
#[derive(Clone, Debug, Default)]
pub struct AudioController {
    state: AudioState,
}

impl AudioController {
    /// Start idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    /// Current state.
    pub fn state(&self) -> AudioState {
        self.state
    }

    /// Turn the microphone on. Only legal from idle.
    pub fn begin_listening(&mut self) -> Result<(), AudioError> {
        self.begin(AudioState::Listening)?;
        info!("microphone on");
        Ok(())
    }

    /// Turn the microphone off. No-op unless listening.
    pub fn end_listening(&mut self) {
        if self.end(AudioState::Listening) {
            info!("microphone off");
        }
    }

    /// Turn the speaker on. Only legal from idle.
    pub fn begin_speaking(&mut self) -> Result<(), AudioError> {
        self.begin(AudioState::Speaking)?;
        info!("speaker on");
        Ok(())
    }

    /// Turn the speaker off. No-op unless speaking.
    pub fn end_speaking(&mut self) {
        if self.end(AudioState::Speaking) {
            info!("speaker off");
        }
    }

    #[must_use]
    /// Whether captured audio should be consumed right now.
    pub fn can_listen(&self) -> bool {
        self.state == AudioState::Listening
    }

    /// State snapshot for packet metadata.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let _ = map.insert("state".into(), Value::String(self.state.as_str().to_owned()));
        map
    }

    /// Audio-state packet carrying [`snapshot`](Self::snapshot) as metadata.
    #[must_use]
    pub fn to_packet(&self, policy: PacketPolicy) -> ContextPacket {
        ContextPacket::new(AUDIO_STATE_KIND, Value::Null, AUDIO_SOURCE, policy.ttl)
            .with_priority(policy.priority)
            .with_metadata(self.snapshot())
    }

    fn begin(&mut self, requested: AudioState) -> Result<(), AudioError> {
        if self.state != AudioState::Idle {
            return Err(AudioError::Busy {
                requested,
                current: self.state,
            });
        }
        self.state = requested;
        Ok(())
    }

    fn end(&mut self, active: AudioState) -> bool {
        if self.state != active {
            return false;
        }
        self.state = AudioState::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parley_context::{PacketKind, render_packet};
    use serde_json::json;

    #[test]
    fn starts_idle() {
        let audio = AudioController::new();
        assert_eq!(audio.state(), AudioState::Idle);
        assert!(!audio.can_listen());
    }

    #[test]
    fn listen_cycle() {
        let mut audio = AudioController::new();
        audio.begin_listening().unwrap();
        assert!(audio.can_listen());
        audio.end_listening();
        assert_eq!(audio.state(), AudioState::Idle);
    }

    #[test]
    fn speak_cycle() {
        let mut audio = AudioController::new();
        audio.begin_speaking().unwrap();
        assert_eq!(audio.state(), AudioState::Speaking);
        audio.end_speaking();
        assert_eq!(audio.state(), AudioState::Idle);
    }

    #[test]
    fn cannot_listen_while_speaking() {
        let mut audio = AudioController::new();
        audio.begin_speaking().unwrap();
        let err = audio.begin_listening().unwrap_err();
        assert_matches!(
            err,
            AudioError::Busy {
                requested: AudioState::Listening,
                current: AudioState::Speaking
            }
        );
        assert_eq!(err.to_string(), "cannot start listening while speaking");
        assert_eq!(audio.state(), AudioState::Speaking);
    }

    #[test]
    fn cannot_speak_while_listening() {
        let mut audio = AudioController::new();
        audio.begin_listening().unwrap();
        assert!(audio.begin_speaking().is_err());
        assert!(audio.can_listen());
    }

    #[test]
    fn double_begin_is_rejected() {
        let mut audio = AudioController::new();
        audio.begin_listening().unwrap();
        assert!(audio.begin_listening().is_err());
    }

    #[test]
    fn mismatched_end_is_noop() {
        let mut audio = AudioController::new();
        audio.begin_speaking().unwrap();
        audio.end_listening();
        assert_eq!(audio.state(), AudioState::Speaking);
    }

    #[test]
    fn transitions_are_logged() {
        let (logs, _guard) = parley_core::logging::capture_logs();
        let mut audio = AudioController::new();
        audio.begin_listening().unwrap();
        audio.end_listening();
        audio.end_listening();
        assert!(logs.has_message("microphone on"));
        assert_eq!(
            logs.events().iter().filter(|e| e.message == "microphone off").count(),
            1
        );
    }

    #[test]
    fn packet_carries_state_and_renders_nothing() {
        let mut audio = AudioController::new();
        audio.begin_listening().unwrap();
        let packet = audio.to_packet(PacketPolicy::new(-1, 0));

        assert_eq!(packet.kind(), &PacketKind::Unknown(AUDIO_STATE_KIND.into()));
        assert_eq!(packet.source(), AUDIO_SOURCE);
        assert_eq!(
            packet.metadata().and_then(|m| m.get("state")),
            Some(&json!("listening"))
        );
        assert!(render_packet(&packet).is_empty());
    }
}
