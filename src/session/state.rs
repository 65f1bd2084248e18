//! Playback session lifecycle states

use std::fmt;

/// Lifecycle state of a playback session.
///
/// Equality is by variant; two `Error` values are equal iff their diagnostic
/// strings match (the string is surfaced to the UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No playback requested yet
    Idle,
    /// Transport connect in flight
    Connecting,
    /// Media flowing and being decoded
    Playing,
    /// Playback suspended; incoming tags are discarded
    Paused,
    /// Stopped by the caller
    Stopped,
    /// Failed; the string is the diagnostic shown to the user
    Error(String),
}

impl SessionState {
    /// Short state name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
            SessionState::Error(_) => "error",
        }
    }

    /// Whether `play()` may start a new attempt from this state
    pub fn accepts_play(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Stopped | SessionState::Error(_)
        )
    }

    /// Whether a first media tag or play-start status promotes to `Playing`.
    ///
    /// Covers the initial connect and the reconnect path (which retries out
    /// of the error state without an intermediate transition).
    pub fn accepts_promotion(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Error(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Error(cause) => write!(f, "error: {}", cause),
            other => write!(f, "{}", other.name()),
        }
    }
}
