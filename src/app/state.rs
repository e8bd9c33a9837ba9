use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle states.
///
/// Exactly one value is live at a time; the transition table in the session
/// actor is the only way to change it. A single enum rather than scattered
/// booleans: "is recording", "has stream" and the rest all derive from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No capture stream; waiting for the user to request the camera
    Idle,
    /// Waiting on the host's permission prompt
    PermissionPending,
    /// Live preview; annotation and duration are configurable
    Ready,
    /// A recording pass is accumulating
    Recording,
    /// A finished artifact is available
    Finished,
}

impl SessionState {
    /// Whether this state owns the capture stream
    pub fn owns_stream(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Recording)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::PermissionPending => "permission-pending",
            SessionState::Ready => "ready",
            SessionState::Recording => "recording",
            SessionState::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}
