mod artifact;
mod duration;
mod recorder;
mod session;

pub use artifact::{ArtifactHandle, ArtifactSnapshot, ARTIFACT_MIME};
pub use duration::RecordDuration;
pub use recorder::{ClipRecorder, PassthroughRecorder};
pub use session::RecordingSession;
