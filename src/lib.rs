pub mod annotation;
pub mod app;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod media;
pub mod overlay;
pub mod recording;

pub use app::{ClipSession, SessionCommand, SessionHandle, SessionState};
pub use config::ClipcamConfig;
pub use error::{ClipcamError, DetectorError, MediaError, Result};
pub use events::{ClipcamEvent, EventBus, EventReceiver};
pub use frame::VideoFrame;
pub use annotation::{AnnotationLoop, FramePacer, IntervalPacer, ManualPacer};
pub use detector::{
    BoundingBox, DetectorFactory, DetectorFuture, DetectorLoader, FaceDetection, FaceDetector,
    Keypoint, MockDetector,
};
pub use keyboard_input::KeyboardInputHandler;
pub use media::{
    acquire_with_fallback, CameraFacing, CaptureStream, MediaConstraints, MediaProvider,
    MediaTrack, MockMediaProvider, SyntheticCamera, TrackKind,
};
pub use overlay::{DrawnShape, OverlayCanvas};
pub use recording::{
    ArtifactHandle, ArtifactSnapshot, ClipRecorder, PassthroughRecorder, RecordDuration,
    RecordingSession, ARTIFACT_MIME,
};
