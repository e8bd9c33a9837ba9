mod mock;
mod provider;
mod synthetic;

pub use mock::{MockMediaProvider, StreamControl};
pub use provider::{
    acquire_with_fallback, CameraFacing, CaptureStream, MediaConstraints, MediaProvider,
    MediaTrack, TrackKind,
};
pub use synthetic::SyntheticCamera;
