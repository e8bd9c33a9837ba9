mod loader;
mod mock;
mod types;

pub use loader::{DetectorFactory, DetectorFuture, DetectorLoader};
pub use mock::MockDetector;
pub use types::{BoundingBox, FaceDetection, FaceDetector, Keypoint};
