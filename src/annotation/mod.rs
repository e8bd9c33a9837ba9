mod looper;
mod pacer;

pub use looper::AnnotationLoop;
pub use pacer::{FramePacer, IntervalPacer, ManualPacer};
