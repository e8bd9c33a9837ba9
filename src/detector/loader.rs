use super::types::FaceDetector;
use crate::error::DetectorError;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub type DetectorFuture = BoxFuture<'static, Result<Arc<dyn FaceDetector>, DetectorError>>;

/// Factory producing the detector instance; invoked at most once per session
pub type DetectorFactory = Box<dyn Fn() -> DetectorFuture + Send + Sync>;

/// Lazy, one-shot, session-scoped detector loader.
///
/// Concurrent or repeated `load_once` calls while a load is in flight or
/// already resolved never start a second load; a failed load is cached as
/// failed for the rest of the session (no automatic retry).
pub struct DetectorLoader {
    factory: DetectorFactory,
    cell: OnceCell<Result<Arc<dyn FaceDetector>, DetectorError>>,
}

impl DetectorLoader {
    pub fn new(factory: DetectorFactory) -> Self {
        Self {
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Load the detector, or return the cached outcome of the first load
    pub async fn load_once(&self) -> Result<Arc<dyn FaceDetector>, DetectorError> {
        self.cell
            .get_or_init(|| async {
                info!("Loading face detector");
                match (self.factory)().await {
                    Ok(detector) => {
                        info!("Face detector loaded");
                        Ok(detector)
                    }
                    Err(e) => {
                        warn!("Face detector load failed: {}", e);
                        Err(e)
                    }
                }
            })
            .await
            .clone()
    }

    /// The already-loaded handle, if the load has completed successfully
    pub fn get(&self) -> Option<Arc<dyn FaceDetector>> {
        match self.cell.get() {
            Some(Ok(detector)) => Some(Arc::clone(detector)),
            _ => None,
        }
    }

    /// Whether a load attempt has already completed (successfully or not)
    pub fn attempted(&self) -> bool {
        self.cell.get().is_some()
    }
}
