use crate::error::{ClipcamError, Result};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const ARTIFACT_MIME: &str = "video/webm";

/// A revocable reference to a finished recording's bytes.
///
/// Created once at recording finalization; revoked when the user discards it
/// so the blob's memory is released. An empty recording is a valid artifact.
#[derive(Debug)]
pub struct ArtifactHandle {
    id: Uuid,
    created_at: DateTime<Utc>,
    data: Option<Bytes>,
}

/// A cheap, read-only view of an unrevoked artifact
#[derive(Debug, Clone)]
pub struct ArtifactSnapshot {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: &'static str,
    pub data: Bytes,
}

impl ArtifactHandle {
    pub fn new(data: Bytes) -> Self {
        let handle = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            data: Some(data),
        };
        debug!(
            "Artifact {} created ({} bytes)",
            handle.id,
            handle.len()
        );
        handle
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map(Bytes::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_revoked(&self) -> bool {
        self.data.is_none()
    }

    /// Default download filename: `recording-<ISO8601 timestamp>.webm`
    pub fn filename(&self) -> String {
        format!(
            "recording-{}.webm",
            self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    pub fn snapshot(&self) -> Option<ArtifactSnapshot> {
        self.data.as_ref().map(|data| ArtifactSnapshot {
            id: self.id,
            filename: self.filename(),
            mime_type: ARTIFACT_MIME,
            data: data.clone(),
        })
    }

    /// Release the blob's memory; the handle stays but yields no data
    pub fn revoke(&mut self) {
        if self.data.take().is_some() {
            debug!("Artifact {} revoked", self.id);
        }
    }

    /// Write the artifact to `dir` under its default filename
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let data = self.data.as_ref().ok_or_else(|| {
            ClipcamError::component("artifact", "cannot write a revoked artifact")
        })?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.filename());
        std::fs::write(&path, data)?;
        info!("Artifact written to {}", path.display());
        Ok(path)
    }
}
