use crate::error::MediaError;
use crate::frame::VideoFrame;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Preferred camera orientation for an acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// Rear/environment-facing camera
    Environment,
    /// Any available camera
    Any,
}

/// Constraints passed to a media provider when requesting a capture stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub facing: CameraFacing,
    pub audio: bool,
    pub resolution: (u32, u32),
    pub fps: u32,
}

impl MediaConstraints {
    /// First-attempt constraints: environment-facing camera plus microphone
    pub fn environment_facing(resolution: (u32, u32), fps: u32) -> Self {
        Self {
            facing: CameraFacing::Environment,
            audio: true,
            resolution,
            fps,
        }
    }

    /// The same request with the camera facing constraint dropped
    pub fn relaxed(&self) -> Self {
        Self {
            facing: CameraFacing::Any,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single audio or video track within a capture stream
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub id: Uuid,
    pub kind: TrackKind,
    live: bool,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            live: true,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// An acquired audio+video capture stream.
///
/// Owned exclusively by the session while it is in a preview or recording
/// state. Frames are published on a watch channel (None until the source is
/// decodable); the encoded chunk output is taken exactly once by the recorder.
/// `stop_all_tracks` releases the stream and is idempotent.
#[derive(Debug)]
pub struct CaptureStream {
    tracks: Vec<MediaTrack>,
    frames: watch::Receiver<Option<VideoFrame>>,
    chunks: Option<mpsc::UnboundedReceiver<Bytes>>,
    producer: CancellationToken,
    stopped: bool,
}

impl CaptureStream {
    pub fn new(
        tracks: Vec<MediaTrack>,
        frames: watch::Receiver<Option<VideoFrame>>,
        chunks: mpsc::UnboundedReceiver<Bytes>,
        producer: CancellationToken,
    ) -> Self {
        Self {
            tracks,
            frames,
            chunks: Some(chunks),
            producer,
            stopped: false,
        }
    }

    /// Subscribe to the most recent decodable frame (the live preview)
    pub fn frames(&self) -> watch::Receiver<Option<VideoFrame>> {
        self.frames.clone()
    }

    /// Take the encoded chunk output; yields None after the first call
    pub fn take_chunks(&mut self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.chunks.take()
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop every track and cancel the producer; safe to call repeatedly
    pub fn stop_all_tracks(&mut self) {
        if self.stopped {
            debug!("Capture stream already stopped");
            return;
        }
        info!("Stopping {} capture track(s)", self.tracks.len());
        for track in &mut self.tracks {
            track.live = false;
        }
        self.producer.cancel();
        self.stopped = true;
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop_all_tracks();
    }
}

/// Abstracts acquisition of an audio/video capture stream from the host
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<CaptureStream, MediaError>;
}

/// Acquire a capture stream with the standard constraint fallback.
///
/// First attempt requests the preferred constraints (environment-facing camera
/// plus microphone); on failure retries once with the camera constraint
/// dropped. On second failure one consolidated error is returned. This is a
/// user-facing permission prompt, not a transient fault, so there is never a
/// third attempt — and no retry at all when relaxing would repeat the same
/// request.
pub async fn acquire_with_fallback(
    provider: &dyn MediaProvider,
    preferred: MediaConstraints,
) -> Result<CaptureStream, MediaError> {
    debug!("Requesting media with constraints: {:?}", preferred);
    let first_error = match provider.request_media(&preferred).await {
        Ok(stream) => return Ok(stream),
        Err(e) => e,
    };

    let relaxed = preferred.relaxed();
    if relaxed == preferred {
        debug!("Request was already unconstrained; not retrying");
        return Err(first_error);
    }
    warn!(
        "Preferred media request failed ({}); retrying unconstrained",
        first_error
    );
    match provider.request_media(&relaxed).await {
        Ok(stream) => Ok(stream),
        Err(second_error) => Err(consolidate(first_error, second_error)),
    }
}

/// Collapse both attempt failures into one user-visible error.
///
/// A permission denial on either attempt dominates: it is the actionable
/// message for the user.
fn consolidate(first: MediaError, second: MediaError) -> MediaError {
    let details = format!("{}; fallback attempt: {}", first, second);
    match (&first, &second) {
        (MediaError::PermissionDenied { .. }, _) | (_, MediaError::PermissionDenied { .. }) => {
            MediaError::PermissionDenied { details }
        }
        _ => MediaError::DeviceUnavailable { details },
    }
}
