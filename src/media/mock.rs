use super::provider::{CaptureStream, MediaConstraints, MediaProvider, MediaTrack, TrackKind};
use crate::error::MediaError;
use crate::frame::VideoFrame;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handles for driving a manually-controlled capture stream from a test
pub struct StreamControl {
    frames: watch::Sender<Option<VideoFrame>>,
    chunks: mpsc::UnboundedSender<Bytes>,
    token: CancellationToken,
}

impl StreamControl {
    /// Publish a frame as the stream's current decodable frame
    pub fn push_frame(&self, frame: VideoFrame) {
        let _ = self.frames.send(Some(frame));
    }

    /// Emit one encoded chunk on the stream's data output
    pub fn push_chunk(&self, chunk: Bytes) {
        let _ = self.chunks.send(chunk);
    }

    /// Whether the stream's producer side has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Build a capture stream whose frames and chunks are pushed by hand
pub fn manual_stream(audio: bool) -> (CaptureStream, StreamControl) {
    let mut tracks = vec![MediaTrack::new(TrackKind::Video)];
    if audio {
        tracks.push(MediaTrack::new(TrackKind::Audio));
    }
    let (frame_tx, frame_rx) = watch::channel(None);
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let stream = CaptureStream::new(tracks, frame_rx, chunk_rx, token.clone());
    let control = StreamControl {
        frames: frame_tx,
        chunks: chunk_tx,
        token,
    };
    (stream, control)
}

/// Scriptable media provider recording every acquisition attempt.
///
/// Each call to `request_media` pops the next scripted outcome; a granted
/// attempt yields a manually-controlled stream whose `StreamControl` is kept
/// for the caller to drive.
pub struct MockMediaProvider {
    outcomes: Mutex<VecDeque<Result<(), MediaError>>>,
    attempts: Mutex<Vec<MediaConstraints>>,
    controls: Mutex<Vec<StreamControl>>,
}

impl MockMediaProvider {
    pub fn new(outcomes: Vec<Result<(), MediaError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a provider that grants the first attempt
    pub fn granting() -> Self {
        Self::new(vec![Ok(())])
    }

    /// Constraints of every attempt made so far, in order
    pub fn attempts(&self) -> Vec<MediaConstraints> {
        self.attempts.lock().expect("attempts lock").clone()
    }

    /// Take the control handle of the most recently granted stream
    pub fn take_last_control(&self) -> Option<StreamControl> {
        self.controls.lock().expect("controls lock").pop()
    }
}

#[async_trait]
impl MediaProvider for MockMediaProvider {
    async fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<CaptureStream, MediaError> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(constraints.clone());

        let outcome = self
            .outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(MediaError::DeviceUnavailable {
                    details: "mock provider script exhausted".to_string(),
                })
            });

        match outcome {
            Ok(()) => {
                debug!("Mock provider granting request: {:?}", constraints);
                let (stream, control) = manual_stream(constraints.audio);
                self.controls.lock().expect("controls lock").push(control);
                Ok(stream)
            }
            Err(e) => {
                debug!("Mock provider rejecting request: {}", e);
                Err(e)
            }
        }
    }
}
