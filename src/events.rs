use crate::app::SessionState;
use crate::error::EventBusError;
use crate::recording::RecordDuration;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a clipcam session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClipcamEvent {
    /// The lifecycle state machine changed state
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Camera/microphone acquisition failed after exhausting fallback
    PermissionDenied { message: String },
    /// The face detector finished loading and is available
    DetectorReady,
    /// The face detector failed to load; annotation stays unavailable
    DetectorLoadFailed { error: String },
    /// The annotation loop started rendering
    AnnotationStarted,
    /// The annotation loop was cancelled and the overlay cleared
    AnnotationStopped,
    /// One annotation frame was rendered to the overlay
    AnnotationRendered { faces: usize },
    /// A recording pass began
    RecordingStarted { duration: RecordDuration },
    /// One second of recording time elapsed
    ElapsedTick { seconds: u64 },
    /// A recording finalized into a downloadable artifact
    RecordingFinished {
        artifact_id: Uuid,
        bytes: usize,
        filename: String,
    },
    /// Session shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl ClipcamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ClipcamEvent::StateChanged { from, to } => {
                format!("Session state changed: {} -> {}", from, to)
            }
            ClipcamEvent::PermissionDenied { message } => {
                format!("Permission denied: {}", message)
            }
            ClipcamEvent::DetectorReady => "Face detector ready".to_string(),
            ClipcamEvent::DetectorLoadFailed { error } => {
                format!("Face detector load failed: {}", error)
            }
            ClipcamEvent::AnnotationStarted => "Annotation started".to_string(),
            ClipcamEvent::AnnotationStopped => "Annotation stopped".to_string(),
            ClipcamEvent::AnnotationRendered { faces } => {
                format!("Annotation rendered {} face(s)", faces)
            }
            ClipcamEvent::RecordingStarted { duration } => {
                format!("Recording started ({})", duration)
            }
            ClipcamEvent::ElapsedTick { seconds } => format!("Recording at {}s", seconds),
            ClipcamEvent::RecordingFinished {
                artifact_id,
                bytes,
                filename,
            } => {
                format!(
                    "Recording finished: {} ({} bytes, id {})",
                    filename, bytes, artifact_id
                )
            }
            ClipcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ClipcamEvent::StateChanged { .. } => "state_changed",
            ClipcamEvent::PermissionDenied { .. } => "permission_denied",
            ClipcamEvent::DetectorReady => "detector_ready",
            ClipcamEvent::DetectorLoadFailed { .. } => "detector_load_failed",
            ClipcamEvent::AnnotationStarted => "annotation_started",
            ClipcamEvent::AnnotationStopped => "annotation_stopped",
            ClipcamEvent::AnnotationRendered { .. } => "annotation_rendered",
            ClipcamEvent::RecordingStarted { .. } => "recording_started",
            ClipcamEvent::ElapsedTick { .. } => "elapsed_tick",
            ClipcamEvent::RecordingFinished { .. } => "recording_finished",
            ClipcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for session observation using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<ClipcamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ClipcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event. Publishing
    /// with no subscribers is not an error; session progress must not depend
    /// on anyone watching.
    pub fn publish(&self, event: ClipcamEvent) -> usize {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        // Log important events at appropriate levels
        match &event {
            ClipcamEvent::StateChanged { from, to } => {
                info!("Session state: {} -> {}", from, to);
            }
            ClipcamEvent::PermissionDenied { message } => {
                error!("Permission denied: {}", message);
            }
            ClipcamEvent::DetectorLoadFailed { error } => {
                warn!("Detector load failed: {}", error);
            }
            ClipcamEvent::RecordingFinished {
                filename, bytes, ..
            } => {
                info!("Recording finished: {} ({} bytes)", filename, bytes);
            }
            ClipcamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event receiver that skips lag gaps instead of erroring
pub struct EventReceiver {
    receiver: broadcast::Receiver<ClipcamEvent>,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ClipcamEvent>, name: String) -> Self {
        Self { receiver, name }
    }

    /// Receive the next event, logging and skipping over lagged gaps
    pub async fn recv(&mut self) -> Result<ClipcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
