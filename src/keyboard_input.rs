use crate::app::{SessionCommand, SessionHandle, SessionState};
use crate::error::Result;
use crate::events::{ClipcamEvent, EventBus};
use crate::recording::RecordDuration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Keyboard input handler driving the session from the terminal
pub struct KeyboardInputHandler {
    handle: SessionHandle,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// Create a new keyboard input handler
    pub fn new(handle: SessionHandle, event_bus: Arc<EventBus>) -> Self {
        Self {
            handle,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting keyboard input handler - c: camera, r: record/stop, \
             a: annotation, n: new recording, +/-: duration, q: quit"
        );

        let handle = self.handle.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            // Enable raw mode to capture individual key presses
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            info!("Raw mode enabled - keyboard handler active");

            // terminal-local UI state mirrored into the session
            let mut annotation_enabled = false;
            let mut duration_minutes: i64 = 1;

            loop {
                // Check if we should stop
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                // Poll for keyboard events with a timeout
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            // Only handle key press events (not release)
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }
                            match key_event.code {
                                KeyCode::Char('c') => {
                                    info!("Camera key pressed - requesting camera access");
                                    handle.send(SessionCommand::RequestCamera);
                                }
                                KeyCode::Char('r') => match handle.state() {
                                    SessionState::Ready => {
                                        info!("Record key pressed - starting recording");
                                        handle.send(SessionCommand::StartRecording);
                                    }
                                    SessionState::Recording => {
                                        info!("Record key pressed - stopping recording");
                                        handle.send(SessionCommand::StopRecording);
                                    }
                                    state => {
                                        debug!("Record key ignored in state {}", state);
                                    }
                                },
                                KeyCode::Char('a') => {
                                    annotation_enabled = !annotation_enabled;
                                    info!(
                                        "Annotation key pressed - annotation {}",
                                        if annotation_enabled { "on" } else { "off" }
                                    );
                                    handle.send(SessionCommand::SetAnnotationEnabled(
                                        annotation_enabled,
                                    ));
                                }
                                KeyCode::Char('n') => {
                                    info!("New-recording key pressed - discarding artifact");
                                    handle.send(SessionCommand::NewRecording);
                                }
                                KeyCode::Char('+') | KeyCode::Char('=') => {
                                    duration_minutes += 1;
                                    let duration = RecordDuration::from_minutes(duration_minutes);
                                    info!("Recording duration: {}", duration);
                                    handle.send(SessionCommand::SetDuration(duration));
                                }
                                KeyCode::Char('-') | KeyCode::Char('_') => {
                                    duration_minutes = (duration_minutes - 1).max(0);
                                    let duration = RecordDuration::from_minutes(duration_minutes);
                                    info!("Recording duration: {}", duration);
                                    handle.send(SessionCommand::SetDuration(duration));
                                }
                                KeyCode::Char('q') | KeyCode::Esc => {
                                    info!("Quit key pressed - requesting shutdown");
                                    event_bus.publish(ClipcamEvent::ShutdownRequested {
                                        timestamp: SystemTime::now(),
                                        reason: "User requested via keyboard".to_string(),
                                    });
                                    handle.send(SessionCommand::Shutdown);
                                    break;
                                }
                                _ => {
                                    // Ignore other keys
                                    debug!("Key pressed: {:?}", key_event.code);
                                }
                            }
                        }
                    }
                    Ok(false) => {
                        // No event available, continue polling
                    }
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            // Disable raw mode when exiting
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}
