use super::state::SessionState;
use crate::annotation::{AnnotationLoop, IntervalPacer};
use crate::config::ClipcamConfig;
use crate::detector::{DetectorLoader, FaceDetector};
use crate::error::{ClipcamError, DetectorError, MediaError, Result};
use crate::events::{ClipcamEvent, EventBus};
use crate::media::{
    acquire_with_fallback, CameraFacing, CaptureStream, MediaConstraints, MediaProvider,
};
use crate::overlay::{DrawnShape, OverlayCanvas};
use crate::recording::{
    ArtifactHandle, ArtifactSnapshot, ClipRecorder, RecordDuration, RecordingSession,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// User-facing triggers for the lifecycle state machine
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Ask the host for camera/microphone access
    RequestCamera,
    /// Begin a recording pass (valid in `ready`)
    StartRecording,
    /// Stop the current recording pass (valid in `recording`)
    StopRecording,
    /// Discard the finished artifact and return to `idle`
    NewRecording,
    /// Toggle the face-annotation overlay (valid in `ready`)
    SetAnnotationEnabled(bool),
    /// Change the recording duration (valid in `ready`)
    SetDuration(RecordDuration),
    /// Tear the session down and exit the actor
    Shutdown,
}

/// Async completions routed back into the actor.
///
/// Media and countdown completions carry the state-machine generation they
/// were issued under; a completion whose generation no longer matches is
/// stale and discarded. The detector load carries none: its handle is
/// session-scoped, so only the state at arrival gates what it may start.
enum InternalEvent {
    MediaAcquired {
        generation: u64,
        result: std::result::Result<CaptureStream, MediaError>,
    },
    DetectorLoaded {
        result: std::result::Result<Arc<dyn FaceDetector>, DetectorError>,
    },
    CountdownElapsed {
        generation: u64,
    },
}

enum SessionMessage {
    Command(SessionCommand),
    Internal(InternalEvent),
}

struct AnnotationTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// The lifecycle state machine: single source of truth for the session.
///
/// An actor owning all session state, driven by one message channel. User
/// triggers and internal async completions (media granted, detector loaded,
/// countdown elapsed) converge there, so every transition is synchronous with
/// respect to its trigger and every async completion re-checks the current
/// state before acting. Illegal trigger/state pairs are logged no-ops, not
/// errors.
pub struct ClipSession {
    config: ClipcamConfig,
    provider: Arc<dyn MediaProvider>,
    loader: Arc<DetectorLoader>,
    event_bus: Arc<EventBus>,

    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    /// Bumped on every transition; stale async completions are discarded
    generation: u64,

    stream: Option<CaptureStream>,
    detector: Option<Arc<dyn FaceDetector>>,
    detector_load_started: bool,

    annotation_enabled: bool,
    annotation: Option<AnnotationTask>,
    overlay: Arc<Mutex<OverlayCanvas>>,
    display_size: Arc<watch::Sender<(u32, u32)>>,

    recording: RecordingSession,
    duration: RecordDuration,
    artifact: Arc<Mutex<Option<ArtifactHandle>>>,
    last_error: Arc<Mutex<Option<String>>>,

    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
}

/// Cloneable handle for driving and observing a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
    state: watch::Receiver<SessionState>,
    elapsed: Arc<AtomicU64>,
    overlay: Arc<Mutex<OverlayCanvas>>,
    display_size: Arc<watch::Sender<(u32, u32)>>,
    artifact: Arc<Mutex<Option<ArtifactHandle>>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl SessionHandle {
    /// Send a trigger to the session; false if the actor has exited
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(SessionMessage::Command(command)).is_ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`
    pub async fn wait_for_state(&mut self, target: SessionState) -> Result<()> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| ClipcamError::EventBus(crate::error::EventBusError::ChannelClosed))
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    /// Report the displayed video size so the overlay can track layout
    pub fn set_display_size(&self, width: u32, height: u32) {
        self.display_size.send_replace((width, height));
    }

    /// Shapes currently drawn on the annotation overlay
    pub async fn overlay_shapes(&self) -> Vec<DrawnShape> {
        self.overlay.lock().await.shapes().to_vec()
    }

    /// Snapshot of the finished artifact, if one exists and is unrevoked
    pub async fn artifact(&self) -> Option<ArtifactSnapshot> {
        self.artifact
            .lock()
            .await
            .as_ref()
            .and_then(ArtifactHandle::snapshot)
    }

    /// The last user-visible error message, if any
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }
}

impl ClipSession {
    pub fn new(
        config: ClipcamConfig,
        provider: Arc<dyn MediaProvider>,
        loader: Arc<DetectorLoader>,
        recorder: Box<dyn ClipRecorder>,
        event_bus: Arc<EventBus>,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (display_w, display_h) = config.annotation.display_size;
        let display_size = Arc::new(watch::channel((display_w, display_h)).0);
        let overlay = Arc::new(Mutex::new(OverlayCanvas::new(
            display_w,
            display_h,
            config.annotation.keypoint_radius,
        )));
        let recording = RecordingSession::new(recorder, Arc::clone(&event_bus));
        let artifact = Arc::new(Mutex::new(None));
        let last_error = Arc::new(Mutex::new(None));
        let duration = RecordDuration::from_minutes(config.recording.duration_minutes as i64);

        let handle = SessionHandle {
            tx: tx.clone(),
            state: state_rx,
            elapsed: recording.elapsed_handle(),
            overlay: Arc::clone(&overlay),
            display_size: Arc::clone(&display_size),
            artifact: Arc::clone(&artifact),
            last_error: Arc::clone(&last_error),
        };

        let session = Self {
            config,
            provider,
            loader,
            event_bus,
            state: SessionState::Idle,
            state_tx,
            generation: 0,
            stream: None,
            detector: None,
            detector_load_started: false,
            annotation_enabled: false,
            annotation: None,
            overlay,
            display_size,
            recording,
            duration,
            artifact,
            last_error,
            tx,
            rx,
        };

        (session, handle)
    }

    /// Run the actor until `Shutdown`
    pub async fn run(mut self) {
        info!("Clip session started in state {}", self.state);
        while let Some(message) = self.rx.recv().await {
            match message {
                SessionMessage::Command(SessionCommand::Shutdown) => {
                    self.teardown().await;
                    break;
                }
                SessionMessage::Command(command) => self.handle_command(command).await,
                SessionMessage::Internal(event) => self.handle_internal(event).await,
            }
        }
        info!("Clip session exited");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::RequestCamera => self.request_camera().await,
            SessionCommand::StartRecording => self.start_recording().await,
            SessionCommand::StopRecording => self.stop_recording().await,
            SessionCommand::NewRecording => self.new_recording().await,
            SessionCommand::SetAnnotationEnabled(enabled) => {
                self.set_annotation_enabled(enabled).await
            }
            SessionCommand::SetDuration(duration) => self.set_duration(duration),
            SessionCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    async fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::MediaAcquired { generation, result } => {
                self.media_acquired(generation, result).await
            }
            InternalEvent::DetectorLoaded { result } => self.detector_loaded(result).await,
            InternalEvent::CountdownElapsed { generation } => {
                if generation != self.generation {
                    debug!("Discarding stale countdown (generation {})", generation);
                    return;
                }
                // converges on the same idempotent stop path as a manual stop
                self.stop_recording().await;
            }
        }
    }

    // --- triggers ---

    async fn request_camera(&mut self) {
        if self.state != SessionState::Idle {
            debug!("Ignoring camera request in state {}", self.state);
            return;
        }
        *self.last_error.lock().await = None;
        self.transition(SessionState::PermissionPending).await;

        let provider = Arc::clone(&self.provider);
        let constraints = self.preferred_constraints();
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = acquire_with_fallback(provider.as_ref(), constraints).await;
            let _ = tx.send(SessionMessage::Internal(InternalEvent::MediaAcquired {
                generation,
                result,
            }));
        });
    }

    async fn media_acquired(
        &mut self,
        generation: u64,
        result: std::result::Result<CaptureStream, MediaError>,
    ) {
        if generation != self.generation || self.state != SessionState::PermissionPending {
            debug!("Discarding stale media acquisition (generation {})", generation);
            if let Ok(mut stream) = result {
                // a granted stream nobody will own must still be released
                stream.stop_all_tracks();
            }
            return;
        }

        match result {
            Ok(stream) => {
                info!("Capture stream bound to preview ({} tracks)", stream.tracks().len());
                self.stream = Some(stream);
                self.transition(SessionState::Ready).await;
                self.kick_detector_load();
            }
            Err(e) => {
                let message = e.to_string();
                *self.last_error.lock().await = Some(message.clone());
                self.event_bus
                    .publish(ClipcamEvent::PermissionDenied { message });
                self.transition(SessionState::Idle).await;
            }
        }
    }

    /// One-shot per session: the loader itself also guards against a second
    /// in-flight load.
    fn kick_detector_load(&mut self) {
        if self.detector_load_started {
            return;
        }
        self.detector_load_started = true;

        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = loader.load_once().await;
            let _ = tx.send(SessionMessage::Internal(InternalEvent::DetectorLoaded {
                result,
            }));
        });
    }

    async fn detector_loaded(
        &mut self,
        result: std::result::Result<Arc<dyn FaceDetector>, DetectorError>,
    ) {
        match result {
            Ok(detector) => {
                // the handle is session-scoped: cache it even when the load
                // resolved after the state moved on
                self.detector = Some(detector);
                self.event_bus.publish(ClipcamEvent::DetectorReady);
            }
            Err(e) => {
                // non-fatal: preview and recording stay usable
                self.event_bus.publish(ClipcamEvent::DetectorLoadFailed {
                    error: e.to_string(),
                });
                return;
            }
        }

        // a load resolving outside `ready` must not start the loop, but any
        // `ready` with enablement on may claim it, including one entered
        // after the load was kicked off
        if self.state == SessionState::Ready && self.annotation_enabled {
            self.start_annotation();
        }
    }

    async fn start_recording(&mut self) {
        if self.state != SessionState::Ready {
            debug!("Ignoring start in state {}", self.state);
            return;
        }

        // annotation is forced off for the whole recording pass
        self.annotation_enabled = false;
        self.stop_annotation().await;

        let Some(source) = self.stream.as_mut().and_then(CaptureStream::take_chunks) else {
            warn!("Capture stream has no encoded output; cannot record");
            return;
        };

        self.transition(SessionState::Recording).await;

        let generation = self.generation;
        let tx = self.tx.clone();
        let duration = self.duration;
        self.recording.start(
            source,
            duration,
            Box::new(move || {
                let _ = tx.send(SessionMessage::Internal(InternalEvent::CountdownElapsed {
                    generation,
                }));
            }),
        );
        self.event_bus
            .publish(ClipcamEvent::RecordingStarted { duration });
    }

    async fn stop_recording(&mut self) {
        if self.state != SessionState::Recording {
            // idempotent against double-stop: countdown firing after a manual
            // stop, or the reverse
            debug!("Ignoring stop in state {}", self.state);
            return;
        }

        let blob = self.recording.finalize().await;
        let artifact = ArtifactHandle::new(blob);
        let event = ClipcamEvent::RecordingFinished {
            artifact_id: artifact.id(),
            bytes: artifact.len(),
            filename: artifact.filename(),
        };

        {
            let mut slot = self.artifact.lock().await;
            if let Some(previous) = slot.as_mut() {
                previous.revoke();
            }
            *slot = Some(artifact);
        }

        self.transition(SessionState::Finished).await;
        self.event_bus.publish(event);
    }

    async fn new_recording(&mut self) {
        if self.state != SessionState::Finished {
            debug!("Ignoring new-recording in state {}", self.state);
            return;
        }

        if let Some(mut previous) = self.artifact.lock().await.take() {
            previous.revoke();
        }
        self.recording.reset_elapsed();
        *self.last_error.lock().await = None;
        self.transition(SessionState::Idle).await;
    }

    async fn set_annotation_enabled(&mut self, enabled: bool) {
        if self.state != SessionState::Ready {
            debug!("Ignoring annotation toggle in state {}", self.state);
            return;
        }
        if self.annotation_enabled == enabled {
            return;
        }
        self.annotation_enabled = enabled;
        if enabled {
            // stays pending until the detector handle exists
            self.start_annotation();
        } else {
            self.stop_annotation().await;
        }
    }

    fn set_duration(&mut self, duration: RecordDuration) {
        if self.state != SessionState::Ready {
            debug!("Ignoring duration change in state {}", self.state);
            return;
        }
        info!("Recording duration set to {}", duration);
        self.duration = duration;
    }

    // --- gated resources ---

    fn start_annotation(&mut self) {
        if self.annotation.is_some() {
            return;
        }
        let (Some(detector), Some(stream)) = (self.detector.as_ref(), self.stream.as_ref()) else {
            debug!("Annotation enabled but detector or stream not present yet");
            return;
        };

        let annotation = AnnotationLoop::new(
            Arc::clone(detector),
            stream.frames(),
            self.display_size.subscribe(),
            Arc::clone(&self.overlay),
            Arc::clone(&self.event_bus),
        );
        let pacer = IntervalPacer::new(self.config.annotation.fps);
        let token = CancellationToken::new();
        let handle = annotation.spawn(Box::new(pacer), token.clone());
        self.annotation = Some(AnnotationTask { token, handle });
        self.event_bus.publish(ClipcamEvent::AnnotationStarted);
    }

    /// Cancel the loop and wait for it to clear the overlay, so disablement
    /// is observable rather than a race against the next tick
    async fn stop_annotation(&mut self) {
        if let Some(task) = self.annotation.take() {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                warn!("Annotation loop join failed: {}", e);
            }
        }
    }

    async fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }

        // leaving a state that owns the annotation loop cancels it
        if from == SessionState::Ready {
            self.annotation_enabled = false;
            self.stop_annotation().await;
        }

        // states outside the preview/recording window never hold the stream
        if !to.owns_stream() {
            if let Some(mut stream) = self.stream.take() {
                stream.stop_all_tracks();
            }
        }

        self.state = to;
        self.generation += 1;
        debug!("Transition {} -> {} (generation {})", from, to, self.generation);
        self.state_tx.send_replace(to);
        self.event_bus
            .publish(ClipcamEvent::StateChanged { from, to });
    }

    async fn teardown(&mut self) {
        debug!("Tearing down session in state {}", self.state);
        self.stop_annotation().await;
        self.recording.abort();
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
    }

    fn preferred_constraints(&self) -> MediaConstraints {
        let mut constraints = MediaConstraints::environment_facing(
            self.config.camera.resolution,
            self.config.camera.fps,
        );
        if !self.config.camera.audio {
            constraints.audio = false;
        }
        if self.config.camera.facing != "environment" {
            constraints.facing = CameraFacing::Any;
        }
        constraints
    }
}
