use super::*;
use crate::config::ClipcamConfig;
use crate::detector::{DetectorFactory, DetectorLoader, FaceDetector, MockDetector};
use crate::error::{DetectorError, MediaError};
use crate::events::{ClipcamEvent, EventBus};
use crate::frame::VideoFrame;
use crate::media::{CameraFacing, MockMediaProvider, StreamControl};
use crate::recording::{PassthroughRecorder, RecordDuration};
use bytes::Bytes;
use futures::FutureExt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

struct SessionFixture {
    handle: SessionHandle,
    events: broadcast::Receiver<ClipcamEvent>,
    provider: Arc<MockMediaProvider>,
    detector: Arc<MockDetector>,
    actor: JoinHandle<()>,
}

impl SessionFixture {
    fn start(outcomes: Vec<Result<(), MediaError>>) -> Self {
        let detector = Arc::new(MockDetector::single_face(1280.0, 720.0));
        let factory = instant_factory(Arc::clone(&detector));
        Self::start_with(outcomes, detector, factory, ClipcamConfig::default())
    }

    fn start_with(
        outcomes: Vec<Result<(), MediaError>>,
        detector: Arc<MockDetector>,
        factory: DetectorFactory,
        config: ClipcamConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(256));
        let events = event_bus.subscribe();
        let provider = Arc::new(MockMediaProvider::new(outcomes));
        let loader = Arc::new(DetectorLoader::new(factory));

        let (session, handle) = ClipSession::new(
            config,
            Arc::clone(&provider) as Arc<dyn crate::media::MediaProvider>,
            loader,
            Box::new(PassthroughRecorder::new()),
            event_bus,
        );
        let actor = tokio::spawn(session.run());

        Self {
            handle,
            events,
            provider,
            detector,
            actor,
        }
    }

    /// Drive the session to `ready` and return the granted stream's controls
    async fn into_ready(&mut self) -> StreamControl {
        self.handle.send(SessionCommand::RequestCamera);
        self.wait_for_state_change(SessionState::Ready).await;
        self.provider.take_last_control().expect("granted stream")
    }

    /// Wait until a `StateChanged` event lands in `target`
    async fn wait_for_state_change(&mut self, target: SessionState) {
        next_event(&mut self.events, |event| {
            matches!(event, ClipcamEvent::StateChanged { to, .. } if *to == target)
        })
        .await;
    }
}

/// Receive events until one matches, with a timeout
async fn next_event<F>(rx: &mut broadcast::Receiver<ClipcamEvent>, matches: F) -> ClipcamEvent
where
    F: Fn(&ClipcamEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn denied(details: &str) -> Result<(), MediaError> {
    Err(MediaError::PermissionDenied {
        details: details.to_string(),
    })
}

fn unavailable(details: &str) -> Result<(), MediaError> {
    Err(MediaError::DeviceUnavailable {
        details: details.to_string(),
    })
}

fn instant_factory(detector: Arc<MockDetector>) -> DetectorFactory {
    Box::new(move || {
        let detector = Arc::clone(&detector);
        async move { Ok::<_, DetectorError>(detector as Arc<dyn FaceDetector>) }.boxed()
    })
}

fn pending_factory() -> DetectorFactory {
    Box::new(|| {
        futures::future::pending::<Result<Arc<dyn FaceDetector>, DetectorError>>().boxed()
    })
}

fn gated_factory(detector: Arc<MockDetector>, gate: Arc<Notify>) -> DetectorFactory {
    Box::new(move || {
        let detector = Arc::clone(&detector);
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Ok::<_, DetectorError>(detector as Arc<dyn FaceDetector>)
        }
        .boxed()
    })
}

fn failing_factory() -> DetectorFactory {
    Box::new(|| {
        async {
            Err::<Arc<dyn FaceDetector>, _>(DetectorError::Load {
                details: "model file corrupt".to_string(),
            })
        }
        .boxed()
    })
}

fn frame(id: u64) -> VideoFrame {
    VideoFrame::new(
        id,
        SystemTime::now(),
        Bytes::from_static(b"\xff\xd8\xff\xd9"),
        1280,
        720,
    )
}

#[tokio::test]
async fn test_granted_request_reaches_ready_in_one_attempt() {
    let mut fx = SessionFixture::start(vec![Ok(())]);

    fx.handle.send(SessionCommand::RequestCamera);
    fx.wait_for_state_change(SessionState::Ready).await;

    let attempts = fx.provider.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].facing, CameraFacing::Environment);
    assert!(attempts[0].audio);
    assert!(fx.handle.last_error().await.is_none());
}

#[tokio::test]
async fn test_denied_twice_returns_to_idle_with_error() {
    let mut fx = SessionFixture::start(vec![denied("blocked"), denied("still blocked")]);

    fx.handle.send(SessionCommand::RequestCamera);
    let event = next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::PermissionDenied { .. })
    })
    .await;
    fx.wait_for_state_change(SessionState::Idle).await;

    assert_eq!(fx.handle.state(), SessionState::Idle);
    let attempts = fx.provider.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].facing, CameraFacing::Environment);
    assert_eq!(attempts[1].facing, CameraFacing::Any);

    let error = fx.handle.last_error().await.expect("error recorded");
    assert!(error.contains("blocked"));
    if let ClipcamEvent::PermissionDenied { message } = event {
        assert_eq!(message, error);
    }
}

#[tokio::test]
async fn test_missing_environment_camera_falls_back_unconstrained() {
    let mut fx = SessionFixture::start(vec![unavailable("no rear camera"), Ok(())]);

    fx.handle.send(SessionCommand::RequestCamera);
    fx.wait_for_state_change(SessionState::Ready).await;

    let attempts = fx.provider.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].facing, CameraFacing::Any);
    assert!(fx.handle.last_error().await.is_none());
}

#[tokio::test]
async fn test_request_camera_outside_idle_is_ignored() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    fx.into_ready().await;

    // a second request must not touch the provider again
    fx.handle.send(SessionCommand::RequestCamera);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fx.handle.state(), SessionState::Ready);
    assert_eq!(fx.provider.attempts().len(), 1);
}

#[tokio::test]
async fn test_start_recording_requires_ready() {
    let fx = SessionFixture::start(vec![Ok(())]);

    fx.handle.send(SessionCommand::StartRecording);
    fx.handle.send(SessionCommand::StopRecording);
    fx.handle.send(SessionCommand::NewRecording);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(fx.handle.state(), SessionState::Idle);
    assert!(fx.handle.artifact().await.is_none());
}

#[tokio::test]
async fn test_recording_collects_chunks_into_artifact() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    // chunks emitted while previewing never reach the recording
    control.push_chunk(Bytes::from_static(b"preview"));

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;

    control.push_chunk(Bytes::from_static(b"aa"));
    control.push_chunk(Bytes::from_static(b"bb"));
    tokio::task::yield_now().await;

    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;

    let snapshot = fx.handle.artifact().await.expect("artifact present");
    assert_eq!(&snapshot.data[..], b"aabb");
    assert!(snapshot.filename.starts_with("recording-"));
    assert!(snapshot.filename.ends_with(".webm"));
    // the stream was released at finalization
    assert!(control.is_cancelled());
}

#[tokio::test]
async fn test_empty_recording_still_produces_artifact() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    fx.into_ready().await;

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;

    let snapshot = fx.handle.artifact().await.expect("artifact present");
    assert!(snapshot.data.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bounded_recording_auto_finishes() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    control.push_chunk(Bytes::from_static(b"clip"));

    // default duration is one minute; no stop command is ever sent
    let event = next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::RecordingFinished { .. })
    })
    .await;
    fx.wait_for_state_change(SessionState::Finished).await;

    if let ClipcamEvent::RecordingFinished { bytes, .. } = event {
        assert_eq!(bytes, 4);
    }
    assert!(fx.handle.artifact().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_cancels_countdown() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    fx.into_ready().await;

    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;

    // stop by hand at the ten second mark, well before the countdown
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::ElapsedTick { seconds: 10 })
    })
    .await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
    let elapsed = fx.handle.elapsed_seconds();
    assert!((10..=11).contains(&elapsed));

    // the armed countdown must not fire a second finalization
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fx.handle.state(), SessionState::Finished);
    assert_eq!(fx.handle.elapsed_seconds(), elapsed);

    let mut finished = 0;
    while let Ok(event) = fx.events.try_recv() {
        if matches!(event, ClipcamEvent::RecordingFinished { .. }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_duration_never_auto_stops() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    fx.into_ready().await;

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(fx.handle.state(), SessionState::Recording);
}

#[tokio::test]
async fn test_double_stop_is_a_noop() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    fx.into_ready().await;

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;

    fx.handle.send(SessionCommand::StopRecording);
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
    tokio::task::yield_now().await;

    assert_eq!(fx.handle.state(), SessionState::Finished);
    let mut finished = 0;
    while let Ok(event) = fx.events.try_recv() {
        if matches!(event, ClipcamEvent::RecordingFinished { .. }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_new_recording_revokes_artifact_and_resets() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    control.push_chunk(Bytes::from_static(b"clip"));
    tokio::task::yield_now().await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
    assert!(fx.handle.artifact().await.is_some());

    fx.handle.send(SessionCommand::NewRecording);
    fx.wait_for_state_change(SessionState::Idle).await;

    assert!(fx.handle.artifact().await.is_none());
    assert_eq!(fx.handle.elapsed_seconds(), 0);
    assert!(fx.handle.last_error().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_annotation_renders_after_enable() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    control.push_frame(frame(1));

    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationStarted)
    })
    .await;
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationRendered { faces: 1 })
    })
    .await;

    let shapes = fx.handle.overlay_shapes().await;
    assert!(!shapes.is_empty());
    assert!(fx.detector.calls() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_annotation_stops_and_clears_when_disabled() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    control.push_frame(frame(1));
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationRendered { .. })
    })
    .await;

    fx.handle.send(SessionCommand::SetAnnotationEnabled(false));
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationStopped)
    })
    .await;

    assert!(fx.handle.overlay_shapes().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recording_disables_annotation() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    control.push_frame(frame(1));
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationRendered { .. })
    })
    .await;

    fx.handle.send(SessionCommand::StartRecording);
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationStopped)
    })
    .await;
    fx.wait_for_state_change(SessionState::Recording).await;

    assert!(fx.handle.overlay_shapes().await.is_empty());
    let calls = fx.detector.calls();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fx.detector.calls(), calls);
}

#[tokio::test]
async fn test_annotation_enable_waits_for_detector() {
    let detector = Arc::new(MockDetector::single_face(1280.0, 720.0));
    let gate = Arc::new(Notify::new());
    let mut fx = SessionFixture::start_with(
        vec![Ok(())],
        Arc::clone(&detector),
        gated_factory(detector, Arc::clone(&gate)),
        ClipcamConfig::default(),
    );
    let control = fx.into_ready().await;
    control.push_frame(frame(1));

    // enabled before the detector resolved: nothing starts yet
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(fx.handle.overlay_shapes().await.is_empty());

    // the pending enablement takes effect when the load resolves
    gate.notify_one();
    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationStarted)
    })
    .await;
}

#[tokio::test]
async fn test_detector_load_failure_degrades_annotation_only() {
    let detector = Arc::new(MockDetector::new(Vec::new()));
    let mut fx = SessionFixture::start_with(
        vec![Ok(())],
        detector,
        failing_factory(),
        ClipcamConfig::default(),
    );
    fx.into_ready().await;

    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::DetectorLoadFailed { .. })
    })
    .await;

    // preview and recording stay usable without a detector
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
    assert!(fx.handle.artifact().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_detector_resolving_in_later_preview_starts_loop() {
    let detector = Arc::new(MockDetector::single_face(1280.0, 720.0));
    let gate = Arc::new(Notify::new());
    let mut fx = SessionFixture::start_with(
        vec![Ok(()), Ok(())],
        Arc::clone(&detector),
        gated_factory(detector, Arc::clone(&gate)),
        ClipcamConfig::default(),
    );
    fx.into_ready().await;

    // full pass through recording and back to a second preview while the
    // load kicked off in the first preview is still in flight
    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
    fx.handle.send(SessionCommand::NewRecording);
    fx.wait_for_state_change(SessionState::Idle).await;
    let control = fx.into_ready().await;

    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    control.push_frame(frame(1));

    // the session-scoped handle arrives now; this preview claims it
    gate.notify_one();
    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationStarted)
    })
    .await;
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationRendered { .. })
    })
    .await;
    assert!(!fx.handle.overlay_shapes().await.is_empty());
}

#[tokio::test]
async fn test_detector_resolving_outside_ready_does_not_start_loop() {
    let detector = Arc::new(MockDetector::single_face(1280.0, 720.0));
    let gate = Arc::new(Notify::new());
    let mut fx = SessionFixture::start_with(
        vec![Ok(())],
        Arc::clone(&detector),
        gated_factory(detector, Arc::clone(&gate)),
        ClipcamConfig::default(),
    );
    fx.into_ready().await;
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;

    // the load resolves mid-recording: handle cached, loop not started
    gate.notify_one();
    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(fx.handle.overlay_shapes().await.is_empty());
    assert_eq!(fx.handle.state(), SessionState::Recording);
}

#[tokio::test]
async fn test_display_resize_is_observable_through_handle() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    next_event(&mut fx.events, |e| matches!(e, ClipcamEvent::DetectorReady)).await;
    fx.handle.set_display_size(320, 180);
    control.push_frame(frame(1));
    fx.handle.send(SessionCommand::SetAnnotationEnabled(true));
    next_event(&mut fx.events, |e| {
        matches!(e, ClipcamEvent::AnnotationRendered { .. })
    })
    .await;

    // shapes land in the resized overlay space
    let shapes = fx.handle.overlay_shapes().await;
    assert!(shapes.iter().all(|shape| match shape {
        crate::overlay::DrawnShape::Box { x, width, .. } => x + width <= 320.0,
        crate::overlay::DrawnShape::Keypoint { x, .. } => *x <= 320.0,
    }));
}

#[tokio::test]
async fn test_pending_detector_never_blocks_lifecycle() {
    let detector = Arc::new(MockDetector::new(Vec::new()));
    let mut fx = SessionFixture::start_with(
        vec![Ok(())],
        detector,
        pending_factory(),
        ClipcamConfig::default(),
    );
    fx.into_ready().await;

    fx.handle.send(SessionCommand::SetDuration(RecordDuration::Unbounded));
    fx.handle.send(SessionCommand::StartRecording);
    fx.wait_for_state_change(SessionState::Recording).await;
    fx.handle.send(SessionCommand::StopRecording);
    fx.wait_for_state_change(SessionState::Finished).await;
}

#[tokio::test]
async fn test_shutdown_stops_the_actor() {
    let mut fx = SessionFixture::start(vec![Ok(())]);
    let control = fx.into_ready().await;

    fx.handle.send(SessionCommand::Shutdown);
    fx.actor.await.expect("actor exited cleanly");
    assert!(control.is_cancelled());
    assert!(!fx.handle.send(SessionCommand::RequestCamera));
}
