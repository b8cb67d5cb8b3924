//! Capture coordinator
//!
//! Orchestrates one capture session per request: acquire the camera, record
//! it, announce instructions on schedule, and hand back the finished clip.

use super::buffer::FragmentBuffer;
use super::ffmpeg::FfmpegRecorderFactory;
use super::request::{CaptureOutcome, CaptureRequest, CompletionCallback, Instruction, StreamObserver};
use super::state::{SessionEvent, SessionState};
use super::traits::{RecorderEvent, RecorderFactory};
use crate::capture::stream::MediaStream;
use crate::capture::traits::{MediaDevices, PreviewSink, VideoConstraints};
use crate::config::{CaptureConfig, FailurePolicy};
use crate::speech::{Announcer, InstructionAnnouncer};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Commands a handle can send to its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Stop,
}

/// Starts capture sessions against a fixed set of collaborators
pub struct CaptureOrchestrator {
    devices: Arc<dyn MediaDevices>,
    recorders: Arc<dyn RecorderFactory>,
    announcer: Arc<dyn Announcer>,
    config: CaptureConfig,
}

impl CaptureOrchestrator {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        recorders: Arc<dyn RecorderFactory>,
        announcer: Arc<dyn Announcer>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            devices,
            recorders,
            announcer,
            config,
        }
    }

    /// FFmpeg recorder and platform speech, configured from `config`
    pub fn with_defaults(devices: Arc<dyn MediaDevices>, config: CaptureConfig) -> Self {
        let recorders = Arc::new(FfmpegRecorderFactory::new(config.recorder.clone()));
        let announcer = Arc::new(InstructionAnnouncer::from_config(&config.speech));
        Self::new(devices, recorders, announcer, config)
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Start a capture session.
    ///
    /// Invalid requests are rejected here and nothing is started. Otherwise
    /// the session runs on the current tokio runtime and its result arrives
    /// through the request's completion callback.
    pub fn capture(&self, request: CaptureRequest) -> CaptureResult<CaptureHandle> {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            CaptureError::RuntimeAborted(format!("capture requires a tokio runtime: {e}"))
        })?;

        if let Some(duration) = request.duration() {
            if Instant::now().checked_add(duration).is_none() {
                return Err(CaptureError::InvalidRequest(format!(
                    "duration of {}s is too far in the future",
                    duration.as_secs()
                )));
            }
        }

        let id = Uuid::new_v4();
        let state = Arc::new(RwLock::new(SessionState::Idle));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Capture session {} requested: {}x{}, duration={:?}s, {} instructions",
            id,
            request.width,
            request.height,
            request.duration_seconds,
            request.instructions.len()
        );

        let session = Session {
            id,
            constraints: request.constraints(),
            duration: request.duration(),
            instructions: request.instructions,
            on_complete: Some(request.on_complete),
            preview: request.preview,
            stream_observer: request.stream_observer,
            devices: self.devices.clone(),
            recorders: self.recorders.clone(),
            announcer: self.announcer.clone(),
            config: self.config.clone(),
            state: state.clone(),
            events: events.clone(),
        };

        let task = runtime.spawn(session.run(commands_rx));

        Ok(CaptureHandle {
            session_id: id,
            state,
            commands: commands_tx,
            events,
            task,
        })
    }
}

/// Control surface for a running session.
///
/// Dropping the handle does not stop the session.
pub struct CaptureHandle {
    session_id: Uuid,
    state: Arc<RwLock<SessionState>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Ask the recorder to stop. Returns `false` if the session already ended.
    pub fn stop(&self) -> bool {
        self.commands.send(SessionCommand::Stop).is_ok()
    }

    /// Subscribe to session events; earlier events are not replayed
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session task to end
    pub async fn join(self) -> CaptureResult<SessionState> {
        self.task
            .await
            .map_err(|e| CaptureError::RuntimeAborted(format!("session task failed: {e}")))?;
        Ok(*self.state.read())
    }
}

struct Session {
    id: Uuid,
    constraints: VideoConstraints,
    duration: Option<Duration>,
    instructions: Vec<Instruction>,
    on_complete: Option<CompletionCallback>,
    preview: Option<Arc<dyn PreviewSink>>,
    stream_observer: Option<StreamObserver>,
    devices: Arc<dyn MediaDevices>,
    recorders: Arc<dyn RecorderFactory>,
    announcer: Arc<dyn Announcer>,
    config: CaptureConfig,
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        self.transition(SessionState::Acquiring);

        let acquired = self.devices.acquire(self.constraints).await;
        let stream = match acquired {
            Ok(stream) => stream,
            Err(e) => return self.fail(e, None),
        };
        tracing::info!(
            "Session {} acquired stream {} ({}x{} from {})",
            self.id,
            stream.id(),
            stream.settings().width,
            stream.settings().height,
            stream.settings().device_label
        );

        if let Some(observer) = self.stream_observer.take() {
            observer(&stream);
        }

        if let Some(preview) = &self.preview {
            preview.bind(stream.clone());
            if let Err(e) = preview.play() {
                tracing::warn!("Preview playback failed, recording anyway: {}", e);
            }
        }

        let mut recorder = match self.recorders.create(stream.clone()) {
            Ok(recorder) => recorder,
            Err(e) => return self.fail(e, Some(&stream)),
        };
        let (recorder_tx, mut recorder_rx) = mpsc::unbounded_channel();
        if let Err(e) = recorder.start(recorder_tx).await {
            return self.fail(e, Some(&stream));
        }

        let stop_at = match self.duration.map(|d| Instant::now().checked_add(d)) {
            None => None,
            Some(Some(deadline)) => Some(deadline),
            Some(None) => {
                let error = CaptureError::InvalidRequest(
                    "recording deadline is not representable".to_string(),
                );
                return self.fail(error, Some(&stream));
            }
        };
        let timers = CancellationToken::new();
        let mut buffer = FragmentBuffer::new();
        let mut started_at: Option<Instant> = None;
        let mut stop_requested = false;
        let mut commands_open = true;

        let result: CaptureResult<()> = loop {
            tokio::select! {
                event = recorder_rx.recv() => match event {
                    Some(RecorderEvent::Started) => {
                        if started_at.is_none() {
                            let started = Instant::now();
                            started_at = Some(started);
                            self.transition(SessionState::Recording);
                            self.emit(SessionEvent::RecorderStarted);
                            self.schedule_instructions(started, &timers);
                        }
                    }
                    Some(RecorderEvent::DataAvailable(fragment)) => {
                        tracing::debug!("Session {} fragment: {} bytes", self.id, fragment.len());
                        self.emit(SessionEvent::FragmentReceived { bytes: fragment.len() });
                        buffer.push(fragment);
                    }
                    Some(RecorderEvent::Stopped) => break Ok(()),
                    Some(RecorderEvent::Error(message)) => {
                        break Err(CaptureError::RuntimeAborted(message));
                    }
                    None => {
                        break Err(CaptureError::RuntimeAborted(
                            "recorder closed its event channel without stopping".to_string(),
                        ));
                    }
                },
                _ = tokio::time::sleep_until(stop_at.unwrap_or_else(Instant::now)),
                    if stop_at.is_some() && !stop_requested =>
                {
                    tracing::info!("Session {} reached its duration, stopping recorder", self.id);
                    stop_requested = true;
                    if let Err(e) = recorder.stop().await {
                        break Err(e);
                    }
                }
                command = commands.recv(), if commands_open && !stop_requested => match command {
                    Some(SessionCommand::Stop) => {
                        tracing::info!("Session {} stop requested", self.id);
                        stop_requested = true;
                        if let Err(e) = recorder.stop().await {
                            break Err(e);
                        }
                    }
                    None => commands_open = false,
                },
            }
        };
        drop(recorder);

        if let Err(e) = result {
            timers.cancel();
            return self.fail(e, Some(&stream));
        }

        self.transition(SessionState::Finalizing);
        if self.config.cancel_pending_instructions {
            timers.cancel();
        }

        let duration_ms = started_at
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        let fragments = buffer.len();
        let artifact =
            buffer.into_artifact(self.id, self.config.artifact_mime_type.clone(), duration_ms);
        let bytes = artifact.len();
        tracing::info!(
            "Session {} finished: {} fragments, {} bytes, {:.0}ms",
            self.id,
            fragments,
            bytes,
            duration_ms
        );

        self.complete(Ok(artifact));
        let released = stream.stop_all();
        tracing::debug!("Session {} released {} tracks", self.id, released);

        self.transition(SessionState::Done);
        self.emit(SessionEvent::Completed { bytes });
    }

    /// One timer per instruction, relative to the recorder's start event
    fn schedule_instructions(&self, started: Instant, timers: &CancellationToken) {
        for (index, instruction) in self.instructions.iter().cloned().enumerate() {
            let Some(at) = started.checked_add(instruction.offset()) else {
                tracing::warn!(
                    "Session {} instruction {} at {}s can never fire, skipping",
                    self.id,
                    index,
                    instruction.offset_seconds
                );
                continue;
            };
            let announcer = self.announcer.clone();
            let events = self.events.clone();
            let token = timers.clone();
            let session_id = self.id;
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!("Session {} instruction {} cancelled", session_id, index);
                    }
                    _ = tokio::time::sleep_until(at) => {
                        let announcement = announcer.speak(
                            instruction.text.as_deref(),
                            instruction.audio_url.as_deref(),
                        );
                        tracing::debug!(
                            "Session {} instruction {} at {}s: {:?}",
                            session_id,
                            index,
                            instruction.offset_seconds,
                            announcement
                        );
                        let _ = events.send(SessionEvent::InstructionAnnounced { index, announcement });
                    }
                }
            });
        }
    }

    fn fail(&mut self, error: CaptureError, stream: Option<&MediaStream>) {
        if let Some(stream) = stream {
            let released = stream.stop_all();
            tracing::debug!("Session {} released {} tracks after failure", self.id, released);
        }

        self.transition(SessionState::Failed);
        self.emit(SessionEvent::Failed {
            code: error.code().to_string(),
            message: error.to_string(),
        });

        match self.config.failure_policy {
            FailurePolicy::Report => {
                tracing::error!("Capture session {} failed: {}", self.id, error);
                self.complete(Err(error));
            }
            FailurePolicy::Silent => {
                tracing::warn!("Capture session {} failed (not reported): {}", self.id, error);
                self.on_complete.take();
            }
        }
    }

    fn complete(&mut self, outcome: CaptureOutcome) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(outcome);
        }
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            tracing::warn!(
                "Session {} ignoring transition {:?} -> {:?}",
                self.id,
                *state,
                next
            );
            return;
        }
        *state = next;
        drop(state);

        tracing::debug!("Session {} -> {:?}", self.id, next);
        self.emit(SessionEvent::StateChanged { state: next });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::buffer::Artifact;
    use crate::testing::{FakeDevices, FakePreview, RecorderScript, RecordingAnnouncer, ScriptedRecorderFactory};
    use std::sync::atomic::Ordering;

    type Outcomes = Arc<parking_lot::Mutex<Vec<CaptureOutcome>>>;

    struct Harness {
        devices: Arc<FakeDevices>,
        recorders: Arc<ScriptedRecorderFactory>,
        announcer: Arc<RecordingAnnouncer>,
        orchestrator: CaptureOrchestrator,
        outcomes: Outcomes,
    }

    impl Harness {
        fn new(devices: FakeDevices, script: RecorderScript, config: CaptureConfig) -> Self {
            let devices = Arc::new(devices);
            let recorders = Arc::new(ScriptedRecorderFactory::new(script));
            let announcer = Arc::new(RecordingAnnouncer::default());
            let orchestrator =
                CaptureOrchestrator::new(devices.clone(), recorders.clone(), announcer.clone(), config);
            Self {
                devices,
                recorders,
                announcer,
                orchestrator,
                outcomes: Arc::new(parking_lot::Mutex::new(Vec::new())),
            }
        }

        fn basic() -> Self {
            Self::new(FakeDevices::new(1), RecorderScript::default(), CaptureConfig::default())
        }

        fn request(&self, width: u32, height: u32) -> CaptureRequest {
            let outcomes = self.outcomes.clone();
            CaptureRequest::new(width, height, move |outcome| outcomes.lock().push(outcome))
        }

        fn artifact(&self) -> Artifact {
            let outcomes = self.outcomes.lock();
            assert_eq!(outcomes.len(), 1, "completion must fire exactly once");
            match &outcomes[0] {
                Ok(artifact) => artifact.clone(),
                Err(e) => panic!("expected artifact, got {e}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_capture_with_instruction() {
        let h = Harness::basic();
        let begin = Instant::now();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(3.0)
                    .instruction(Instruction::spoken(1.0, "turn head")),
            )
            .unwrap();

        assert_eq!(handle.join().await.unwrap(), SessionState::Done);

        let requests = h.devices.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], VideoConstraints::user_facing(640, 480));

        let started = h.recorders.log.started_at.lock().unwrap();
        let calls = h.announcer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].text.as_deref(), Some("turn head"));
        assert!(calls[0].at >= started + Duration::from_secs(1));

        let stop_at = h.recorders.log.stop_requested_at.lock().unwrap();
        assert!(stop_at >= begin + Duration::from_secs(3));

        let artifact = h.artifact();
        assert_eq!(artifact.mime_type, "video/mp4");
        assert_eq!(artifact.data, h.recorders.log.concatenated());
        assert!(artifact.fragment_count >= 6);
        assert_eq!(h.devices.track_stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_stop_without_duration() {
        let h = Harness::basic();
        let handle = h.orchestrator.capture(h.request(320, 240)).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), SessionState::Recording);
        assert!(h.outcomes.lock().is_empty());

        assert!(handle.stop());
        assert_eq!(handle.join().await.unwrap(), SessionState::Done);

        let artifact = h.artifact();
        assert_eq!(artifact.data, h.recorders.log.concatenated());
        assert!(h.announcer.calls().is_empty());
        assert_eq!(h.devices.track_stops(), 1);
        assert!(!h.devices.streams()[0].is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_without_duration_keeps_recording() {
        let h = Harness::basic();
        let handle = h.orchestrator.capture(h.request(320, 240)).unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(handle.state(), SessionState::Recording);
        assert!(!handle.is_finished());
        assert!(h.outcomes.lock().is_empty());
        assert_eq!(h.devices.track_stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instruction_timers_follow_start_event() {
        let script = RecorderScript {
            start_delay: Duration::from_secs(2),
            ..RecorderScript::default()
        };
        let h = Harness::new(FakeDevices::new(1), script, CaptureConfig::default());
        let begin = Instant::now();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(10.0)
                    .instruction(Instruction::spoken(3.0, "open mouth"))
                    .instruction(Instruction::spoken(0.0, "look here"))
                    .instruction(Instruction::spoken(1.5, "blink")),
            )
            .unwrap();
        handle.join().await.unwrap();

        let started = h.recorders.log.started_at.lock().unwrap();
        assert!(started >= begin + Duration::from_secs(2));

        let calls = h.announcer.calls();
        let texts: Vec<_> = calls.iter().filter_map(|c| c.text.clone()).collect();
        assert_eq!(texts, vec!["look here", "blink", "open mouth"]);
        assert!(calls[0].at >= started);
        assert!(calls[1].at >= started + Duration::from_millis(1500));
        assert!(calls[2].at >= started + Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_stop_cancels_pending_instructions() {
        let h = Harness::basic();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(2.0)
                    .instruction(Instruction::spoken(1.0, "nod"))
                    .instruction(Instruction::spoken(5.0, "too late")),
            )
            .unwrap();
        handle.join().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let texts: Vec<_> = h.announcer.calls().into_iter().filter_map(|c| c.text).collect();
        assert_eq!(texts, vec!["nod"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_instructions_fire_after_stop_when_not_cancelled() {
        let config = CaptureConfig {
            cancel_pending_instructions: false,
            ..CaptureConfig::default()
        };
        let h = Harness::new(FakeDevices::new(1), RecorderScript::default(), config);
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(2.0)
                    .instruction(Instruction::spoken(5.0, "stale")),
            )
            .unwrap();
        handle.join().await.unwrap();
        assert!(h.announcer.calls().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let calls = h.announcer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].text.as_deref(), Some("stale"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_failure_is_reported() {
        let h = Harness::new(
            FakeDevices::failing(CaptureError::PermissionDenied),
            RecorderScript::default(),
            CaptureConfig::default(),
        );
        let handle = h.orchestrator.capture(h.request(640, 480).duration_seconds(1.0)).unwrap();
        assert_eq!(handle.join().await.unwrap(), SessionState::Failed);

        let outcomes = h.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(CaptureError::PermissionDenied(_))));
        assert!(h.recorders.log.started_at.lock().is_none());
        assert_eq!(h.devices.track_stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_failure_can_stay_silent() {
        let config = CaptureConfig {
            failure_policy: FailurePolicy::Silent,
            ..CaptureConfig::default()
        };
        let h = Harness::new(
            FakeDevices::failing(CaptureError::DeviceUnavailable),
            RecorderScript::default(),
            config,
        );
        let handle = h.orchestrator.capture(h.request(640, 480)).unwrap();
        let mut events = handle.subscribe();
        assert_eq!(handle.join().await.unwrap(), SessionState::Failed);

        assert!(h.outcomes.lock().is_empty());
        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Failed { code, .. } = event {
                assert_eq!(code, "DEVICE_UNAVAILABLE");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_error_releases_tracks() {
        let script = RecorderScript {
            error_after: Some(Duration::from_millis(1200)),
            ..RecorderScript::default()
        };
        let h = Harness::new(FakeDevices::new(2), script, CaptureConfig::default());
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(5.0)
                    .instruction(Instruction::spoken(3.0, "never")),
            )
            .unwrap();
        assert_eq!(handle.join().await.unwrap(), SessionState::Failed);
        tokio::time::sleep(Duration::from_secs(10)).await;

        let outcomes = h.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(CaptureError::RuntimeAborted(_))));
        assert_eq!(h.devices.track_stops(), 2);
        assert!(h.announcer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_start_failure_releases_tracks() {
        let script = RecorderScript {
            fail_start: true,
            ..RecorderScript::default()
        };
        let h = Harness::new(FakeDevices::new(1), script, CaptureConfig::default());
        let handle = h.orchestrator.capture(h.request(640, 480)).unwrap();
        assert_eq!(handle.join().await.unwrap(), SessionState::Failed);
        assert_eq!(h.devices.track_stops(), 1);
        assert!(matches!(h.outcomes.lock()[0], Err(CaptureError::RuntimeAborted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_stopped_once_even_if_observer_stopped_one() {
        let h = Harness::new(FakeDevices::new(3), RecorderScript::default(), CaptureConfig::default());
        let request = h
            .request(640, 480)
            .duration_seconds(1.0)
            .observe_stream(|stream| {
                assert_eq!(stream.tracks().len(), 3);
                stream.tracks()[1].stop();
            });
        let handle = h.orchestrator.capture(request).unwrap();
        handle.join().await.unwrap();

        assert_eq!(h.devices.track_stops(), 3);
        h.artifact();
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_failure_is_not_fatal() {
        let h = Harness::basic();
        let preview = Arc::new(FakePreview {
            fail_play: true,
            ..FakePreview::default()
        });
        let handle = h
            .orchestrator
            .capture(h.request(640, 480).duration_seconds(1.0).preview(preview.clone()))
            .unwrap();
        assert_eq!(handle.join().await.unwrap(), SessionState::Done);

        assert_eq!(preview.bound.load(Ordering::SeqCst), 1);
        assert_eq!(preview.played.load(Ordering::SeqCst), 1);
        h.artifact();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_is_rejected_synchronously() {
        let h = Harness::basic();
        let err = h
            .orchestrator
            .capture(h.request(640, 480).instruction(Instruction {
                offset_seconds: 1.0,
                text: None,
                audio_url: None,
            }))
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::InvalidRequest(_)));
        assert!(h.devices.requests().is_empty());
        assert!(h.outcomes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_duration_is_rejected_synchronously() {
        let h = Harness::basic();
        let err = h
            .orchestrator
            .capture(h.request(640, 480).duration_seconds(1e19))
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::InvalidRequest(_)));
        assert!(h.devices.requests().is_empty());

        let err = h
            .orchestrator
            .capture(h.request(640, 480).duration_seconds(1e20))
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::InvalidRequest(_)));
        assert!(h.outcomes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_instruction_is_skipped() {
        let h = Harness::basic();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(2.0)
                    .instruction(Instruction::spoken(1e19, "never"))
                    .instruction(Instruction::spoken(1.0, "soon")),
            )
            .unwrap();
        assert_eq!(handle.join().await.unwrap(), SessionState::Done);

        let texts: Vec<_> = h.announcer.calls().into_iter().filter_map(|c| c.text).collect();
        assert_eq!(texts, vec!["soon"]);
        assert_eq!(h.devices.track_stops(), 1);
        h.artifact();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_offsets_fire_in_order() {
        let h = Harness::basic();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(1.0)
                    .instruction(Instruction::spoken(0.002, "second"))
                    .instruction(Instruction::spoken(0.001, "first")),
            )
            .unwrap();
        handle.join().await.unwrap();

        let started = h.recorders.log.started_at.lock().unwrap();
        let calls = h.announcer.calls();
        let texts: Vec<_> = calls.iter().filter_map(|c| c.text.clone()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(calls[0].at >= started + Duration::from_millis(1));
        assert!(calls[1].at >= started + Duration::from_millis(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sessions_are_independent() {
        let h = Harness::new(FakeDevices::new(1), RecorderScript::default(), CaptureConfig::default());
        let first = h.orchestrator.capture(h.request(640, 480).duration_seconds(1.0)).unwrap();
        let second = h.orchestrator.capture(h.request(1280, 720).duration_seconds(2.0)).unwrap();
        assert_ne!(first.session_id(), second.session_id());

        first.join().await.unwrap();
        second.join().await.unwrap();

        assert_eq!(h.devices.streams().len(), 2);
        assert_eq!(h.devices.track_stops(), 2);
        assert_eq!(h.outcomes.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_stream_reports_lifecycle() {
        let h = Harness::basic();
        let handle = h
            .orchestrator
            .capture(
                h.request(640, 480)
                    .duration_seconds(1.0)
                    .instruction(Instruction::spoken(0.5, "hello")),
            )
            .unwrap();
        let mut events = handle.subscribe();
        handle.join().await.unwrap();

        let mut states = Vec::new();
        let mut announced = 0;
        let mut completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::StateChanged { state } => states.push(state),
                SessionEvent::InstructionAnnounced { .. } => announced += 1,
                SessionEvent::Completed { .. } => completed = true,
                _ => {}
            }
        }
        assert_eq!(
            states,
            vec![
                SessionState::Acquiring,
                SessionState::Recording,
                SessionState::Finalizing,
                SessionState::Done
            ]
        );
        assert_eq!(announced, 1);
        assert!(completed);
    }

    #[test]
    fn test_capture_outside_runtime_fails() {
        let h = Harness::basic();
        let err = h.orchestrator.capture(h.request(640, 480)).err().unwrap();
        assert!(matches!(err, CaptureError::RuntimeAborted(_)));
    }
}
