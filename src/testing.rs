//! Scripted collaborators for unit tests

use crate::capture::stream::{MediaStream, MediaTrack, StreamSettings, TrackKind, TrackSource};
use crate::capture::traits::{MediaDevices, PreviewSink, VideoConstraints};
use crate::recorder::traits::{MediaRecorder, RecorderEvent, RecorderEventSender, RecorderFactory};
use crate::speech::{Announcement, Announcer, AudioCuePlayer, SpeechSynthesizer};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct FakeSpeech {
    available: bool,
    spoken: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn available() -> Self {
        Self {
            available: true,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl SpeechSynthesizer for FakeSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&self, text: &str) -> CaptureResult<()> {
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

pub struct FakeCuePlayer {
    available: bool,
    played: Mutex<Vec<String>>,
}

impl FakeCuePlayer {
    pub fn available() -> Self {
        Self {
            available: true,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }
}

impl AudioCuePlayer for FakeCuePlayer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn play(&self, url: &str) -> CaptureResult<()> {
        self.played.lock().push(url.to_string());
        Ok(())
    }
}

/// One call to `Announcer::speak`
#[derive(Debug, Clone)]
pub struct SpokenInstruction {
    pub at: Instant,
    pub text: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    calls: Mutex<Vec<SpokenInstruction>>,
}

impl RecordingAnnouncer {
    pub fn calls(&self) -> Vec<SpokenInstruction> {
        self.calls.lock().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn speak(&self, text: Option<&str>, audio_url: Option<&str>) -> Announcement {
        self.calls.lock().push(SpokenInstruction {
            at: Instant::now(),
            text: text.map(str::to_string),
            audio_url: audio_url.map(str::to_string),
        });
        Announcement::Spoken
    }
}

pub struct CountingTrack {
    stops: Arc<AtomicUsize>,
}

impl TrackSource for CountingTrack {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Devices that hand out counting tracks, or fail
pub struct FakeDevices {
    failure: Option<fn(String) -> CaptureError>,
    track_count: usize,
    stops: Arc<AtomicUsize>,
    requests: Mutex<Vec<VideoConstraints>>,
    streams: Mutex<Vec<Arc<MediaStream>>>,
}

impl FakeDevices {
    pub fn new(track_count: usize) -> Self {
        Self {
            failure: None,
            track_count,
            stops: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: fn(String) -> CaptureError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(1)
        }
    }

    /// Total `TrackSource::stop` calls across every stream handed out
    pub fn track_stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<VideoConstraints> {
        self.requests.lock().clone()
    }

    pub fn streams(&self) -> Vec<Arc<MediaStream>> {
        self.streams.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire(&self, constraints: VideoConstraints) -> CaptureResult<Arc<MediaStream>> {
        self.requests.lock().push(constraints);
        if let Some(failure) = self.failure {
            return Err(failure("scripted failure".to_string()));
        }
        let tracks = (0..self.track_count)
            .map(|i| {
                MediaTrack::new(
                    TrackKind::Video,
                    format!("fake-{i}"),
                    Box::new(CountingTrack {
                        stops: self.stops.clone(),
                    }),
                )
            })
            .collect();
        let stream = Arc::new(MediaStream::new(
            StreamSettings {
                width: constraints.resolution.width,
                height: constraints.resolution.height,
                frame_rate: Some(30),
                facing_mode: constraints.facing_mode,
                device_label: "fake".to_string(),
            },
            tracks,
        ));
        self.streams.lock().push(stream.clone());
        Ok(stream)
    }
}

/// How a scripted recorder behaves
#[derive(Debug, Clone)]
pub struct RecorderScript {
    /// Delay between `start()` and the `Started` event
    pub start_delay: Duration,
    /// Interval between fragments
    pub fragment_every: Duration,
    /// Report an error this long after starting instead of running to a stop
    pub error_after: Option<Duration>,
    pub fail_start: bool,
}

impl Default for RecorderScript {
    fn default() -> Self {
        Self {
            start_delay: Duration::ZERO,
            fragment_every: Duration::from_millis(500),
            error_after: None,
            fail_start: false,
        }
    }
}

/// Shared log of what scripted recorders did
#[derive(Debug, Default)]
pub struct RecorderLog {
    pub fragments: Mutex<Vec<Vec<u8>>>,
    pub started_at: Mutex<Option<Instant>>,
    pub stop_requested_at: Mutex<Option<Instant>>,
}

impl RecorderLog {
    pub fn concatenated(&self) -> Vec<u8> {
        self.fragments.lock().concat()
    }
}

pub struct ScriptedRecorderFactory {
    script: RecorderScript,
    pub log: Arc<RecorderLog>,
}

impl ScriptedRecorderFactory {
    pub fn new(script: RecorderScript) -> Self {
        Self {
            script,
            log: Arc::new(RecorderLog::default()),
        }
    }
}

impl RecorderFactory for ScriptedRecorderFactory {
    fn create(&self, _stream: Arc<MediaStream>) -> CaptureResult<Box<dyn MediaRecorder>> {
        Ok(Box::new(ScriptedRecorder {
            script: self.script.clone(),
            log: self.log.clone(),
            stop: CancellationToken::new(),
        }))
    }
}

struct ScriptedRecorder {
    script: RecorderScript,
    log: Arc<RecorderLog>,
    stop: CancellationToken,
}

#[async_trait]
impl MediaRecorder for ScriptedRecorder {
    async fn start(&mut self, events: RecorderEventSender) -> CaptureResult<()> {
        if self.script.fail_start {
            return Err(CaptureError::RuntimeAborted("scripted start failure".to_string()));
        }
        let script = self.script.clone();
        let log = self.log.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(script.start_delay).await;
            let started = Instant::now();
            *log.started_at.lock() = Some(started);
            let _ = events.send(RecorderEvent::Started);

            let error_at = script.error_after.map(|d| started + d);
            let mut ticker = tokio::time::interval_at(started + script.fragment_every, script.fragment_every);
            let mut index = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep_until(error_at.unwrap_or(started)), if error_at.is_some() => {
                        let _ = events.send(RecorderEvent::Error("scripted encoder crash".to_string()));
                        return;
                    }
                    _ = ticker.tick() => {
                        let fragment = format!("frag-{index};").into_bytes();
                        log.fragments.lock().push(fragment.clone());
                        let _ = events.send(RecorderEvent::DataAvailable(fragment));
                        index += 1;
                    }
                }
            }
            // Final flush, like a real recorder emitting its tail on stop
            let tail = b"tail;".to_vec();
            log.fragments.lock().push(tail.clone());
            let _ = events.send(RecorderEvent::DataAvailable(tail));
            let _ = events.send(RecorderEvent::Stopped);
        });
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        *self.log.stop_requested_at.lock() = Some(Instant::now());
        self.stop.cancel();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePreview {
    pub fail_play: bool,
    pub bound: AtomicUsize,
    pub played: AtomicUsize,
}

impl PreviewSink for FakePreview {
    fn bind(&self, _stream: Arc<MediaStream>) {
        self.bound.fetch_add(1, Ordering::SeqCst);
    }

    fn play(&self) -> CaptureResult<()> {
        self.played.fetch_add(1, Ordering::SeqCst);
        if self.fail_play {
            return Err(CaptureError::RuntimeAborted("autoplay blocked".to_string()));
        }
        Ok(())
    }
}
