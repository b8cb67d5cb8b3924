//! FFmpeg-backed recorder
//!
//! Raw frames from the stream are piped into FFmpeg's stdin; FFmpeg writes
//! fragmented MP4 to stdout, which is read back in chunks and emitted as
//! fragments. Fragmented output means the concatenation of every fragment is
//! a playable `video/mp4` file.

use super::traits::{MediaRecorder, RecorderEvent, RecorderEventSender, RecorderFactory};
use crate::capture::stream::{MediaStream, PixelFormat, VideoFrame};
use crate::config::RecorderOptions;
use crate::utils::error::{CaptureError, CaptureResult};
use crate::utils::process::find_program;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Build the FFmpeg argument list for one recording
pub fn build_args(
    options: &RecorderOptions,
    width: u32,
    height: u32,
    fps: u32,
    pixel_format: PixelFormat,
) -> Vec<String> {
    let fps = fps.max(1);
    let size = format!("{width}x{height}");
    let rate = fps.to_string();
    let gop = (fps * 2).to_string();
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        pixel_format.ffmpeg_name(),
        "-video_size",
        size.as_str(),
        "-framerate",
        rate.as_str(),
        "-i",
        "-",
        "-c:v",
        options.video_codec.as_str(),
        "-preset",
        options.preset.as_str(),
        "-pix_fmt",
        "yuv420p",
        "-g",
        gop.as_str(),
        // Fragmented MP4 can be written to a pipe and concatenated as it streams
        "-movflags",
        "frag_keyframe+empty_moov+default_base_moof",
        "-f",
        "mp4",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Creates `FfmpegRecorder`s
#[derive(Debug, Clone, Default)]
pub struct FfmpegRecorderFactory {
    options: RecorderOptions,
}

impl FfmpegRecorderFactory {
    pub fn new(options: RecorderOptions) -> Self {
        Self { options }
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn create(&self, stream: Arc<MediaStream>) -> CaptureResult<Box<dyn MediaRecorder>> {
        Ok(Box::new(FfmpegRecorder::new(stream, self.options.clone())))
    }
}

pub struct FfmpegRecorder {
    stream: Arc<MediaStream>,
    options: RecorderOptions,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FfmpegRecorder {
    pub fn new(stream: Arc<MediaStream>, options: RecorderOptions) -> Self {
        Self {
            stream,
            options,
            stop: CancellationToken::new(),
            task: None,
        }
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    async fn start(&mut self, events: RecorderEventSender) -> CaptureResult<()> {
        if self.task.is_some() {
            return Err(CaptureError::RuntimeAborted("recorder already started".to_string()));
        }

        let frames = self.stream.subscribe_frames().ok_or_else(|| {
            CaptureError::RuntimeAborted("stream does not publish frames".to_string())
        })?;
        let ffmpeg = find_program(&self.options.ffmpeg_path).ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "FFmpeg not found ({}). Please install FFmpeg",
                self.options.ffmpeg_path
            ))
        })?;

        let settings = self.stream.settings();
        let fps = settings.frame_rate.unwrap_or(self.options.frame_rate);
        let args = build_args(
            &self.options,
            settings.width,
            settings.height,
            fps,
            PixelFormat::Rgb24,
        );

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::RuntimeAborted("FFmpeg stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::RuntimeAborted("FFmpeg stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::RuntimeAborted("FFmpeg stderr unavailable".to_string()))?;

        tracing::info!(
            "Started FFmpeg recorder: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            fps,
            self.options.video_codec
        );

        let _ = events.send(RecorderEvent::Started);

        let expected = (settings.width, settings.height);
        let chunk_size = self.options.chunk_size.max(1);
        let stop = self.stop.clone();
        self.task = Some(tokio::spawn(async move {
            // stderr is drained alongside stdout so a chatty FFmpeg cannot block
            let (written, read, errors) = tokio::join!(
                pump_frames(frames, stdin, expected, stop),
                pump_fragments(stdout, chunk_size, &events),
                drain_stderr(stderr),
            );

            let status = child.wait().await;
            let outcome = match (read, status) {
                (Err(e), _) => RecorderEvent::Error(format!("reading FFmpeg output: {e}")),
                (Ok(_), Err(e)) => RecorderEvent::Error(format!("waiting for FFmpeg: {e}")),
                (Ok(_), Ok(status)) if !status.success() => RecorderEvent::Error(format!(
                    "FFmpeg exited with {}: {}",
                    status,
                    errors.trim()
                )),
                (Ok(bytes), Ok(_)) => {
                    tracing::info!("FFmpeg recorder finished: {} frames, {} bytes", written, bytes);
                    RecorderEvent::Stopped
                }
            };
            let _ = events.send(outcome);
        }));

        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        if self.task.is_none() {
            return Err(CaptureError::RuntimeAborted("recorder not started".to_string()));
        }
        self.stop.cancel();
        Ok(())
    }
}

async fn pump_frames(
    mut frames: broadcast::Receiver<Arc<VideoFrame>>,
    mut stdin: ChildStdin,
    expected: (u32, u32),
    stop: CancellationToken,
) -> u64 {
    let mut written: u64 = 0;
    loop {
        let frame = tokio::select! {
            _ = stop.cancelled() => break,
            frame = frames.recv() => frame,
        };
        match frame {
            Ok(frame) => {
                if (frame.width, frame.height) != expected || frame.pixel_format != PixelFormat::Rgb24 {
                    tracing::warn!(
                        "Dropping {}x{} {:?} frame, recorder expects {}x{} rgb24",
                        frame.width,
                        frame.height,
                        frame.pixel_format,
                        expected.0,
                        expected.1
                    );
                    continue;
                }
                if let Err(e) = stdin.write_all(&frame.data).await {
                    tracing::warn!("FFmpeg stdin closed: {}", e);
                    break;
                }
                written += 1;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("Recorder lagged, skipped {} frames", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    // Closing stdin tells FFmpeg to flush and exit
    drop(stdin);
    written
}

async fn pump_fragments(
    mut stdout: ChildStdout,
    chunk_size: usize,
    events: &RecorderEventSender,
) -> std::io::Result<usize> {
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0;
    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        total += n;
        let _ = events.send(RecorderEvent::DataAvailable(buf[..n].to_vec()));
    }
}

async fn drain_stderr(mut stderr: ChildStderr) -> String {
    let mut output = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut output).await {
        tracing::debug!("Failed to read FFmpeg stderr: {}", e);
    }
    String::from_utf8_lossy(&output).into_owned()
}
