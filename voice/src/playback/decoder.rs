//! Streaming decode through an external process.
//!
//! Compressed bytes go to the process's stdin while its stdout is read
//! concurrently, so output starts before the input is complete. Stdout is
//! cut into 20 ms chunks and converted to samples by separate tasks; each
//! stage ends when its input closes, in order.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use voicegate_audio::opusrt::PCM_FRAME_BYTES;
use voicegate_audio::pcm::{PcmFrame, Rechunker};

use crate::config::DecoderConfig;
use crate::error::PlaybackError;
use crate::logger::{Logger, component_logger};
use crate::{log_debug, log_warn};

use super::PcmFrames;

const STDERR_TAIL: usize = 4096;
const DEFAULT_FRAME_QUEUE: usize = 64;

/// Runs the decoder process and its stage tasks.
#[derive(Clone)]
pub struct Transcoder {
    config: DecoderConfig,
    frame_queue: usize,
    logger: Arc<dyn Logger>,
}

impl Transcoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config: config.normalized(),
            frame_queue: DEFAULT_FRAME_QUEUE,
            logger: component_logger("transcoder"),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Capacity of the frame channel returned by [`start`](Self::start).
    pub fn with_frame_queue(mut self, capacity: usize) -> Self {
        self.frame_queue = capacity.max(1);
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Spawns the decoder and starts streaming `input` through it.
    ///
    /// Frames arrive in decode order. A full frame is 3840 bytes of 48 kHz
    /// stereo; only the last one may be shorter. A decoder failure arrives
    /// as an `Err` after the frames it did produce. Closing `input` ends
    /// the stream; cancelling `cancel` kills the process.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        &self,
        input: mpsc::Receiver<Bytes>,
        cancel: CancellationToken,
    ) -> Result<PcmFrames, PlaybackError> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(PlaybackError::Io(std::io::Error::other(
                "decoder pipes unavailable",
            )));
        };

        log_debug!(
            self.logger,
            "decoder started: {} (pid {:?})",
            self.config.program,
            child.id()
        );

        // stages stop on this; the caller's token only reaches them through it
        let stop = cancel.child_token();
        let capacity = self.config.channel_capacity;
        let (raw_tx, raw_rx) = mpsc::channel(capacity);
        let (chunk_tx, chunk_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(self.frame_queue);

        let stages = Stages {
            feeder: tokio::spawn(feed(stdin, input, stop.clone())),
            reader: tokio::spawn(read_stdout(
                stdout,
                raw_tx,
                self.config.read_buffer,
                stop.clone(),
            )),
            rechunker: tokio::spawn(rechunk(raw_rx, chunk_tx, stop.clone())),
            converter: tokio::spawn(convert(chunk_rx, out_tx.clone(), stop.clone())),
            stderr: tokio::spawn(tail(stderr)),
        };

        tokio::spawn(supervise(
            child,
            stages,
            out_tx,
            cancel,
            stop,
            self.logger.clone(),
        ));

        Ok(PcmFrames::new(out_rx))
    }

    /// Decodes a complete buffer. Returns every frame or the first error.
    pub async fn transcode(&self, audio: Bytes) -> Result<Vec<PcmFrame>, PlaybackError> {
        self.transcode_with_cancel(audio, CancellationToken::new()).await
    }

    pub async fn transcode_with_cancel(
        &self,
        audio: Bytes,
        cancel: CancellationToken,
    ) -> Result<Vec<PcmFrame>, PlaybackError> {
        let (tx, rx) = mpsc::channel(1);
        if !audio.is_empty() {
            tx.send(audio)
                .await
                .map_err(|e| PlaybackError::Send(e.to_string()))?;
        }
        drop(tx);
        self.start(rx, cancel)?.collect().await
    }
}

struct Stages {
    feeder: JoinHandle<std::io::Result<()>>,
    reader: JoinHandle<std::io::Result<()>>,
    rechunker: JoinHandle<()>,
    converter: JoinHandle<()>,
    stderr: JoinHandle<String>,
}

async fn feed(
    mut stdin: ChildStdin,
    mut input: mpsc::Receiver<Bytes>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    loop {
        let data = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            data = input.recv() => match data {
                Some(data) => data,
                None => break,
            },
        };
        match stdin.write_all(&data).await {
            Ok(()) => {}
            // the decoder stopped reading; its exit status tells why
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

async fn read_stdout(
    mut stdout: impl AsyncRead + Unpin,
    raw_tx: mpsc::Sender<Bytes>,
    buffer: usize,
    stop: CancellationToken,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; buffer.max(1)];
    loop {
        let n = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(()),
            n = stdout.read(&mut buf) => n?,
        };
        if n == 0 {
            return Ok(());
        }
        if raw_tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            return Ok(());
        }
    }
}

async fn rechunk(
    mut raw_rx: mpsc::Receiver<Bytes>,
    chunk_tx: mpsc::Sender<Vec<u8>>,
    stop: CancellationToken,
) {
    let mut chunker = Rechunker::new(PCM_FRAME_BYTES);
    loop {
        let raw = tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            raw = raw_rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };
        for chunk in chunker.push(&raw) {
            if chunk_tx.send(chunk).await.is_err() {
                return;
            }
        }
    }
    if let Some(rest) = chunker.finish() {
        let _ = chunk_tx.send(rest).await;
    }
}

async fn convert(
    mut chunk_rx: mpsc::Receiver<Vec<u8>>,
    out_tx: mpsc::Sender<Result<PcmFrame, PlaybackError>>,
    stop: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            chunk = chunk_rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => return,
            },
        };
        let frame = PcmFrame::from_le_bytes(&chunk);
        if frame.is_empty() {
            continue;
        }
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            sent = out_tx.send(Ok(frame)) => if sent.is_err() { return },
        }
    }
}

/// Keeps the last few KiB of stderr.
async fn tail(mut stderr: impl AsyncRead + Unpin) -> String {
    let mut kept = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&buf[..n]);
                if kept.len() > STDERR_TAIL {
                    kept.drain(..kept.len() - STDERR_TAIL);
                }
            }
        }
    }
    String::from_utf8_lossy(&kept).trim().to_string()
}

async fn supervise(
    mut child: Child,
    stages: Stages,
    out_tx: mpsc::Sender<Result<PcmFrame, PlaybackError>>,
    cancel: CancellationToken,
    stop: CancellationToken,
    logger: Arc<dyn Logger>,
) {
    enum Outcome {
        Exited(std::io::Result<ExitStatus>),
        Cancelled,
        Abandoned,
    }

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        _ = out_tx.closed() => Outcome::Abandoned,
        status = child.wait() => Outcome::Exited(status),
    };

    let status = match outcome {
        Outcome::Exited(status) if !cancel.is_cancelled() => status,
        Outcome::Exited(_) | Outcome::Cancelled => {
            stop.cancel();
            kill(&mut child, &logger).await;
            stages.abort();
            log_debug!(logger, "decoder cancelled");
            let _ = out_tx.send(Err(PlaybackError::Cancelled)).await;
            return;
        }
        Outcome::Abandoned => {
            stop.cancel();
            kill(&mut child, &logger).await;
            stages.abort();
            log_debug!(logger, "decoder output dropped by consumer");
            return;
        }
    };

    // the process is gone: drain what it wrote, then report
    if !stages.feeder.is_finished() {
        stages.feeder.abort();
    }
    let feed_result = stages.feeder.await.unwrap_or(Ok(()));
    let read_result = stages.reader.await.unwrap_or(Ok(()));
    let _ = stages.rechunker.await;
    let _ = stages.converter.await;
    let stderr = stages.stderr.await.unwrap_or_default();

    let err = match status {
        Err(e) => Some(PlaybackError::Io(e)),
        Ok(status) if !status.success() => Some(PlaybackError::DecoderExited {
            status: status.to_string(),
            stderr,
        }),
        Ok(_) => read_result.and(feed_result).err().map(PlaybackError::Io),
    };

    match err {
        Some(e) => {
            log_warn!(logger, "decoder failed: {}", e);
            let _ = out_tx.send(Err(e)).await;
        }
        None => log_debug!(logger, "decoder finished"),
    }
}

async fn kill(child: &mut Child, logger: &Arc<dyn Logger>) {
    if let Err(e) = child.kill().await {
        log_warn!(logger, "decoder kill failed: {}", e);
    }
}

impl Stages {
    fn abort(&self) {
        self.feeder.abort();
        self.reader.abort();
        self.rechunker.abort();
        self.converter.abort();
        self.stderr.abort();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logger::NopLogger;

    fn cat() -> Transcoder {
        Transcoder::new(DecoderConfig::command("cat", &[]))
            .with_logger(Arc::new(NopLogger))
    }

    fn ramp(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    #[tokio::test]
    async fn test_exact_frames() {
        let frames = cat().transcode(ramp(3 * PCM_FRAME_BYTES)).await.unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(PcmFrame::is_complete));
    }

    #[tokio::test]
    async fn test_short_final_frame_lossless() {
        let r = 1001;
        let input = ramp(2 * PCM_FRAME_BYTES + r);
        let frames = cat().transcode(input.clone()).await.unwrap();

        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_complete());
        assert!(frames[1].is_complete());
        assert_eq!(frames[2].len(), r / 2);

        let bytes: Vec<u8> = frames.iter().flat_map(PcmFrame::to_le_bytes).collect();
        assert_eq!(bytes[..], input[..input.len() - 1]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let frames = cat().transcode(Bytes::new()).await.unwrap();
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let t = Transcoder::new(DecoderConfig::command("/nonexistent/voicegate-decoder", &[]));
        let (_tx, rx) = mpsc::channel(1);
        match t.start(rx, CancellationToken::new()) {
            Err(PlaybackError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/voicegate-decoder")
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[tokio::test]
    async fn test_failing_decoder() {
        let t = Transcoder::new(DecoderConfig::command("false", &[]))
            .with_logger(Arc::new(NopLogger));
        let err = t.transcode(ramp(100)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::DecoderExited { .. }));
    }

    #[tokio::test]
    async fn test_exit_error_carries_stderr() {
        let t = Transcoder::new(DecoderConfig::command(
            "sh",
            &["-c", "cat >/dev/null; echo bad input >&2; exit 3"],
        ))
        .with_logger(Arc::new(NopLogger));
        match t.transcode(ramp(10)).await {
            Err(PlaybackError::DecoderExited { status, stderr }) => {
                assert!(status.contains('3'), "status {status}");
                assert_eq!(stderr, "bad input");
            }
            other => panic!("unexpected {:?}", other.map(|f| f.len())),
        }
    }

    #[tokio::test]
    async fn test_output_before_input_closes() {
        let (tx, rx) = mpsc::channel(4);
        let mut frames = cat().start(rx, CancellationToken::new()).unwrap();

        tx.send(ramp(PCM_FRAME_BYTES)).await.unwrap();
        let first = frames.next().await.unwrap().unwrap();
        assert!(first.is_complete());

        tx.send(ramp(PCM_FRAME_BYTES / 2)).await.unwrap();
        drop(tx);
        let rest = frames.collect().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].len(), PCM_FRAME_BYTES / 4);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let frames = cat().start(rx, cancel.clone()).unwrap();
        tx.send(ramp(64)).await.unwrap();
        cancel.cancel();
        let err = frames.collect().await.unwrap_err();
        assert!(matches!(err, PlaybackError::Cancelled));
    }
}
