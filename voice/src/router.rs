//! Stream router.
//!
//! Maps each inbound packet's (ssrc, call, channel) to a logical stream,
//! creating the stream and its processing task on first sight. Each stream
//! owns a bounded queue; a full queue drops the newest frame instead of
//! blocking the ingest path.
//!
//! The registry lock guards only the key → slot map. Creation, which may
//! wait on the external resolver, runs inside the slot's `OnceCell`, so
//! concurrent first-sight packets for one key create exactly one stream.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use voicegate_audio::opusrt::{CompressedFrame, EpochMillis, Packet};

use crate::config::VoiceConfig;
use crate::encoder::{EncoderStats, GapEncoder};
use crate::error::{EncodeError, RouterError};
use crate::logger::{Logger, component_logger};
use crate::recognizer::{Recognizer, SessionSet};
use crate::sink::ContainerSink;
use crate::store::FrameStore;
use crate::stream::{AnonymousResolver, LogicalStream, StreamKey, StreamReport, StreamResolver};
use crate::stream_id::StreamId;
use crate::{log_debug, log_error, log_info, log_warn};

type Slot = Arc<OnceCell<Arc<StreamHandle>>>;

/// What happened to an ingested frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    Queued(StreamId),
    /// The stream's queue was full.
    Dropped(StreamId),
}

struct StreamHandle {
    stream: LogicalStream,
    tx: Mutex<Option<mpsc::Sender<CompressedFrame>>>,
    dropped: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<StreamReport>>>,
}

/// Builds a [`Router`].
pub struct RouterBuilder {
    sink: Arc<dyn ContainerSink>,
    resolver: Arc<dyn StreamResolver>,
    store: Option<Arc<dyn FrameStore>>,
    recognizers: Vec<Arc<dyn Recognizer>>,
    logger: Arc<dyn Logger>,
    queue_capacity: usize,
    locales: Vec<String>,
}

impl RouterBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(mut self, store: Arc<dyn FrameStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Takes the queue capacity and locales from `config`.
    pub fn config(mut self, config: &VoiceConfig) -> Self {
        let config = config.clone().normalized();
        self.queue_capacity = config.queue_capacity;
        self.locales = config.locales;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Router {
        Router {
            inner: Arc::new(Inner {
                sink: self.sink,
                resolver: self.resolver,
                store: self.store,
                recognizers: self.recognizers,
                logger: self.logger,
                queue_capacity: self.queue_capacity,
                locales: self.locales,
                slots: RwLock::new(HashMap::new()),
                cancel: CancellationToken::new(),
                next_serial: AtomicU32::new(1),
            }),
        }
    }
}

struct Inner {
    sink: Arc<dyn ContainerSink>,
    resolver: Arc<dyn StreamResolver>,
    store: Option<Arc<dyn FrameStore>>,
    recognizers: Vec<Arc<dyn Recognizer>>,
    logger: Arc<dyn Logger>,
    queue_capacity: usize,
    locales: Vec<String>,
    slots: RwLock<HashMap<StreamKey, Slot>>,
    cancel: CancellationToken,
    next_serial: AtomicU32,
}

/// Registry of logical streams and their processing tasks.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    /// Starts building a router writing containers to `sink`.
    pub fn builder(sink: Arc<dyn ContainerSink>) -> RouterBuilder {
        RouterBuilder {
            sink,
            resolver: Arc::new(AnonymousResolver),
            store: None,
            recognizers: Vec::new(),
            logger: component_logger("router"),
            queue_capacity: VoiceConfig::default().queue_capacity,
            locales: Vec::new(),
        }
    }

    /// Returns the id of the logical stream for this key, creating it on
    /// first sight.
    pub async fn resolve(
        &self,
        ssrc: u32,
        call_id: &str,
        channel_id: &str,
    ) -> Result<StreamId, RouterError> {
        let key = StreamKey::new(ssrc, call_id, channel_id);
        let handle = self.handle_for(key, None).await?;
        Ok(handle.stream.id.clone())
    }

    /// Routes one frame to its stream's queue without blocking.
    pub async fn ingest(
        &self,
        ssrc: u32,
        call_id: &str,
        channel_id: &str,
        frame: CompressedFrame,
    ) -> Result<Ingest, RouterError> {
        let key = StreamKey::new(ssrc, call_id, channel_id);
        let handle = match self.handle_for(key, Some(&frame)).await {
            Ok(h) => h,
            Err(e) => {
                log_warn!(self.inner.logger, "packet from ssrc {} dropped: {}", ssrc, e);
                return Err(e);
            }
        };

        let id = handle.stream.id.clone();
        let tx = handle.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(RouterError::Closed);
        };
        match tx.try_send(frame) {
            Ok(()) => Ok(Ingest::Queued(id)),
            Err(TrySendError::Full(frame)) => {
                let n = handle.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log_warn!(
                    self.inner.logger,
                    "{}: queue full, dropped frame at {} ({} dropped)",
                    id,
                    frame.sample_index,
                    n
                );
                Ok(Ingest::Dropped(id))
            }
            Err(TrySendError::Closed(_)) => Err(RouterError::Closed),
        }
    }

    /// Parses wire bytes and ingests the packet. A malformed packet is
    /// logged and dropped.
    pub async fn ingest_raw(
        &self,
        call_id: &str,
        channel_id: &str,
        data: &[u8],
    ) -> Result<Ingest, RouterError> {
        let packet = match Packet::parse(data) {
            Ok(p) => p,
            Err(e) => {
                log_warn!(self.inner.logger, "malformed packet ({} bytes): {}", data.len(), e);
                return Err(e.into());
            }
        };
        let ssrc = packet.ssrc;
        self.ingest(ssrc, call_id, channel_id, packet.into_frame()).await
    }

    async fn handle_for(
        &self,
        key: StreamKey,
        first: Option<&CompressedFrame>,
    ) -> Result<Arc<StreamHandle>, RouterError> {
        if self.inner.cancel.is_cancelled() {
            return Err(RouterError::Closed);
        }

        let existing = self.inner.slots.read().get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self.inner.slots.write().entry(key.clone()).or_default().clone(),
        };

        let handle = slot
            .get_or_try_init(|| self.create_stream(key, first))
            .await?;
        Ok(handle.clone())
    }

    async fn create_stream(
        &self,
        key: StreamKey,
        first: Option<&CompressedFrame>,
    ) -> Result<Arc<StreamHandle>, RouterError> {
        let inner = &self.inner;
        let speaker = inner
            .resolver
            .resolve(&key)
            .await
            .map_err(RouterError::Resolve)?;

        let stream = LogicalStream {
            id: StreamId::generate(),
            key,
            speaker,
            sequence_offset: first.map_or(0, |f| f.sequence),
            sample_offset: first.map_or(0, |f| f.sample_index),
            created_at: EpochMillis::now(),
        };

        let writer = inner.sink.create(&stream).map_err(RouterError::Sink)?;
        let serial = inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let encoder = match GapEncoder::new(writer, serial) {
            Ok(enc) => enc,
            Err(e) => {
                let _ = inner.sink.discard(&stream.id);
                return Err(e.into());
            }
        };

        let sessions =
            SessionSet::start(&inner.recognizers, &stream, &inner.locales, &inner.logger).await;
        let session_count = sessions.len();

        let (tx, rx) = mpsc::channel(inner.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let worker = StreamWorker {
            stream: stream.clone(),
            encoder: Some(encoder),
            sessions,
            store: inner.store.clone(),
            sink: inner.sink.clone(),
            logger: inner.logger.clone(),
            dropped: dropped.clone(),
            error: None,
        };
        let task = tokio::spawn(worker.run(rx, inner.cancel.child_token()));

        log_info!(
            inner.logger,
            "{}: stream created for ssrc {} in {}/{} (speaker {}, {} recognition sessions)",
            stream.id,
            stream.key.ssrc,
            stream.key.call_id,
            stream.key.channel_id,
            stream.speaker.as_deref().unwrap_or("unknown"),
            session_count
        );

        Ok(Arc::new(StreamHandle {
            stream,
            tx: Mutex::new(Some(tx)),
            dropped,
            task: Mutex::new(Some(task)),
        }))
    }

    /// Closes every stream of `call_id` and waits for their containers.
    ///
    /// A stream still being created when the call is left is waited for and
    /// reported like the others.
    pub async fn leave_call(&self, call_id: &str) -> Vec<StreamReport> {
        let taken = {
            let mut slots = self.inner.slots.write();
            let keys: Vec<StreamKey> = slots
                .keys()
                .filter(|k| k.call_id == call_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| slots.remove(k)).collect::<Vec<_>>()
        };
        self.finish(taken).await
    }

    /// Cancels every stream, finalises their containers and refuses
    /// further packets.
    pub async fn shutdown(&self) -> Vec<StreamReport> {
        self.inner.cancel.cancel();
        let taken = {
            let mut slots = self.inner.slots.write();
            slots.drain().map(|(_, slot)| slot).collect::<Vec<_>>()
        };
        self.finish(taken).await
    }

    async fn finish(&self, slots: Vec<Slot>) -> Vec<StreamReport> {
        let mut reports = Vec::with_capacity(slots.len());
        for slot in slots {
            // waits out a creation in flight; a failed one leaves nothing
            let Ok(handle) = slot.get_or_try_init(|| async { Err(()) }).await else {
                continue;
            };
            // dropping the sender lets the task drain and finalise
            handle.tx.lock().take();
            let task = handle.task.lock().take();
            let Some(task) = task else { continue };
            match task.await {
                Ok(report) => reports.push(report),
                Err(e) => log_error!(self.inner.logger, "{}: stream task failed: {}", handle.stream.id, e),
            }
        }
        reports
    }

    /// Streams currently registered.
    pub fn streams(&self) -> Vec<LogicalStream> {
        let slots = self.inner.slots.read();
        let mut streams: Vec<_> = slots
            .values()
            .filter_map(|slot| slot.get().map(|h| h.stream.clone()))
            .collect();
        streams.sort_by(|a, b| a.id.cmp(&b.id));
        streams
    }

    /// Looks up a registered stream by id.
    pub fn stream(&self, id: &StreamId) -> Option<LogicalStream> {
        self.find(id).map(|h| h.stream.clone())
    }

    /// Frames dropped at ingest for `id`.
    pub fn dropped_frames(&self, id: &StreamId) -> Option<u64> {
        self.find(id).map(|h| h.dropped.load(Ordering::Relaxed))
    }

    fn find(&self, id: &StreamId) -> Option<Arc<StreamHandle>> {
        let slots = self.inner.slots.read();
        slots
            .values()
            .filter_map(|slot| slot.get())
            .find(|h| &h.stream.id == id)
            .cloned()
    }
}

/// Per-stream task state. Owns the container writer exclusively.
struct StreamWorker {
    stream: LogicalStream,
    encoder: Option<GapEncoder<Box<dyn Write + Send>>>,
    sessions: SessionSet,
    store: Option<Arc<dyn FrameStore>>,
    sink: Arc<dyn ContainerSink>,
    logger: Arc<dyn Logger>,
    dropped: Arc<AtomicU64>,
    error: Option<String>,
}

impl StreamWorker {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<CompressedFrame>,
        cancel: CancellationToken,
    ) -> StreamReport {
        let mut stats = EncoderStats::default();
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => match frame {
                    Some(frame) => self.process(frame, &mut stats).await,
                    None => break,
                },
                _ = cancel.cancelled() => {
                    // take what is already queued, accept nothing new
                    rx.close();
                    while let Some(frame) = rx.recv().await {
                        self.process(frame, &mut stats).await;
                    }
                    break;
                }
            }
        }
        self.sessions.finish(&self.logger).await;
        self.finalize(stats)
    }

    async fn process(&mut self, frame: CompressedFrame, stats: &mut EncoderStats) {
        if let Some(store) = &self.store {
            if let Err(e) = store.append(&self.stream.id, &frame).await {
                log_warn!(self.logger, "{}: store append failed: {}", self.stream.id, e);
            }
        }

        self.sessions.push(&frame, &self.logger).await;

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let result = encoder.write_frame(&frame);
        *stats = encoder.stats();
        match result {
            Ok(0) => {}
            Ok(n) => log_debug!(
                self.logger,
                "{}: filled gap before {} with {} silence frames",
                self.stream.id,
                frame.sample_index,
                n
            ),
            Err(EncodeError::Stale { sample_index, last }) => log_debug!(
                self.logger,
                "{}: skipped stale frame {} (last {})",
                self.stream.id,
                sample_index,
                last
            ),
            Err(e) => {
                log_error!(self.logger, "{}: container output failed: {}", self.stream.id, e);
                self.error = Some(e.to_string());
                self.encoder = None;
                if let Err(e) = self.sink.discard(&self.stream.id) {
                    log_warn!(self.logger, "{}: discard failed: {}", self.stream.id, e);
                }
            }
        }
    }

    fn finalize(mut self, mut stats: EncoderStats) -> StreamReport {
        let mut duration = std::time::Duration::ZERO;
        let mut committed = false;

        if let Some(mut encoder) = self.encoder.take() {
            stats = encoder.stats();
            match encoder.close() {
                Ok(()) => {
                    duration = encoder.duration();
                    match self.sink.commit(&self.stream.id, encoder.into_inner()) {
                        Ok(()) => committed = true,
                        Err(e) => {
                            self.error = Some(e.to_string());
                            let _ = self.sink.discard(&self.stream.id);
                        }
                    }
                }
                Err(e) => {
                    self.error = Some(e.to_string());
                    drop(encoder);
                    let _ = self.sink.discard(&self.stream.id);
                }
            }
        }

        let dropped_frames = self.dropped.load(Ordering::Relaxed);
        if committed {
            log_info!(
                self.logger,
                "{}: container finalised, {} frames, {} silence, {:?}",
                self.stream.id,
                stats.frames_written,
                stats.silence_frames,
                duration
            );
        } else {
            log_error!(
                self.logger,
                "{}: container discarded: {}",
                self.stream.id,
                self.error.as_deref().unwrap_or("unknown error")
            );
        }

        StreamReport {
            stream: self.stream,
            stats,
            dropped_frames,
            duration,
            committed,
            error: self.error,
        }
    }
}
