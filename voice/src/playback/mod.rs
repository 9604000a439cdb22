//! Playback: synthesized speech bytes in, paced compressed frames out.
//!
//! [`Transcoder`] turns a compressed byte stream into 20 ms PCM frames
//! through an external decoder process. [`Pacer`] re-encodes those frames
//! and sends them at the frame rate. [`Player`] runs both for one utterance.

mod decoder;
mod pacer;

#[cfg(feature = "opus")]
mod opus;

pub use decoder::Transcoder;
pub use pacer::{FrameEncoder, PacketSender, Pacer, PlayStats};

#[cfg(feature = "opus")]
pub use self::opus::OpusFrameEncoder;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use voicegate_audio::pcm::PcmFrame;

use crate::config::VoiceConfig;
use crate::error::PlaybackError;
use crate::log_warn;
use crate::logger::{Logger, component_logger};

/// Frames produced by a running [`Transcoder`].
pub struct PcmFrames {
    rx: mpsc::Receiver<Result<PcmFrame, PlaybackError>>,
}

impl PcmFrames {
    fn new(rx: mpsc::Receiver<Result<PcmFrame, PlaybackError>>) -> Self {
        Self { rx }
    }

    /// Next frame, or `None` once the decoder has finished cleanly.
    pub async fn next(&mut self) -> Option<Result<PcmFrame, PlaybackError>> {
        self.rx.recv().await
    }

    /// Reads to the end. Fails with the first error.
    pub async fn collect(mut self) -> Result<Vec<PcmFrame>, PlaybackError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next().await {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

/// Speaks one utterance at a time.
pub struct Player {
    transcoder: Transcoder,
    pacer: Pacer,
    logger: Arc<dyn Logger>,
}

impl Player {
    pub fn new(config: &VoiceConfig) -> Self {
        let config = config.clone().normalized();
        Self {
            transcoder: Transcoder::new(config.decoder.clone())
                .with_frame_queue(config.playback.frame_queue),
            pacer: Pacer::new(&config.playback),
            logger: component_logger("player"),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.transcoder = self.transcoder.with_logger(logger.clone());
        self.logger = logger;
        self
    }

    /// Decodes `audio` completely, then paces it out through `sender`.
    ///
    /// A decode failure returns before anything is sent, so the listener
    /// hears silence rather than a cut-off utterance.
    pub async fn speak(
        &self,
        audio: Bytes,
        encoder: &mut dyn FrameEncoder,
        sender: &mut dyn PacketSender,
        cancel: &CancellationToken,
    ) -> Result<PlayStats, PlaybackError> {
        let frames = match self
            .transcoder
            .transcode_with_cancel(audio, cancel.clone())
            .await
        {
            Ok(frames) => frames,
            Err(e) => {
                log_warn!(self.logger, "utterance dropped: {}", e);
                return Err(e);
            }
        };
        self.pacer.play(frames, encoder, sender, cancel).await
    }
}
