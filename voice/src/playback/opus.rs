//! Opus frame encoder backed by libopus.

use opus::{Application, Bitrate, Channels, Encoder};
use voicegate_audio::opusrt::SAMPLE_RATE;
use voicegate_audio::pcm::PcmFrame;

use crate::error::PlaybackError;

use super::FrameEncoder;

/// Largest packet libopus will produce for one frame.
const MAX_PACKET: usize = 4000;

/// 48 kHz stereo Opus encoder for 20 ms frames.
pub struct OpusFrameEncoder {
    encoder: Encoder,
}

impl OpusFrameEncoder {
    /// Creates a VoIP-tuned encoder at `bitrate` bits per second.
    pub fn new(bitrate: i32) -> Result<Self, PlaybackError> {
        let mut encoder = Encoder::new(SAMPLE_RATE, Channels::Stereo, Application::Voip)
            .map_err(|e| PlaybackError::Encode(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::Bits(bitrate))
            .map_err(|e| PlaybackError::Encode(format!("bitrate {}: {}", bitrate, e)))?;
        Ok(Self { encoder })
    }
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, frame: &PcmFrame) -> Result<Vec<u8>, PlaybackError> {
        self.encoder
            .encode_vec(frame.samples(), MAX_PACKET)
            .map_err(|e| PlaybackError::Encode(e.to_string()))
    }
}
