//! 20 ms PCM frames.

use std::time::Duration;

use super::Format;
use crate::opusrt::{CHANNELS, FRAME_SAMPLES};

/// Interleaved samples in one full stereo frame.
const FULL_LEN: usize = FRAME_SAMPLES as usize * CHANNELS;

/// Converts little-endian byte pairs to samples. A trailing odd byte is dropped.
pub fn pcm_bytes_to_i16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]))
        .collect()
}

/// Interleaved 48 kHz stereo samples, normally 960 x 2 of them.
///
/// Only the final frame of a stream may be shorter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcmFrame {
    samples: Vec<i16>,
}

impl PcmFrame {
    /// Wraps interleaved samples.
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A full frame of digital silence.
    pub fn silence() -> Self {
        Self {
            samples: vec![0; FULL_LEN],
        }
    }

    /// Builds a frame from little-endian PCM bytes.
    pub fn from_le_bytes(data: &[u8]) -> Self {
        Self {
            samples: pcm_bytes_to_i16(data),
        }
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of interleaved samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when the frame holds exactly 960 stereo samples.
    pub fn is_complete(&self) -> bool {
        self.samples.len() == FULL_LEN
    }

    /// Returns a full-length copy, zero-padding a short frame.
    pub fn padded(&self) -> Self {
        let mut samples = self.samples.clone();
        samples.resize(FULL_LEN.max(samples.len()), 0);
        Self { samples }
    }

    /// Serializes back to little-endian bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Playback duration of the samples held.
    pub fn duration(&self) -> Duration {
        Format::STEREO_48K.duration(self.samples.len() * 2)
    }
}
