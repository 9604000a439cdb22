//! Compressed frame type.

use super::timestamp::{EpochMillis, sample_delta};

/// One encoded audio frame as received from the transport.
///
/// The payload is opaque: it is never decoded on the ingest path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedFrame {
    /// Wrapping 16-bit sequence number. Only a hint.
    pub sequence: u16,
    /// Position on the 48 kHz timeline, wrapping at 32 bits.
    pub sample_index: u32,
    /// Opaque compressed bytes.
    pub payload: Vec<u8>,
    /// Wall-clock capture time.
    pub arrival: EpochMillis,
}

impl CompressedFrame {
    /// Creates a frame stamped with the current time.
    pub fn new(sequence: u16, sample_index: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            sample_index,
            payload: payload.into(),
            arrival: EpochMillis::now(),
        }
    }

    /// Overrides the arrival time.
    pub fn with_arrival(mut self, arrival: EpochMillis) -> Self {
        self.arrival = arrival;
        self
    }

    /// Signed sample distance from `earlier` to this frame.
    pub fn samples_since(&self, earlier: &CompressedFrame) -> i64 {
        sample_delta(earlier.sample_index, self.sample_index)
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl AsRef<[u8]> for CompressedFrame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}
