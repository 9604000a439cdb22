//! Ogg logical stream state.

/// Per-stream page counters for a single logical bitstream.
#[derive(Debug)]
pub struct StreamState {
    serial: u32,
    sequence: u32,
    granule_position: i64,
}

impl StreamState {
    /// Creates a new stream state.
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            sequence: 0,
            granule_position: 0,
        }
    }

    /// Returns the serial number.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Returns the sequence number the next page will carry.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns the granule position of the last page.
    pub fn granule_position(&self) -> i64 {
        self.granule_position
    }

    /// Advances to `pos`, refusing to move backwards.
    ///
    /// Returns false (and leaves the state untouched) when `pos` is smaller
    /// than the current position.
    pub fn advance_granule(&mut self, pos: i64) -> bool {
        if pos < self.granule_position {
            return false;
        }
        self.granule_position = pos;
        true
    }

    /// Returns the current sequence number and moves to the next one.
    pub fn next_sequence(&mut self) -> u32 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }
}
