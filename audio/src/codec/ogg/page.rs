//! Ogg page structures.

use std::io;

/// Size of the fixed part of a page header.
pub const PAGE_HEADER_SIZE: usize = 27;

/// Capture pattern at the start of every page.
pub const PAGE_MAGIC: &[u8] = b"OggS";

/// Largest packet a single page can carry (255 lacing values of 255 bytes).
pub const MAX_PAGE_BODY: usize = 255 * 255;

/// CRC lookup table for Ogg (polynomial 0x04c11db7, unreflected).
static CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            if r & 0x80000000 != 0 {
                r = (r << 1) ^ 0x04c11db7;
            } else {
                r <<= 1;
            }
            j += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
};

/// Calculates the Ogg CRC of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc << 8) ^ CRC_TABLE[((crc >> 24) as u8 ^ byte) as usize];
    }
    crc
}

/// Builds the lacing values for a single packet of `len` bytes.
///
/// A packet whose length is a multiple of 255 ends with a zero lacing value.
pub fn lacing(len: usize) -> Vec<u8> {
    let mut table = Vec::with_capacity(len / 255 + 1);
    let mut remaining = len;
    while remaining >= 255 {
        table.push(255u8);
        remaining -= 255;
    }
    table.push(remaining as u8);
    table
}

/// Ogg page header and body.
#[derive(Debug, Clone)]
pub struct Page {
    /// Version (always 0)
    pub version: u8,
    /// Header type flags
    pub header_type: u8,
    /// Absolute granule position
    pub granule_position: i64,
    /// Stream serial number
    pub serial: u32,
    /// Page sequence number
    pub sequence: u32,
    /// CRC checksum
    pub checksum: u32,
    /// Number of segments
    pub segments: u8,
    /// Segment table
    pub segment_table: Vec<u8>,
    /// Page body data
    pub body: Vec<u8>,
}

impl Page {
    /// Creates a new empty page.
    pub fn new() -> Self {
        Self {
            version: 0,
            header_type: 0,
            granule_position: 0,
            serial: 0,
            sequence: 0,
            checksum: 0,
            segments: 0,
            segment_table: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a page carrying exactly one complete packet.
    pub fn with_packet(
        packet: &[u8],
        header_type: u8,
        granule_position: i64,
        serial: u32,
        sequence: u32,
    ) -> io::Result<Self> {
        if packet.len() > MAX_PAGE_BODY - 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("ogg: packet of {} bytes does not fit a page", packet.len()),
            ));
        }
        let segment_table = lacing(packet.len());
        Ok(Self {
            version: 0,
            header_type,
            granule_position,
            serial,
            sequence,
            checksum: 0,
            segments: segment_table.len() as u8,
            segment_table,
            body: packet.to_vec(),
        })
    }

    /// Returns true if this is a beginning-of-stream page.
    pub fn is_bos(&self) -> bool {
        (self.header_type & flags::BOS) != 0
    }

    /// Returns true if this is an end-of-stream page.
    pub fn is_eos(&self) -> bool {
        (self.header_type & flags::EOS) != 0
    }

    /// Returns true if this is a continuation page.
    pub fn is_continuation(&self) -> bool {
        (self.header_type & flags::CONTINUATION) != 0
    }

    /// Serializes the page, computing the CRC over the whole page
    /// with the checksum field zeroed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(PAGE_HEADER_SIZE + self.segment_table.len() + self.body.len());
        out.extend_from_slice(PAGE_MAGIC);
        out.push(self.version);
        out.push(self.header_type);
        out.extend_from_slice(&self.granule_position.to_le_bytes());
        out.extend_from_slice(&self.serial.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.push(self.segments);
        out.extend_from_slice(&self.segment_table);
        out.extend_from_slice(&self.body);

        let crc = crc32(&out);
        out[22..26].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Recomputes the CRC and compares it with the stored checksum.
    pub fn verify_checksum(&self) -> bool {
        let bytes = self.to_bytes();
        let crc = u32::from_le_bytes([bytes[22], bytes[23], bytes[24], bytes[25]]);
        crc == self.checksum
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// Header type flags.
pub mod flags {
    /// Continuation of previous packet.
    pub const CONTINUATION: u8 = 0x01;
    /// Beginning of stream.
    pub const BOS: u8 = 0x02;
    /// End of stream.
    pub const EOS: u8 = 0x04;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_new() {
        let page = Page::new();
        assert_eq!(page.version, 0);
        assert_eq!(page.header_type, 0);
        assert_eq!(page.granule_position, 0);
        assert!(page.segment_table.is_empty());
        assert!(page.body.is_empty());
    }

    #[test]
    fn test_page_flags() {
        let mut page = Page::new();
        assert!(!page.is_bos());
        assert!(!page.is_eos());
        assert!(!page.is_continuation());

        page.header_type = flags::BOS | flags::EOS | flags::CONTINUATION;
        assert!(page.is_bos());
        assert!(page.is_eos());
        assert!(page.is_continuation());
    }

    #[test]
    fn test_lacing() {
        assert_eq!(lacing(0), vec![0]);
        assert_eq!(lacing(3), vec![3]);
        assert_eq!(lacing(255), vec![255, 0]);
        assert_eq!(lacing(300), vec![255, 45]);
        assert_eq!(lacing(510), vec![255, 255, 0]);
    }

    #[test]
    fn test_with_packet_too_large() {
        let big = vec![0u8; MAX_PAGE_BODY];
        assert!(Page::with_packet(&big, 0, 0, 1, 0).is_err());
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_known_vector() {
        // CRC-32/POSIX check value with the final xor removed.
        assert_eq!(crc32(b"123456789"), 0x89a1_897f);
    }

    #[test]
    fn test_to_bytes_layout() {
        let page = Page::with_packet(&[1, 2, 3], flags::BOS, 960, 0xDEADBEEF, 7).unwrap();
        let bytes = page.to_bytes();

        assert_eq!(&bytes[..4], b"OggS");
        assert_eq!(bytes[4], 0);
        assert_eq!(bytes[5], flags::BOS);
        assert_eq!(i64::from_le_bytes(bytes[6..14].try_into().unwrap()), 960);
        assert_eq!(u32::from_le_bytes(bytes[14..18].try_into().unwrap()), 0xDEADBEEF);
        assert_eq!(u32::from_le_bytes(bytes[18..22].try_into().unwrap()), 7);
        assert_eq!(bytes[26], 1);
        assert_eq!(bytes[27], 3);
        assert_eq!(&bytes[28..], &[1, 2, 3]);
    }

    #[test]
    fn test_verify_checksum() {
        let mut page = Page::with_packet(b"hello", 0, 0, 1, 0).unwrap();
        let bytes = page.to_bytes();
        page.checksum = u32::from_le_bytes(bytes[22..26].try_into().unwrap());
        assert!(page.verify_checksum());

        page.body[0] ^= 0xff;
        assert!(!page.verify_checksum());
    }
}
