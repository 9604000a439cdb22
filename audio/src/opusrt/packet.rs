//! RTP ingress packets (RFC 3550 fixed header).

use thiserror::Error;

use super::frame::CompressedFrame;
use super::timestamp::EpochMillis;

const RTP_VERSION: u8 = 2;
const FIXED_HEADER_SIZE: usize = 12;

/// Errors from parsing a wire packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported rtp version {0}")]
    BadVersion(u8),

    #[error("csrc list truncated")]
    TruncatedCsrc,

    #[error("header extension truncated")]
    TruncatedExtension,

    #[error("invalid padding length {0}")]
    BadPadding(u8),
}

/// A parsed RTP packet carrying one opaque compressed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Creates a packet with the dynamic Opus payload type (120).
    pub fn new(ssrc: u32, sequence: u16, timestamp: u32, payload: Vec<u8>) -> Self {
        Self {
            marker: false,
            payload_type: 120,
            sequence,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            payload,
        }
    }

    /// Parses a packet from wire bytes.
    ///
    /// Header extensions are skipped and padding is stripped.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(PacketError::TooShort(data.len()));
        }

        let version = data[0] >> 6;
        if version != RTP_VERSION {
            return Err(PacketError::BadVersion(version));
        }
        let has_padding = data[0] & 0x20 != 0;
        let has_extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0f) as usize;

        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7f;
        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = FIXED_HEADER_SIZE;
        if data.len() < offset + csrc_count * 4 {
            return Err(PacketError::TruncatedCsrc);
        }
        let csrc = data[offset..offset + csrc_count * 4]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        offset += csrc_count * 4;

        if has_extension {
            if data.len() < offset + 4 {
                return Err(PacketError::TruncatedExtension);
            }
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + words * 4;
            if data.len() < offset {
                return Err(PacketError::TruncatedExtension);
            }
        }

        let mut end = data.len();
        if has_padding {
            let pad = data[end - 1];
            if pad == 0 || (pad as usize) > end - offset {
                return Err(PacketError::BadPadding(pad));
            }
            end -= pad as usize;
        }

        Ok(Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrc,
            payload: data[offset..end].to_vec(),
        })
    }

    /// Serializes the packet without extension or padding.
    pub fn marshal(&self) -> Vec<u8> {
        let csrc_count = self.csrc.len().min(15);
        let mut out = Vec::with_capacity(FIXED_HEADER_SIZE + csrc_count * 4 + self.payload.len());
        out.push((RTP_VERSION << 6) | csrc_count as u8);
        out.push(((self.marker as u8) << 7) | (self.payload_type & 0x7f));
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        for c in &self.csrc[..csrc_count] {
            out.extend_from_slice(&c.to_be_bytes());
        }
        out.extend_from_slice(&self.payload);
        out
    }

    /// Converts into a frame stamped with the current time.
    pub fn into_frame(self) -> CompressedFrame {
        CompressedFrame {
            sequence: self.sequence,
            sample_index: self.timestamp,
            payload: self.payload,
            arrival: EpochMillis::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let data = [
            0x80, 0x78, 0x00, 0x05, 0x00, 0x00, 0x03, 0xc0, 0x00, 0x00, 0x00, 0x2a, 0xf8, 0xff,
            0xfe,
        ];
        let p = Packet::parse(&data).unwrap();
        assert!(!p.marker);
        assert_eq!(p.payload_type, 120);
        assert_eq!(p.sequence, 5);
        assert_eq!(p.timestamp, 960);
        assert_eq!(p.ssrc, 42);
        assert_eq!(p.payload, vec![0xf8, 0xff, 0xfe]);
    }

    #[test]
    fn test_marshal_parse() {
        let mut p = Packet::new(0xdeadbeef, 65535, u32::MAX, vec![1, 2, 3, 4]);
        p.marker = true;
        p.csrc = vec![7, 8];
        assert_eq!(Packet::parse(&p.marshal()).unwrap(), p);
    }

    #[test]
    fn test_parse_extension_and_padding() {
        let mut data = vec![0xb0, 0x78, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
        // extension: profile 0xbede, one word
        data.extend_from_slice(&[0xbe, 0xde, 0x00, 0x01, 0x10, 0xaa, 0x00, 0x00]);
        data.extend_from_slice(&[9, 9]);
        // two bytes of padding
        data.extend_from_slice(&[0x00, 0x02]);

        let p = Packet::parse(&data).unwrap();
        assert_eq!(p.payload, vec![9, 9]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Packet::parse(&[0x80; 4]), Err(PacketError::TooShort(4)));

        let mut bad_version = Packet::new(1, 1, 1, vec![]).marshal();
        bad_version[0] = 0x40;
        assert_eq!(Packet::parse(&bad_version), Err(PacketError::BadVersion(1)));

        let mut csrc = Packet::new(1, 1, 1, vec![]).marshal();
        csrc[0] |= 0x02;
        assert_eq!(Packet::parse(&csrc), Err(PacketError::TruncatedCsrc));

        let mut ext = Packet::new(1, 1, 1, vec![0, 0]).marshal();
        ext[0] |= 0x10;
        assert_eq!(Packet::parse(&ext), Err(PacketError::TruncatedExtension));

        let mut pad = Packet::new(1, 1, 1, vec![1, 9]).marshal();
        pad[0] |= 0x20;
        assert_eq!(Packet::parse(&pad), Err(PacketError::BadPadding(9)));
    }

    #[test]
    fn test_into_frame() {
        let f = Packet::new(5, 10, 1920, vec![0xaa]).into_frame();
        assert_eq!(f.sequence, 10);
        assert_eq!(f.sample_index, 1920);
        assert_eq!(f.payload, vec![0xaa]);
    }
}
