use std::fmt;

use bytes::Bytes;

use crate::constants::{
    CHECKSUM_SIZE, HEADER_SIZE, MAX_READ_PAYLOAD, MIN_FRAME_SIZE, SYNC1, SYNC2,
};
use crate::error::ProtocolError;

/// 16-bit truncated sum of `bytes`, as carried in the last two bytes of
/// every DP5 frame.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// One DP5 frame, minus the wire framing: the PID pair naming the
/// command or response, and its payload.
///
/// Wire layout:
///
/// ```text
/// offset 0-1: 0xF5 0xFA                 (sync)
/// offset 2:   pid1
/// offset 3:   pid2
/// offset 4-5: payload length (u16, big-endian)
/// offset 6..: payload
/// last 2:     checksum (u16, big-endian) over all preceding bytes
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    pub pid1: u8,
    pub pid2: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(pid1: u8, pid2: u8, payload: impl Into<Bytes>) -> Self {
        Packet {
            pid1,
            pid2,
            payload: payload.into(),
        }
    }

    pub fn pid(&self) -> (u8, u8) {
        (self.pid1, self.pid2)
    }

    /// Encode the full wire frame: header, payload, checksum.
    ///
    /// The payload length must fit the 16-bit length field; the command
    /// dispatcher validates size limits before encoding.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len();
        debug_assert!(len <= u16::MAX as usize);

        let mut frame = Vec::with_capacity(HEADER_SIZE + len + CHECKSUM_SIZE);
        frame.push(SYNC1);
        frame.push(SYNC2);
        frame.push(self.pid1);
        frame.push(self.pid2);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame.extend_from_slice(&checksum(&frame).to_be_bytes());
        frame
    }
}

/// Convenience wrapper building the frame directly from its parts.
pub fn encode(pid1: u8, pid2: u8, payload: &[u8]) -> Vec<u8> {
    Packet::new(pid1, pid2, Bytes::copy_from_slice(payload)).encode()
}

impl TryFrom<Bytes> for Packet {
    type Error = ProtocolError;

    fn try_from(raw: Bytes) -> Result<Self, Self::Error> {
        if raw.len() < MIN_FRAME_SIZE {
            return Err(ProtocolError::LengthMismatch {
                expected: MIN_FRAME_SIZE,
                actual: raw.len(),
            });
        }
        let declared = u16::from_be_bytes([raw[4], raw[5]]) as usize;
        if declared > MAX_READ_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: declared,
                max: MAX_READ_PAYLOAD,
            });
        }
        let expected = HEADER_SIZE + declared + CHECKSUM_SIZE;
        if raw.len() != expected {
            return Err(ProtocolError::LengthMismatch {
                expected,
                actual: raw.len(),
            });
        }

        let body_end = HEADER_SIZE + declared;
        let computed = checksum(&raw[..body_end]);
        let received = u16::from_be_bytes([raw[body_end], raw[body_end + 1]]);
        if computed != received {
            return Err(ProtocolError::ChecksumMismatch { computed, received });
        }

        let mut payload = raw;
        payload.truncate(body_end);
        let pid1 = payload[2];
        let pid2 = payload[3];
        Ok(Packet {
            pid1,
            pid2,
            payload: payload.slice(HEADER_SIZE..),
        })
    }
}

impl TryFrom<Vec<u8>> for Packet {
    type Error = ProtocolError;

    fn try_from(raw: Vec<u8>) -> Result<Self, Self::Error> {
        Packet::try_from(Bytes::from(raw))
    }
}

impl From<Packet> for Bytes {
    fn from(packet: Packet) -> Self {
        Bytes::from(packet.encode())
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("pid1", &format_args!("{:#04x}", self.pid1))
            .field("pid2", &format_args!("{:#04x}", self.pid2))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_truncated_byte_sum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 6);
        assert_eq!(checksum(&[0xFF; 300]), (300 * 0xFF_usize % 65536) as u16);
    }

    #[test]
    fn encode_empty_payload_frame() {
        // Clear-spectrum request: F5 FA F0 01 00 00, checksum 0x02E0
        let frame = encode(0xF0, 0x01, &[]);
        assert_eq!(frame, vec![0xF5, 0xFA, 0xF0, 0x01, 0x00, 0x00, 0x02, 0xE0]);
    }

    #[test]
    fn corrupted_sync_byte_fails_the_checksum() {
        // The checksum covers the sync bytes, so a corrupted sync
        // surfaces as a checksum failure rather than silently decoding.
        let mut frame = encode(0x01, 0x01, &[]);
        frame[0] = 0xF6;
        assert!(matches!(
            Packet::try_from(frame),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }
}
