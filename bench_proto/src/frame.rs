//! Frame layer: start byte, length, payload, CRC16, terminator.

use crate::crc::crc16;
use crate::messages::Message;
use thiserror::Error;

const START_SHORT: u8 = 0x02;
const START_LONG: u8 = 0x03;
const TERMINATOR: u8 = 0x03;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    #[error("crc mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },
    #[error("missing frame terminator")]
    MissingTerminator,
    #[error("empty payload")]
    EmptyPayload,
    #[error("truncated payload for command {0}")]
    TruncatedPayload(u8),
    #[error("unsupported command id {0}")]
    UnsupportedId(u8),
}

/// Wrap a payload in a VESC frame. Short form for payloads up to 255 bytes,
/// long form (16-bit length) above that.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let crc = crc16(payload);
    let mut out = Vec::with_capacity(payload.len() + 6);
    if payload.len() <= u8::MAX as usize {
        out.push(START_SHORT);
        out.push(payload.len() as u8);
    } else {
        out.push(START_LONG);
        out.push((payload.len() >> 8) as u8);
        out.push((payload.len() & 0xFF) as u8);
    }
    out.extend_from_slice(payload);
    out.push((crc >> 8) as u8);
    out.push((crc & 0xFF) as u8);
    out.push(TERMINATOR);
    out
}

/// Try to extract one message from `buf`.
///
/// Returns the decoded message (when a complete, valid frame is present)
/// together with the number of bytes consumed, including any garbage
/// skipped before the start byte. `Ok((None, n))` means no complete frame
/// yet; callers keep the unconsumed remainder. A structurally complete but
/// invalid frame is an error; callers discard their buffer and resync on
/// the next read.
pub fn decode(buf: &[u8]) -> Result<(Option<Message>, usize), ProtoError> {
    // Skip leading bytes that cannot start a frame.
    let Some(start) = buf.iter().position(|&b| b == START_SHORT || b == START_LONG) else {
        return Ok((None, buf.len()));
    };
    let frame = &buf[start..];
    let (len, header) = match frame[0] {
        START_SHORT => {
            if frame.len() < 2 {
                return Ok((None, start));
            }
            (usize::from(frame[1]), 2)
        }
        _ => {
            if frame.len() < 3 {
                return Ok((None, start));
            }
            ((usize::from(frame[1]) << 8) | usize::from(frame[2]), 3)
        }
    };
    let total = header + len + 3; // payload + crc(2) + terminator
    if frame.len() < total {
        return Ok((None, start));
    }
    let payload = &frame[header..header + len];
    let expected = (u16::from(frame[header + len]) << 8) | u16::from(frame[header + len + 1]);
    let actual = crc16(payload);
    if actual != expected {
        return Err(ProtoError::CrcMismatch { expected, actual });
    }
    if frame[header + len + 2] != TERMINATOR {
        return Err(ProtoError::MissingTerminator);
    }
    let msg = Message::from_payload(payload)?;
    Ok((Some(msg), start + total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Command, encode};

    #[test]
    fn short_frame_layout() {
        let f = encode_frame(&[0x04]);
        assert_eq!(f[0], 0x02);
        assert_eq!(f[1], 1);
        assert_eq!(f[2], 0x04);
        assert_eq!(*f.last().unwrap(), 0x03);
        assert_eq!(f.len(), 6);
    }

    #[test]
    fn long_frame_used_above_255_bytes() {
        let payload = vec![0u8; 300];
        let f = encode_frame(&payload);
        assert_eq!(f[0], 0x03);
        assert_eq!(((usize::from(f[1]) << 8) | usize::from(f[2])), 300);
        assert_eq!(f.len(), 300 + 6);
    }

    #[test]
    fn decode_skips_leading_garbage() {
        let mut buf = vec![0x00, 0xFF, 0x41];
        buf.extend_from_slice(&encode(&Command::SetRpm(7000)));
        let (msg, consumed) = decode(&buf).unwrap();
        assert!(matches!(msg, Some(Message::SetRpm(7000))));
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn incomplete_frame_reports_no_message() {
        let full = encode(&Command::SetRpm(1234));
        let (msg, consumed) = decode(&full[..4]).unwrap();
        assert!(msg.is_none());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn corrupt_crc_is_an_error() {
        let mut f = encode(&Command::SetDutyCycle(0.5));
        let n = f.len();
        f[n - 2] ^= 0xFF;
        assert!(matches!(decode(&f), Err(ProtoError::CrcMismatch { .. })));
    }

    #[test]
    fn empty_buffer_consumes_nothing_useful() {
        let (msg, consumed) = decode(&[]).unwrap();
        assert!(msg.is_none());
        assert_eq!(consumed, 0);
    }
}
