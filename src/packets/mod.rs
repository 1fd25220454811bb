//! Framing-level packet types for the bootloader serial protocol.
//!
//! Every frame starts with [`START_BYTE`] followed by a type byte. The three
//! control frames and ping are two bytes long with no checksum; command, data
//! and ping-response frames carry a little-endian length and CRC-16 header
//! ahead of their payload.

use crate::crc::framing_crc;
use crate::encode::Encode;

pub mod command;
pub mod response;
pub mod status;

/// First byte of every framing packet.
pub const START_BYTE: u8 = 0x5A;

/// Framing packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Ack = 0xA1,
    Nak = 0xA2,
    AckAbort = 0xA3,
    Command = 0xA4,
    Data = 0xA5,
    Ping = 0xA6,
    PingResponse = 0xA7,
}

impl FrameType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0xA1 => Self::Ack,
            0xA2 => Self::Nak,
            0xA3 => Self::AckAbort,
            0xA4 => Self::Command,
            0xA5 => Self::Data,
            0xA6 => Self::Ping,
            0xA7 => Self::PingResponse,
            _ => return None,
        })
    }
}

/// Wraps a payload in a long framing packet.
///
/// The CRC covers the 4-byte header and the payload, but not the CRC field
/// itself.
pub fn framing_packet(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let length = payload.len() as u16;
    let header = [
        START_BYTE,
        frame_type as u8,
        (length & 0xFF) as u8,
        (length >> 8) as u8,
    ];
    let crc = framing_crc(&header, payload);

    let mut frame = Vec::with_capacity(6 + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// The two-byte ping frame sent by the host.
#[derive(Debug, Clone, Copy)]
pub struct PingPacket;

impl Encode for PingPacket {
    fn encode(&self) -> Vec<u8> {
        vec![START_BYTE, FrameType::Ping as u8]
    }
}

/// The two-byte acknowledgement the host returns for every command or data
/// frame it receives.
#[derive(Debug, Clone, Copy)]
pub struct AckPacket;

impl Encode for AckPacket {
    fn encode(&self) -> Vec<u8> {
        vec![START_BYTE, FrameType::Ack as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::BLHOST_CRC16;

    #[test]
    fn ping_frame_bytes() {
        assert_eq!(PingPacket.encode(), vec![0x5A, 0xA6]);
    }

    #[test]
    fn ack_frame_bytes() {
        assert_eq!(AckPacket.encode(), vec![0x5A, 0xA1]);
    }

    #[test]
    fn framing_packet_layout() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let frame = framing_packet(FrameType::Data, &payload);

        assert_eq!(frame.len(), 10);
        assert_eq!(&frame[..4], &[0x5A, 0xA5, 0x04, 0x00]);
        assert_eq!(&frame[6..], &payload);

        // The CRC skips its own field.
        let mut covered = frame[..4].to_vec();
        covered.extend_from_slice(&frame[6..]);
        let crc = u16::from_le_bytes([frame[4], frame[5]]);
        assert_eq!(crc, BLHOST_CRC16.checksum(&covered));
    }
}
