//! Incremental parser for the inbound byte stream.
//!
//! Transports deliver bytes in whatever chunks the wire happens to produce, so
//! the parser accumulates them and carves out whole frames: the two-byte
//! control frames immediately, the long frames once their length and CRC
//! fields have arrived and the checksum holds up. Frames with a bad CRC are
//! dropped; the target will NAK or retransmit on its own terms.

use log::{error, trace, warn};

use crate::crc::{framing_crc, BLHOST_CRC16};
use crate::packets::{FrameType, START_BYTE};

/// Reassembles framing packets from an arbitrary chunking of the byte stream.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    expected_len: Option<usize>,
    expected_crc: Option<u16>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every frame completed by them, in arrival
    /// order. Control frames are emitted as their two raw bytes; long frames
    /// as the whole frame including header and CRC.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut packets = Vec::new();
        loop {
            // Resynchronize on the start byte.
            let skip = self
                .buffer
                .iter()
                .position(|&byte| byte == START_BYTE)
                .unwrap_or(self.buffer.len());
            if skip > 0 {
                trace!("discarding {skip} byte(s) while searching for start byte");
                self.buffer.drain(..skip);
            }

            if self.buffer.len() < 2 {
                return packets;
            }

            match FrameType::from_u8(self.buffer[1]) {
                Some(FrameType::Ack) | Some(FrameType::Nak) | Some(FrameType::AckAbort) => {
                    packets.push(self.buffer.drain(..2).collect());
                    continue;
                }
                Some(FrameType::Ping) => {
                    // Only the host sends pings; someone else is on the bus.
                    warn!("received ping frame");
                    self.buffer.drain(..2);
                    continue;
                }
                Some(FrameType::PingResponse) => {
                    self.expected_len = Some(10);
                    if self.buffer.len() >= 10 && self.expected_crc.is_none() {
                        self.expected_crc =
                            Some(u16::from_le_bytes([self.buffer[8], self.buffer[9]]));
                    }
                }
                Some(FrameType::Command) | Some(FrameType::Data) => {
                    if self.buffer.len() >= 4 && self.expected_len.is_none() {
                        let length = u16::from_le_bytes([self.buffer[2], self.buffer[3]]);
                        self.expected_len = Some(6 + length as usize);
                    }
                    if self.buffer.len() >= 6 && self.expected_crc.is_none() {
                        self.expected_crc =
                            Some(u16::from_le_bytes([self.buffer[4], self.buffer[5]]));
                    }
                }
                None => {
                    error!("unknown frame type: {:#04x}", self.buffer[1]);
                    self.buffer.drain(..2);
                    self.expected_len = None;
                    self.expected_crc = None;
                    continue;
                }
            }

            match (self.expected_len, self.expected_crc) {
                (Some(expected_len), Some(expected_crc)) if self.buffer.len() >= expected_len => {
                    let crc = if self.buffer[1] == FrameType::PingResponse as u8 {
                        BLHOST_CRC16.checksum(&self.buffer[..8])
                    } else {
                        framing_crc(&self.buffer[..4], &self.buffer[6..expected_len])
                    };

                    let frame: Vec<u8> = self.buffer.drain(..expected_len).collect();
                    self.expected_len = None;
                    self.expected_crc = None;

                    if crc == expected_crc {
                        packets.push(frame);
                    } else {
                        error!("frame CRC mismatch: {crc:#06X} != {expected_crc:#06X}");
                    }
                }
                // Need more bytes.
                _ => return packets,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameParser;
    use crate::encode::Encode;
    use crate::packets::command::CommandPacket;
    use crate::packets::framing_packet;
    use crate::packets::FrameType;

    #[test]
    fn whole_frame() {
        let frame = CommandPacket::reset().encode();

        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(&frame), vec![frame]);
    }

    #[test]
    fn byte_by_byte() {
        let frame = framing_packet(FrameType::Data, &[0x11, 0x22, 0x33]);

        let mut parser = FrameParser::new();
        let mut packets = Vec::new();
        for &byte in &frame {
            packets.extend(parser.feed(&[byte]));
        }
        assert_eq!(packets, vec![frame]);
    }

    #[test]
    fn garbage_prefix_is_skipped() {
        let frame = framing_packet(FrameType::Data, &[0xAA]);
        let mut stream = vec![0x00, 0x13, 0x37];
        stream.extend_from_slice(&frame);

        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(&stream), vec![frame]);
    }

    #[test]
    fn control_frame_between_long_frames() {
        let first = framing_packet(FrameType::Data, &[0x01]);
        let second = framing_packet(FrameType::Data, &[0x02]);
        let mut stream = first.clone();
        stream.extend_from_slice(&[0x5A, 0xA1]);
        stream.extend_from_slice(&second);

        let mut parser = FrameParser::new();
        assert_eq!(
            parser.feed(&stream),
            vec![first, vec![0x5A, 0xA1], second]
        );
    }

    #[test]
    fn corrupted_frame_is_dropped_and_parser_recovers() {
        let mut corrupted = framing_packet(FrameType::Data, &[0x01, 0x02, 0x03]);
        corrupted[7] ^= 0xFF;

        let mut parser = FrameParser::new();
        assert!(parser.feed(&corrupted).is_empty());

        // A valid ACK right behind the bad frame still comes through.
        assert_eq!(parser.feed(&[0x5A, 0xA1]), vec![vec![0x5A, 0xA1]]);
    }

    #[test]
    fn unknown_type_is_dropped() {
        let frame = framing_packet(FrameType::Data, &[0x55]);
        let mut stream = vec![0x5A, 0x42];
        stream.extend_from_slice(&frame);

        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(&stream), vec![frame]);
    }

    #[test]
    fn ping_response_frame() {
        // start, type, bugfix, minor, major, name, options, crc
        let mut frame = vec![0x5A, 0xA7, 0x00, 0x02, 0x01, b'P', 0x00, 0x00];
        let crc = crate::crc::BLHOST_CRC16.checksum(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(&frame), vec![frame]);
    }

    #[test]
    fn host_directed_ping_is_consumed() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(&[0x5A, 0xA6]).is_empty());
        assert_eq!(parser.feed(&[0x5A, 0xA1]), vec![vec![0x5A, 0xA1]]);
    }
}
