//! Device-bound command and data packets.

use super::{framing_packet, FrameType};
use crate::encode::Encode;

/// Command tags understood by this crate.
///
/// The bootloader defines more, but only these are driven by the workflows
/// here; unknown tags in responses are logged by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandTag {
    FlashEraseRegion = 0x02,
    ReadMemory = 0x03,
    WriteMemory = 0x04,
    GetProperty = 0x07,
    Reset = 0x0B,
    ReliableUpdate = 0x12,
}

impl CommandTag {
    /// Matches a command tag carried as a 32-bit response parameter.
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0x02 => Self::FlashEraseRegion,
            0x03 => Self::ReadMemory,
            0x04 => Self::WriteMemory,
            0x07 => Self::GetProperty,
            0x0B => Self::Reset,
            0x12 => Self::ReliableUpdate,
            _ => return None,
        })
    }
}

/// A command packet: tag, flags and a list of 32-bit parameter words, wrapped
/// in a `Command` framing packet.
#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub tag: CommandTag,
    pub flags: u8,
    pub parameters: Vec<u32>,
}

impl CommandPacket {
    pub fn new(tag: CommandTag, flags: u8, parameters: Vec<u32>) -> Self {
        Self {
            tag,
            flags,
            parameters,
        }
    }

    /// Erases `byte_count` bytes of flash starting at `start_address`.
    pub fn flash_erase_region(start_address: u32, byte_count: u32) -> Self {
        Self::new(
            CommandTag::FlashEraseRegion,
            0x00,
            vec![start_address, byte_count],
        )
    }

    /// Requests `byte_count` bytes of memory starting at `start_address`.
    pub fn read_memory(start_address: u32, byte_count: u32) -> Self {
        Self::new(CommandTag::ReadMemory, 0x00, vec![start_address, byte_count])
    }

    /// Announces a write of `byte_count` bytes to `start_address`; the bytes
    /// themselves follow as data packets.
    pub fn write_memory(start_address: u32, byte_count: u32) -> Self {
        Self::new(
            CommandTag::WriteMemory,
            0x00,
            vec![start_address, byte_count],
        )
    }

    /// Reads a bootloader property. Memory ID 0 is internal flash.
    pub fn get_property(property_tag: u32, memory_id: u32) -> Self {
        Self::new(CommandTag::GetProperty, 0x00, vec![property_tag, memory_id])
    }

    pub fn reset() -> Self {
        Self::new(CommandTag::Reset, 0x00, Vec::new())
    }

    /// Asks the target to perform a reliable update swap. The target also does
    /// this on reset.
    pub fn reliable_update(address: u32) -> Self {
        Self::new(CommandTag::ReliableUpdate, 0x00, vec![address])
    }
}

impl Encode for CommandPacket {
    fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 + 4 * self.parameters.len());
        payload.push(self.tag as u8);
        payload.push(self.flags);
        payload.push(0x00);
        payload.push(self.parameters.len() as u8);
        for parameter in &self.parameters {
            payload.extend_from_slice(&parameter.to_le_bytes());
        }

        framing_packet(FrameType::Command, &payload)
    }
}

/// A chunk of raw bytes wrapped in a `Data` framing packet.
#[derive(Debug, Clone, Copy)]
pub struct DataPacket<'a>(pub &'a [u8]);

impl Encode for DataPacket<'_> {
    fn encode(&self) -> Vec<u8> {
        framing_packet(FrameType::Data, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_payload_layout() {
        let frame = CommandPacket::flash_erase_region(0x0004_C000, 0x0003_0000).encode();

        // start, type, length, crc, then the command payload
        assert_eq!(&frame[..4], &[0x5A, 0xA4, 0x0C, 0x00]);
        assert_eq!(
            &frame[6..],
            &[
                0x02, 0x00, 0x00, 0x02, // tag, flags, reserved, parameter count
                0x00, 0xC0, 0x04, 0x00, // start address
                0x00, 0x00, 0x03, 0x00, // byte count
            ]
        );
    }

    #[test]
    fn reset_has_no_parameters() {
        let frame = CommandPacket::reset().encode();
        assert_eq!(&frame[6..], &[0x0B, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn data_packet_wraps_payload() {
        let frame = DataPacket(&[1, 2, 3]).encode();
        assert_eq!(&frame[..4], &[0x5A, 0xA5, 0x03, 0x00]);
        assert_eq!(&frame[6..], &[1, 2, 3]);
    }
}
