//! Host-bound response packets.

use crate::decode::{Decode, DecodeError};
use crate::version::ProtocolVersion;

/// Tags carried in the first payload byte of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseTag {
    Generic = 0xA0,
    ReadMemory = 0xA3,
    GetProperty = 0xA7,
}

impl ResponseTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0xA0 => Self::Generic,
            0xA3 => Self::ReadMemory,
            0xA7 => Self::GetProperty,
            _ => return None,
        })
    }
}

/// A decoded command-response payload.
///
/// Every response carries a status word as its first parameter; the parameters
/// after it depend on the tag (the echoed command tag for generic responses,
/// the byte count for read-memory responses, the property words for
/// get-property responses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub tag: u8,
    pub flags: u8,
    pub status: u32,
    pub parameters: Vec<u32>,
}

impl Decode for CommandResponse {
    /// Decodes the payload of a `Command` frame, i.e. the bytes after the
    /// 6-byte framing header.
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let tag = u8::decode(&mut data)?;
        let flags = u8::decode(&mut data)?;
        let _reserved = u8::decode(&mut data)?;
        let parameter_count = u8::decode(&mut data)?;
        if parameter_count == 0 {
            return Err(DecodeError::PacketTooShort);
        }

        let status = u32::decode(&mut data)?;
        let mut parameters = Vec::with_capacity(parameter_count as usize - 1);
        for _ in 1..parameter_count {
            parameters.push(u32::decode(&mut data)?);
        }

        Ok(Self {
            tag,
            flags,
            status,
            parameters,
        })
    }
}

/// The fixed 10-byte ping response, minus framing and CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    pub version: ProtocolVersion,
    pub options: u16,
}

impl Decode for PingResponse {
    /// Decodes bytes `[2..8)` of a ping-response frame: the version quadruple
    /// followed by the options word.
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let version = ProtocolVersion::decode(&mut data)?;
        let options = u16::decode(&mut data)?;

        Ok(Self { version, options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decode;
    use crate::packets::command::CommandTag;
    use crate::packets::status::StatusCode;

    #[test]
    fn generic_response() {
        // GenericResponse for WriteMemory with status Success.
        let payload = [
            0xA0, 0x00, 0x00, 0x02, // tag, flags, reserved, parameter count
            0x00, 0x00, 0x00, 0x00, // status
            0x04, 0x00, 0x00, 0x00, // command tag
        ];
        let response = CommandResponse::decode(payload).unwrap();

        assert_eq!(response.tag, ResponseTag::Generic as u8);
        assert_eq!(response.status, StatusCode::Success as u32);
        assert_eq!(
            response.parameters,
            vec![CommandTag::WriteMemory as u32]
        );
    }

    #[test]
    fn truncated_response() {
        let payload = [0xA0, 0x00, 0x00, 0x02, 0x00, 0x00];
        assert_eq!(
            CommandResponse::decode(payload),
            Err(DecodeError::PacketTooShort)
        );
    }

    #[test]
    fn ping_response() {
        let decoded = PingResponse::decode([0x00, 0x02, 0x01, b'P', 0x00, 0x00]).unwrap();
        assert_eq!(decoded.version.to_string(), "P1.2.0");
        assert_eq!(decoded.options, 0);
    }
}
