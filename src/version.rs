use std::fmt;

use crate::decode::{Decode, DecodeError};

/// The serial protocol version reported in a ping response.
///
/// On the wire the fields are laid out little-endian-first: bugfix, minor,
/// major, then the one-character protocol name.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProtocolVersion {
    pub name: char,
    pub major: u8,
    pub minor: u8,
    pub bugfix: u8,
}

/// The only protocol version this crate has been validated against.
pub const SUPPORTED_VERSION: ProtocolVersion = ProtocolVersion {
    name: 'P',
    major: 1,
    minor: 2,
    bugfix: 0,
};

impl Decode for ProtocolVersion {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let bugfix = u8::decode(&mut data)?;
        let minor = u8::decode(&mut data)?;
        let major = u8::decode(&mut data)?;
        let name = u8::decode(&mut data)? as char;

        Ok(Self {
            name,
            major,
            minor,
            bugfix,
        })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}.{}.{}",
            self.name, self.major, self.minor, self.bugfix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ProtocolVersion, SUPPORTED_VERSION};
    use crate::decode::Decode;

    #[test]
    fn display() {
        assert_eq!(SUPPORTED_VERSION.to_string(), "P1.2.0");
    }

    #[test]
    fn decode_wire_order() {
        // bugfix, minor, major, name
        let decoded = ProtocolVersion::decode([0x00, 0x02, 0x01, b'P']).unwrap();
        assert_eq!(decoded, SUPPORTED_VERSION);
    }
}
