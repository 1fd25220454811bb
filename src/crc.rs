use crc::Crc;

/// The bootloader uses CRC-16/XMODEM as the framing checksum.
pub const BLHOST_CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Computes the CRC of a long frame: the 4-byte header followed by the payload,
/// skipping the CRC field that sits between them.
pub fn framing_crc(header: &[u8], payload: &[u8]) -> u16 {
    let mut digest = BLHOST_CRC16.digest();
    digest.update(header);
    digest.update(payload);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::{framing_crc, BLHOST_CRC16};

    #[test]
    fn check_value() {
        // The CRC-16/XMODEM check value.
        assert_eq!(BLHOST_CRC16.checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn chained_digest_matches_whole_input() {
        let a = b"\x5a\xa4\x0c\x00";
        let b = b"\x07\x00\x00\x02\x01\x00\x00\x00\x00\x00\x00\x00";
        let mut whole = a.to_vec();
        whole.extend_from_slice(b);

        assert_eq!(framing_crc(a, b), BLHOST_CRC16.checksum(&whole));
    }

    #[test]
    fn empty_parts() {
        assert_eq!(framing_crc(&[], &[]), BLHOST_CRC16.checksum(&[]));
        assert_eq!(framing_crc(b"ab", &[]), BLHOST_CRC16.checksum(b"ab"));
    }
}
