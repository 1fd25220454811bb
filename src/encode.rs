/// A message that can be serialized into the raw bytes sent over a transport.
pub trait Encode {
    /// Encodes this message into wire bytes, framing included.
    fn encode(&self) -> Vec<u8>;
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }
}

impl Encode for &[u8] {
    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }
}
