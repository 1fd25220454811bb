use std::time::Duration;

use tokio::sync::mpsc;

#[cfg(feature = "can")]
use super::can::CanTransport;
#[cfg(feature = "serial")]
use super::serial::SerialTransport;
use super::{Transport, TransportError};

/// A transport chosen at runtime.
pub enum GenericTransport {
    #[cfg(feature = "serial")]
    Serial(SerialTransport),
    #[cfg(feature = "can")]
    Can(CanTransport),
}

impl Transport for GenericTransport {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        match self {
            #[cfg(feature = "serial")]
            GenericTransport::Serial(t) => t.send_bytes(bytes).await,
            #[cfg(feature = "can")]
            GenericTransport::Can(t) => t.send_bytes(bytes).await,
        }
    }

    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        match self {
            #[cfg(feature = "serial")]
            GenericTransport::Serial(t) => t.take_inbound(),
            #[cfg(feature = "can")]
            GenericTransport::Can(t) => t.take_inbound(),
        }
    }

    async fn shutdown(&self, timeout: Duration) {
        match self {
            #[cfg(feature = "serial")]
            GenericTransport::Serial(t) => t.shutdown(timeout).await,
            #[cfg(feature = "can")]
            GenericTransport::Can(t) => t.shutdown(timeout).await,
        }
    }
}

#[cfg(feature = "serial")]
impl From<SerialTransport> for GenericTransport {
    fn from(t: SerialTransport) -> Self {
        GenericTransport::Serial(t)
    }
}

#[cfg(feature = "can")]
impl From<CanTransport> for GenericTransport {
    fn from(t: CanTransport) -> Self {
        GenericTransport::Can(t)
    }
}
