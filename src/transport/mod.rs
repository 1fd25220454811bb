//! Byte transports carrying framing packets to and from the target.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(feature = "can")]
pub mod can;
pub mod generic;
#[cfg(feature = "serial")]
pub mod serial;

#[cfg(test)]
pub(crate) mod mock;

/// A byte pipe to the target.
///
/// Outbound bytes go through [`send_bytes`](Transport::send_bytes);
/// implementations may fragment them (CAN sends at most 8 bytes per frame) but
/// must preserve order. Inbound bytes arrive as chunks on the channel returned
/// by [`take_inbound`](Transport::take_inbound), in arrival order, exactly as
/// the wire produced them.
pub trait Transport: Send + Sync + 'static {
    /// Delivers `bytes` to the wire as one ordered unit.
    fn send_bytes(&self, bytes: &[u8])
        -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Takes the inbound chunk stream. Yields `Some` exactly once; the channel
    /// closes when the transport shuts down.
    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>>;

    /// Stops the inbound pump and releases the underlying device, waiting at
    /// most `timeout` for the pump to wind down.
    fn shutdown(&self, timeout: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    #[error("Serialport Error: {0}")]
    SerialportError(#[from] tokio_serial::Error),
    #[cfg(feature = "can")]
    #[error("CAN Error: {0}")]
    CanError(#[from] socketcan::Error),
    #[error("Invalid CAN id: {0:#X}")]
    InvalidCanId(u32),
    #[error("CAN frame payload too large")]
    OversizedCanFrame,
    #[error("Transport is shut down")]
    Closed,
}

/// Capacity of the inbound chunk channel shared by all transports.
pub(crate) const INBOUND_CHANNEL_CAPACITY: usize = 64;
