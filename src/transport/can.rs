//! CAN bus transport over Linux SocketCAN.
//!
//! The target transmits with the `tx_id` arbitration id and listens on
//! `rx_id`, so the host does the reverse: frames go out under `rx_id` and the
//! receive side filters on `tx_id`. Framing packets larger than a CAN payload
//! are fragmented at 8 data bytes.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use socketcan::tokio::CanSocket;
use socketcan::{CanFilter, CanFrame, EmbeddedFrame, ExtendedId, Id, SocketOptions, StandardId};
use tokio::select;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time;

use super::{Transport, TransportError, INBOUND_CHANNEL_CAPACITY};

/// Maximum data bytes per classic CAN frame.
const CAN_FRAME_PAYLOAD: usize = 8;

#[derive(Debug, Clone)]
pub struct CanConfig {
    /// SocketCAN channel, e.g. `can0`.
    pub channel: String,
    /// Arbitration id the target transmits with.
    pub tx_id: u32,
    /// Arbitration id the host transmits with.
    pub rx_id: u32,
    /// Use 29-bit extended arbitration ids.
    pub extended_id: bool,
    /// Optional pause between outbound frame fragments, for targets that
    /// cannot drain back-to-back frames.
    pub frame_gap: Option<Duration>,
}

/// An open CAN connection to the target.
pub struct CanTransport {
    socket: CanSocket,
    outbound_id: Id,
    frame_gap: Option<Duration>,
    // Keeps the fragments of one packet contiguous on the bus.
    send_guard: Mutex<()>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
    stop: Arc<Notify>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl CanTransport {
    /// Opens the channel, installs the receive filter and starts the read
    /// pump.
    pub fn open(config: CanConfig) -> Result<Self, TransportError> {
        let outbound_id = arbitration_id(config.rx_id, config.extended_id)?;
        let inbound_id = arbitration_id(config.tx_id, config.extended_id)?;
        let mask = if config.extended_id {
            0x1FFF_FFFF
        } else {
            0x7FF
        };

        let socket = CanSocket::open(&config.channel)
            .map_err(|e| TransportError::CanError(e.into()))?;
        let rx_socket = CanSocket::open(&config.channel)
            .map_err(|e| TransportError::CanError(e.into()))?;
        rx_socket
            .set_filters(&[CanFilter::new(config.tx_id, mask)])
            .map_err(|e| TransportError::CanError(e.into()))?;
        debug!(
            "opened CAN channel {} (tx id {:#X}, rx id {:#X})",
            config.channel, config.tx_id, config.rx_id
        );

        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let stop = Arc::new(Notify::new());
        let pump = tokio::spawn(read_pump(rx_socket, inbound_id, tx, Arc::clone(&stop)));

        Ok(Self {
            socket,
            outbound_id,
            frame_gap: config.frame_gap,
            send_guard: Mutex::new(()),
            inbound: Some(rx),
            stop,
            pump: Mutex::new(Some(pump)),
        })
    }
}

impl Transport for CanTransport {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let _guard = self.send_guard.lock().await;
        for chunk in bytes.chunks(CAN_FRAME_PAYLOAD) {
            let frame = CanFrame::new(self.outbound_id, chunk)
                .ok_or(TransportError::OversizedCanFrame)?;
            self.socket
                .write_frame(frame)
                .await
                .map_err(|e| TransportError::CanError(e.into()))?;
            if let Some(gap) = self.frame_gap {
                time::sleep(gap).await;
            }
        }
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inbound.take()
    }

    async fn shutdown(&self, timeout: Duration) {
        // notify_one stores a permit, so the pump sees the stop even if it is
        // mid-send rather than parked in the select.
        self.stop.notify_one();
        if let Some(mut pump) = self.pump.lock().await.take() {
            if time::timeout(timeout, &mut pump).await.is_err() {
                error!("CAN read pump did not stop in time; aborting it");
                pump.abort();
            }
        }
    }
}

fn arbitration_id(raw: u32, extended: bool) -> Result<Id, TransportError> {
    if extended {
        ExtendedId::new(raw)
            .map(Id::Extended)
            .ok_or(TransportError::InvalidCanId(raw))
    } else {
        u16::try_from(raw)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
            .ok_or(TransportError::InvalidCanId(raw))
    }
}

/// Forwards the data bytes of every frame from the target, skipping error and
/// remote frames.
async fn read_pump(
    socket: CanSocket,
    inbound_id: Id,
    tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<Notify>,
) {
    loop {
        select! {
            _ = stop.notified() => break,
            frame = socket.read_frame() => match frame {
                Ok(CanFrame::Data(frame)) => {
                    if frame.id() != inbound_id {
                        continue;
                    }
                    trace!("received bytes: {:02x?}", frame.data());
                    if tx.send(frame.data().to_vec()).await.is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("CAN read failed: {e}");
                    break;
                }
            },
        }
    }
}
