//! Serial (UART) transport. The bootloader talks 8-N-1 at a caller-provided
//! baud rate.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::select;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{Transport, TransportError, INBOUND_CHANNEL_CAPACITY};

/// An open serial connection to the target, with a background task pumping
/// received bytes into the inbound channel.
pub struct SerialTransport {
    writer: Mutex<WriteHalf<SerialStream>>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
    stop: Arc<Notify>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SerialTransport {
    /// Opens `port` at `baudrate` and starts the read pump.
    pub fn open(port: &str, baudrate: u32) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(port, baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()?;
        debug!("opened serial port {port} at {baudrate} baud");

        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let stop = Arc::new(Notify::new());
        let pump = tokio::spawn(read_pump(reader, tx, Arc::clone(&stop)));

        Ok(Self {
            writer: Mutex::new(writer),
            inbound: Some(rx),
            stop,
            pump: Mutex::new(Some(pump)),
        })
    }
}

impl Transport for SerialTransport {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
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
                error!("serial read pump did not stop in time; aborting it");
                pump.abort();
            }
        }
    }
}

/// Reads from the port until shutdown, forwarding every non-empty read.
async fn read_pump(
    mut reader: ReadHalf<SerialStream>,
    tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<Notify>,
) {
    let mut buf = [0u8; 512];
    loop {
        select! {
            _ = stop.notified() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("serial port closed");
                    break;
                }
                Ok(n) => {
                    trace!("received bytes: {:02x?}", &buf[..n]);
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("serial read failed: {e}");
                    break;
                }
            },
        }
    }
}
