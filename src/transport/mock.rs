//! An in-memory transport for exercising the engine and workflows without
//! hardware. Records everything the host sends and lets tests script the
//! target's side of the conversation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use super::{Transport, TransportError, INBOUND_CHANNEL_CAPACITY};

/// Maps one host frame to the chunks the fake target answers with.
pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

pub(crate) struct MockTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    responder: Mutex<Option<Responder>>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            responder: Mutex::new(None),
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        }
    }

    /// Scripts the target: `responder` is called with every frame the host
    /// sends and its return chunks are delivered back.
    pub(crate) fn with_responder(responder: Responder) -> Self {
        let transport = Self::new();
        *transport.responder.try_lock().unwrap() = Some(responder);
        transport
    }

    /// A handle for injecting unsolicited inbound chunks.
    pub(crate) fn injector(&self) -> mpsc::Sender<Vec<u8>> {
        self.inbound_tx.clone()
    }

    /// Shared view of every byte string handed to the transport, in order.
    pub(crate) fn sent(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }
}

impl Transport for MockTransport {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().await.push(bytes.to_vec());

        let replies = match self.responder.lock().await.as_mut() {
            Some(responder) => responder(bytes),
            None => Vec::new(),
        };
        for reply in replies {
            if self.inbound_tx.send(reply).await.is_err() {
                return Err(TransportError::Closed);
            }
        }
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inbound_rx.take()
    }

    async fn shutdown(&self, _timeout: Duration) {}
}

/// Builders for the frames a real target would send back.
pub(crate) mod replies {
    use crate::crc::BLHOST_CRC16;
    use crate::packets::{framing_packet, FrameType};

    pub(crate) fn ack() -> Vec<u8> {
        vec![0x5A, 0xA1]
    }

    pub(crate) fn nak() -> Vec<u8> {
        vec![0x5A, 0xA2]
    }

    /// A ping response advertising protocol version P1.2.0 with no options.
    pub(crate) fn ping_response() -> Vec<u8> {
        let mut frame = vec![0x5A, 0xA7, 0x00, 0x02, 0x01, b'P', 0x00, 0x00];
        let crc = BLHOST_CRC16.checksum(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    pub(crate) fn generic_response(status: u32, command_tag: u32) -> Vec<u8> {
        response(0xA0, status, &[command_tag])
    }

    pub(crate) fn read_memory_response(status: u32, data_byte_count: u32) -> Vec<u8> {
        response(0xA3, status, &[data_byte_count])
    }

    pub(crate) fn get_property_response(status: u32, values: &[u32]) -> Vec<u8> {
        response(0xA7, status, values)
    }

    pub(crate) fn data_frame(bytes: &[u8]) -> Vec<u8> {
        framing_packet(FrameType::Data, bytes)
    }

    fn response(tag: u8, status: u32, parameters: &[u32]) -> Vec<u8> {
        let mut payload = vec![tag, 0x00, 0x00, 1 + parameters.len() as u8];
        payload.extend_from_slice(&status.to_le_bytes());
        for parameter in parameters {
            payload.extend_from_slice(&parameter.to_le_bytes());
        }
        framing_packet(FrameType::Command, &payload)
    }
}
