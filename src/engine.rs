//! The protocol engine: owns the transport, serializes outbound frames,
//! and dispatches inbound frames to completion signals.
//!
//! Two actors share an [`Engine`]: the caller's task drives commands and waits
//! on signals, while a background reader task pumps transport chunks through
//! the [`FrameParser`](crate::parser::FrameParser) and into
//! [`dispatch`](Engine::dispatch). The reader never originates requests; it
//! only acknowledges, retransmits on NAK, and flips signals.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, log, trace, warn, Level};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use crate::decode::Decode;
use crate::encode::Encode;
use crate::event::Event;
use crate::packets::command::CommandTag;
use crate::packets::response::{CommandResponse, PingResponse, ResponseTag};
use crate::packets::status::{property_value_name, status_name, StatusCode};
use crate::packets::{AckPacket, FrameType};
use crate::parser::FrameParser;
use crate::transport::{Transport, TransportError};
use crate::version::SUPPORTED_VERSION;

/// One completion signal per response kind the workflows wait on, plus the
/// catch-all that fires for any successful command response.
#[derive(Debug, Default)]
pub struct Signals {
    pub ack: Event,
    pub ping_response: Event,
    pub reset_response: Event,
    pub flash_erase_region: Event,
    pub read_memory_response: Event,
    /// Trailing generic response that closes a read-memory data stream.
    pub read_memory_response_tag: Event,
    pub write_memory_response: Event,
    pub get_command_response: Event,
    /// Pulsed whenever a data frame has been appended to the memory buffer.
    pub data_chunk: Event,
}

/// Protocol engine bound to one transport.
pub struct Engine<T: Transport> {
    transport: T,
    /// Send lock; also holds the last frame handed to the transport so a NAK
    /// can replay it.
    last_sent: Mutex<Option<Vec<u8>>>,
    pub signals: Signals,
    memory: Mutex<Vec<u8>>,
    property_values: Mutex<Vec<u32>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Engine<T> {
    /// Wraps `transport` and spawns the reader task. Must be called from
    /// within a tokio runtime.
    pub fn new(mut transport: T) -> Arc<Self> {
        let inbound = transport.take_inbound();

        let engine = Arc::new(Self {
            transport,
            last_sent: Mutex::new(None),
            signals: Signals::default(),
            memory: Mutex::new(Vec::new()),
            property_values: Mutex::new(Vec::new()),
            reader: Mutex::new(None),
        });

        if let Some(mut inbound) = inbound {
            let handle = tokio::spawn({
                let engine = Arc::clone(&engine);
                async move {
                    let mut parser = FrameParser::new();
                    while let Some(chunk) = inbound.recv().await {
                        for packet in parser.feed(&chunk) {
                            engine.dispatch(&packet).await;
                        }
                    }
                    debug!("inbound channel closed; reader stopping");
                }
            });
            // No clone of the engine exists yet, so the slot is free.
            if let Ok(mut reader) = engine.reader.try_lock() {
                *reader = Some(handle);
            }
        }

        engine
    }

    /// Encodes and sends a packet.
    pub async fn send_packet(&self, packet: impl Encode) -> Result<(), TransportError> {
        self.send(packet.encode()).await
    }

    /// Sends raw frame bytes as one atomic unit, remembering them for a
    /// possible NAK replay.
    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut last_sent = self.last_sent.lock().await;
        trace!("sent packet: {:02x?}", bytes);
        let bytes = last_sent.insert(bytes);
        self.transport.send_bytes(bytes.as_slice()).await
    }

    /// Handles one validated frame from the parser.
    ///
    /// Command and data frames are acknowledged before any signal is set, so
    /// the ACK is on the wire before the next inbound frame is looked at.
    pub async fn dispatch(&self, packet: &[u8]) {
        let Some(frame_type) = packet.get(1).copied().and_then(FrameType::from_u8) else {
            error!("dropping malformed packet: {packet:02x?}");
            return;
        };

        match frame_type {
            FrameType::Ack => {
                debug!("received ACK");
                self.signals.ack.set();
            }
            FrameType::Nak => {
                // The previous frame was corrupted in transit; replay it.
                warn!("received NAK");
                self.resend_last().await;
            }
            FrameType::AckAbort => {
                error!("received ACK abort");
            }
            FrameType::Command => {
                self.acknowledge().await;
                self.handle_command_response(packet).await;
            }
            FrameType::Data => {
                self.acknowledge().await;
                self.handle_data(packet).await;
            }
            FrameType::PingResponse => self.handle_ping_response(packet),
            // The parser consumes host-directed pings.
            FrameType::Ping => {}
        }
    }

    async fn acknowledge(&self) {
        if let Err(e) = self.send_packet(AckPacket).await {
            error!("failed to acknowledge packet: {e}");
        }
    }

    async fn resend_last(&self) {
        let mut last_sent = self.last_sent.lock().await;
        if let Some(bytes) = last_sent.as_deref() {
            info!("resending last packet");
            if let Err(e) = self.transport.send_bytes(bytes).await {
                error!("failed to resend last packet: {e}");
            }
        }
    }

    async fn handle_command_response(&self, packet: &[u8]) {
        let response = match CommandResponse::decode(packet[6..].iter().copied()) {
            Ok(response) => response,
            Err(e) => {
                error!("failed to decode command response: {e}");
                return;
            }
        };

        let status = response.status;
        let mut success = status == StatusCode::Success as u32;
        let level = if success { Level::Info } else { Level::Warn };

        match ResponseTag::from_u8(response.tag) {
            Some(ResponseTag::Generic) => {
                let Some(&command_tag) = response.parameters.first() else {
                    error!("generic response without a command tag");
                    return;
                };

                match CommandTag::from_u32(command_tag) {
                    Some(CommandTag::Reset) => {
                        log!(level, "Reset status: {}", status_name(status));
                        if success {
                            self.signals.reset_response.set();
                        }
                    }
                    Some(CommandTag::FlashEraseRegion) => {
                        log!(level, "FlashEraseRegion status: {}", status_name(status));
                        if success {
                            self.signals.flash_erase_region.set();
                        }
                    }
                    Some(CommandTag::ReadMemory) => {
                        // The trailing status after the last data frame of a
                        // read stream.
                        log!(level, "ReadMemory status: {}", status_name(status));
                        if success {
                            self.signals.read_memory_response_tag.set();
                        }
                    }
                    Some(CommandTag::WriteMemory) => {
                        log!(level, "WriteMemory status: {}", status_name(status));
                        if success {
                            self.signals.write_memory_response.set();
                        }
                    }
                    Some(CommandTag::ReliableUpdate) => {
                        // The swap already having happened reports its own
                        // status code, which is also a success.
                        success |= status == StatusCode::ReliableUpdateSuccess as u32;
                        let level = if success { Level::Info } else { Level::Warn };
                        log!(level, "ReliableUpdate status: {}", status_name(status));
                    }
                    _ => {
                        log!(
                            level,
                            "generic response: status: {}, command tag: {command_tag:#04X}",
                            status_name(status)
                        );
                    }
                }
            }
            Some(ResponseTag::ReadMemory) => {
                let data_byte_count = response.parameters.first().copied().unwrap_or(0);
                log!(
                    level,
                    "read memory response: status: {}, data byte count: {data_byte_count}",
                    status_name(status)
                );
                if success {
                    self.signals.read_memory_response.set();
                }
            }
            Some(ResponseTag::GetProperty) => {
                let values = response
                    .parameters
                    .iter()
                    .map(|&value| property_value_name(value))
                    .collect::<Vec<_>>();
                log!(
                    level,
                    "get property response: status: {}, property value(s): {values:?}",
                    status_name(status)
                );
                if success {
                    *self.property_values.lock().await = response.parameters;
                }
            }
            None => {
                error!("unhandled response tag: {:#04x}", response.tag);
            }
        }

        // Any successful command response also satisfies a caller waiting on
        // "some command completed".
        if success {
            self.signals.get_command_response.set();
        }
    }

    async fn handle_data(&self, packet: &[u8]) {
        let length = u16::from_le_bytes([packet[2], packet[3]]) as usize;
        let payload = &packet[6..6 + length];

        self.memory.lock().await.extend_from_slice(payload);
        self.signals.data_chunk.set();
    }

    fn handle_ping_response(&self, packet: &[u8]) {
        match PingResponse::decode(packet[2..8].iter().copied()) {
            Ok(response) => {
                info!(
                    "ping response: version: {}, options: {}",
                    response.version, response.options
                );
                if response.version != SUPPORTED_VERSION {
                    error!("unsupported protocol version: {}", response.version);
                }
            }
            Err(e) => error!("failed to decode ping response: {e}"),
        }
        self.signals.ping_response.set();
    }

    /// Clears the read-memory accumulator.
    pub async fn clear_memory_buffer(&self) {
        self.memory.lock().await.clear();
    }

    /// Number of bytes accumulated so far by the current read.
    pub async fn memory_buffer_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Takes the accumulated read-memory bytes, leaving the buffer empty.
    pub async fn take_memory_buffer(&self) -> Vec<u8> {
        std::mem::take(&mut *self.memory.lock().await)
    }

    /// The parameter words of the most recent successful get-property
    /// response.
    pub async fn property_values(&self) -> Vec<u32> {
        self.property_values.lock().await.clone()
    }

    /// Stops the reader task and shuts the transport down. In-flight waits
    /// will time out shortly after.
    pub async fn shutdown(&self, timeout: Duration) {
        self.transport.shutdown(timeout).await;
        if let Some(mut reader) = self.reader.lock().await.take() {
            if time::timeout(timeout, &mut reader).await.is_err() {
                warn!("reader task did not stop in time; aborting it");
                reader.abort();
            }
        }
    }
}
