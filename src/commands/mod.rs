//! High-level bootloader operations.
//!
//! These drive the [`Engine`](crate::engine::Engine) through the multi-step
//! conversations the bootloader expects: ping before touching anything, clear
//! the completion signal you are about to wait on, send, wait with a timeout.
//! Long-running operations report progress through a callback.

use std::time::Duration;

use log::{error, info, warn};
use thiserror::Error;

use crate::engine::Engine;
use crate::packets::command::CommandPacket;
use crate::packets::PingPacket;
use crate::transport::Transport;

mod read;
mod upload;

pub use read::read;
pub use upload::{upload, upload_file, UploadOptions};

/// Receives progress percentages in `[0, 100]` as an operation advances.
pub type ProgressCallback = Box<dyn FnMut(f64) + Send>;

#[derive(Error, Debug)]
pub enum CommandError {
    /// The caller asked for zero upload attempts.
    #[error("at least one upload attempt is required")]
    InvalidArgument,
    /// The binary file could not be read.
    #[error("failed to read binary file: {0}")]
    BinaryFile(#[from] std::io::Error),
}

/// Pings the target once and waits for the ping response.
pub async fn ping<T: Transport>(engine: &Engine<T>, timeout: Duration) -> bool {
    info!("sending ping command");
    engine.signals.ping_response.clear();
    if let Err(e) = engine.send_packet(PingPacket).await {
        error!("failed to send ping: {e}");
        return false;
    }
    engine.signals.ping_response.wait_timeout(timeout).await
}

/// Resets the target and waits for the confirmation that precedes the actual
/// reboot.
pub async fn reset<T: Transport>(engine: &Engine<T>, timeout: Duration) -> bool {
    info!("sending reset command");
    engine.signals.reset_response.clear();
    if let Err(e) = engine.send_packet(CommandPacket::reset()).await {
        error!("failed to send reset: {e}");
        return false;
    }
    engine.signals.reset_response.wait_timeout(timeout).await
}

/// Reads a bootloader property, returning its 32-bit words.
///
/// Returns `None` if the target cannot be reached or does not answer in time.
pub async fn get_property<T: Transport>(
    engine: &Engine<T>,
    property_tag: u32,
    memory_id: u32,
    timeout: Duration,
    ping_repeat: u32,
) -> Option<Vec<u32>> {
    if !ping_target(engine, timeout, ping_repeat).await {
        return None;
    }

    info!("reading property {property_tag:#04X}");
    engine.signals.get_command_response.clear();
    if let Err(e) = engine
        .send_packet(CommandPacket::get_property(property_tag, memory_id))
        .await
    {
        error!("failed to send get property: {e}");
        return None;
    }
    if !engine.signals.get_command_response.wait_timeout(timeout).await {
        warn!("timed out waiting for get property response");
        return None;
    }

    Some(engine.property_values().await)
}

/// Pings until the target answers, at most `ping_repeat` times.
pub(crate) async fn ping_target<T: Transport>(
    engine: &Engine<T>,
    timeout: Duration,
    ping_repeat: u32,
) -> bool {
    for attempt in 1..=ping_repeat {
        if ping(engine, timeout).await {
            info!("ping responded in {attempt} attempt(s)");
            return true;
        }
    }
    warn!("target did not respond to ping");
    false
}

pub(crate) fn emit_progress(progress: &mut Option<ProgressCallback>, percent: f64) {
    if let Some(callback) = progress {
        callback(percent);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{get_property, ping, reset};
    use crate::engine::Engine;
    use crate::transport::mock::{replies, MockTransport};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn ping_succeeds_on_response() {
        let mock = MockTransport::with_responder(Box::new(|frame: &[u8]| {
            if frame == [0x5A, 0xA6] {
                vec![replies::ping_response()]
            } else {
                Vec::new()
            }
        }));
        let sent = mock.sent();
        let engine = Engine::new(mock);

        assert!(ping(&engine, Duration::from_secs(1)).await);
        assert_eq!(sent.lock().await.as_slice(), &[vec![0x5A, 0xA6]]);
    }

    #[tokio::test]
    async fn ping_times_out_without_response() {
        let engine = Engine::new(MockTransport::new());
        assert!(!ping(&engine, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn reset_waits_for_generic_response() {
        let mock = MockTransport::with_responder(Box::new(|frame: &[u8]| {
            if frame.get(1) == Some(&0xA4) && frame.get(6) == Some(&0x0B) {
                vec![replies::generic_response(0, 0x0B)]
            } else {
                Vec::new()
            }
        }));
        let engine = Engine::new(mock);

        assert!(reset(&engine, TIMEOUT).await);
    }

    #[tokio::test]
    async fn get_property_returns_the_property_words() {
        let mock = MockTransport::with_responder(Box::new(|frame: &[u8]| match frame.get(1) {
            Some(0xA6) => vec![replies::ping_response()],
            Some(0xA4) if frame.get(6) == Some(&0x07) => {
                vec![replies::get_property_response(0, &[0x0000_004B])]
            }
            _ => Vec::new(),
        }));
        let engine = Engine::new(mock);

        let values = get_property(&engine, 0x01, 0, TIMEOUT, 3).await;
        assert_eq!(values, Some(vec![0x4B]));
    }

    #[tokio::test]
    async fn get_property_fails_when_target_is_silent() {
        let engine = Engine::new(MockTransport::new());
        assert_eq!(
            get_property(&engine, 0x01, 0, Duration::from_millis(20), 2).await,
            None
        );
    }
}
