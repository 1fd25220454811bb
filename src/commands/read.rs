//! The read-memory workflow: one command, a stream of data frames, and a
//! trailing status that closes the stream.

use std::time::Duration;

use log::{error, info};

use super::{emit_progress, ping_target, ProgressCallback};
use crate::engine::Engine;
use crate::packets::command::CommandPacket;
use crate::transport::Transport;

/// Reads `byte_count` bytes of target memory starting at `start_address`.
///
/// Progress percentages are reported through `progress`. Returns the bytes on
/// success; `None` if the target is unreachable, a response times out, or the
/// stream ends short.
pub async fn read<T: Transport>(
    engine: &Engine<T>,
    start_address: u32,
    byte_count: u32,
    timeout: Duration,
    ping_repeat: u32,
    mut progress: Option<ProgressCallback>,
) -> Option<Vec<u8>> {
    if !ping_target(engine, timeout, ping_repeat).await {
        return None;
    }

    info!("reading {byte_count} bytes from {start_address:#X}");

    // Drop anything a previous read left behind.
    engine.clear_memory_buffer().await;
    engine.signals.data_chunk.clear();
    engine.signals.read_memory_response_tag.clear();

    engine.signals.read_memory_response.clear();
    if let Err(e) = engine
        .send_packet(CommandPacket::read_memory(start_address, byte_count))
        .await
    {
        error!("failed to send read memory: {e}");
        return None;
    }
    if !engine
        .signals
        .read_memory_response
        .wait_timeout(timeout)
        .await
    {
        error!("timed out waiting for read memory response");
        return None;
    }

    loop {
        let received = engine.memory_buffer_len().await;
        emit_progress(
            &mut progress,
            received as f64 / byte_count.max(1) as f64 * 100.0,
        );

        if !engine.signals.data_chunk.wait_timeout(timeout).await {
            if engine.signals.read_memory_response_tag.is_set() {
                // The trailing status arrived; the stream is complete.
                emit_progress(&mut progress, 100.0);
                break;
            }
            error!("timed out waiting for read memory data");
            return None;
        }
        engine.signals.data_chunk.clear();
    }

    let memory = engine.take_memory_buffer().await;
    if memory.len() != byte_count as usize {
        error!(
            "memory data does not have the correct length: {} != {byte_count}",
            memory.len()
        );
        return None;
    }

    Some(memory)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::read;
    use crate::engine::Engine;
    use crate::transport::mock::{replies, MockTransport, Responder};

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Answers a read-memory command with `chunks` data frames and the
    /// trailing status.
    fn scripted_target(chunks: Vec<Vec<u8>>) -> Responder {
        Box::new(move |frame: &[u8]| match frame.get(1) {
            Some(0xA6) => vec![replies::ping_response()],
            Some(0xA4) if frame.get(6) == Some(&0x03) => {
                let total: usize = chunks.iter().map(Vec::len).sum();
                let mut frames = vec![replies::read_memory_response(0, total as u32)];
                frames.extend(chunks.iter().map(|chunk| replies::data_frame(chunk)));
                frames.push(replies::generic_response(0, 0x03));
                frames
            }
            _ => Vec::new(),
        })
    }

    #[tokio::test]
    async fn hundred_bytes_across_two_data_frames() {
        let first = vec![0x11; 50];
        let second = vec![0x22; 50];
        let mock =
            MockTransport::with_responder(scripted_target(vec![first.clone(), second.clone()]));
        let engine = Engine::new(mock);

        let progress: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let callback: super::ProgressCallback = {
            let progress = Arc::clone(&progress);
            Box::new(move |percent| progress.lock().unwrap().push(percent))
        };

        let memory = read(&engine, 0x1000, 100, TIMEOUT, 3, Some(callback)).await;

        let mut expected = first;
        expected.extend(second);
        assert_eq!(memory, Some(expected));

        let progress = progress.lock().unwrap();
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(progress.last(), Some(&100.0));
    }

    #[tokio::test]
    async fn short_stream_yields_no_buffer() {
        // Only half the requested bytes arrive before the trailing status.
        let mock = MockTransport::with_responder(scripted_target(vec![vec![0x11; 50]]));
        let engine = Engine::new(mock);

        assert_eq!(read(&engine, 0x1000, 100, TIMEOUT, 3, None).await, None);
    }

    #[tokio::test]
    async fn silent_target_fails_the_read() {
        let engine = Engine::new(MockTransport::new());
        assert_eq!(
            read(&engine, 0x1000, 100, Duration::from_millis(20), 2, None).await,
            None
        );
    }

    #[tokio::test]
    async fn stalled_stream_fails_the_read() {
        // The command is accepted but no data ever arrives.
        let mock = MockTransport::with_responder(Box::new(|frame: &[u8]| match frame.get(1) {
            Some(0xA6) => vec![replies::ping_response()],
            Some(0xA4) if frame.get(6) == Some(&0x03) => {
                vec![replies::read_memory_response(0, 100)]
            }
            _ => Vec::new(),
        }));
        let engine = Engine::new(mock);

        assert_eq!(read(&engine, 0x1000, 100, TIMEOUT, 3, None).await, None);
    }
}
