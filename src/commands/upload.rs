//! The multi-phase upload workflow: erase, announce the write, stream the
//! image in acknowledged chunks, then collect the final status.

use std::path::Path;
use std::time::Duration;

use log::{error, info, warn};

use super::{emit_progress, ping_target, reset, CommandError, ProgressCallback};
use crate::engine::Engine;
use crate::packets::command::{CommandPacket, DataPacket};
use crate::transport::Transport;

/// Bytes per data frame; the target acknowledges each frame before the next
/// may be sent.
const DATA_CHUNK_SIZE: usize = 32;

/// Images are padded with the flash erase pattern. The reference manual says
/// the byte count is rounded to a multiple of 4, but the flash controller
/// needs 16-byte alignment.
const FLASH_ALIGNMENT: usize = 16;
const ERASE_PATTERN: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Address the image is written to.
    pub start_address: u32,
    /// Bytes to erase ahead of the write, starting at `start_address`.
    pub erase_byte_count: u32,
    /// Deadline for every individual response.
    pub timeout: Duration,
    /// Times to ping before giving up on reaching the target.
    pub ping_repeat: u32,
    /// Full upload attempts before declaring failure. Must be at least 1.
    pub attempts: u32,
    /// Reset the target once the upload is over, successful or not.
    pub reset_after: bool,
    /// Treat a missing final write-memory status as success.
    pub assume_success: bool,
}

impl UploadOptions {
    pub fn new(start_address: u32, erase_byte_count: u32) -> Self {
        Self {
            start_address,
            erase_byte_count,
            timeout: Duration::from_secs(5),
            ping_repeat: 3,
            attempts: 1,
            reset_after: true,
            assume_success: false,
        }
    }
}

enum Attempt {
    Succeeded,
    Failed { touched_flash: bool },
}

/// Reads `path` and uploads it; see [`upload`].
pub async fn upload_file<T: Transport>(
    engine: &Engine<T>,
    path: &Path,
    options: &UploadOptions,
    progress: Option<ProgressCallback>,
) -> Result<bool, CommandError> {
    info!(
        "uploading \"{}\" to {:#X}",
        path.display(),
        options.start_address
    );
    let binary = tokio::fs::read(path).await?;
    upload(engine, &binary, options, progress).await
}

/// Uploads `binary` to the target, retrying up to `options.attempts` times.
///
/// Progress percentages are reported through `progress`; within one attempt
/// they are non-decreasing. Returns `Ok(false)` when the target could not be
/// programmed (or, with `reset_after`, could not be reset); `Err` is reserved
/// for invalid arguments.
pub async fn upload<T: Transport>(
    engine: &Engine<T>,
    binary: &[u8],
    options: &UploadOptions,
    mut progress: Option<ProgressCallback>,
) -> Result<bool, CommandError> {
    if options.attempts == 0 {
        return Err(CommandError::InvalidArgument);
    }

    let binary = pad_to_alignment(binary);

    let mut result = false;
    let mut touched_flash = false;
    for attempt in 1..=options.attempts {
        if options.attempts > 1 {
            info!("upload attempt {attempt} of {}", options.attempts);
        }
        match upload_attempt(engine, &binary, options, &mut progress).await {
            Attempt::Succeeded => {
                result = true;
                break;
            }
            Attempt::Failed {
                touched_flash: touched,
            } => touched_flash |= touched,
        }
    }

    if !result && touched_flash {
        // A failed attempt may have left a partial image; erase it rather
        // than leave something bootable-looking behind.
        info!(
            "uploading failed; erasing flash region: {:#X} -> {:#X}",
            options.start_address,
            options.start_address + options.erase_byte_count
        );
        engine.signals.flash_erase_region.clear();
        match engine
            .send_packet(CommandPacket::flash_erase_region(
                options.start_address,
                options.erase_byte_count,
            ))
            .await
        {
            Ok(()) => {
                if !engine
                    .signals
                    .flash_erase_region
                    .wait_timeout(options.timeout)
                    .await
                {
                    error!(
                        "timed out waiting for flash erase region response after the upload failed"
                    );
                }
            }
            Err(e) => error!("failed to send cleanup flash erase region: {e}"),
        }
    }

    if options.reset_after {
        // The target must never be left sitting in the bootloader.
        if !reset(engine, options.timeout).await {
            error!("timed out waiting for reset response");
            result = false;
        }
    }

    Ok(result)
}

async fn upload_attempt<T: Transport>(
    engine: &Engine<T>,
    binary: &[u8],
    options: &UploadOptions,
    progress: &mut Option<ProgressCallback>,
) -> Attempt {
    if !ping_target(engine, options.timeout, options.ping_repeat).await {
        return Attempt::Failed {
            touched_flash: false,
        };
    }

    // Erase the region the image will land in; the write is only issued once
    // this succeeds.
    info!(
        "erasing flash region: {:#X} -> {:#X}",
        options.start_address,
        options.start_address + options.erase_byte_count
    );
    engine.signals.flash_erase_region.clear();
    if let Err(e) = engine
        .send_packet(CommandPacket::flash_erase_region(
            options.start_address,
            options.erase_byte_count,
        ))
        .await
    {
        error!("failed to send flash erase region: {e}");
        return Attempt::Failed {
            touched_flash: false,
        };
    }
    if !engine
        .signals
        .flash_erase_region
        .wait_timeout(options.timeout)
        .await
    {
        warn!("timed out waiting for initial flash erase region response");
        return Attempt::Failed { touched_flash: true };
    }

    info!("sending write memory command");
    engine.signals.write_memory_response.clear();
    if let Err(e) = engine
        .send_packet(CommandPacket::write_memory(
            options.start_address,
            binary.len() as u32,
        ))
        .await
    {
        error!("failed to send write memory: {e}");
        return Attempt::Failed { touched_flash: true };
    }
    if !engine
        .signals
        .write_memory_response
        .wait_timeout(options.timeout)
        .await
    {
        warn!("timed out waiting for write memory response");
        return Attempt::Failed { touched_flash: true };
    }

    // The same signal carries the terminal status once the data stream is
    // complete; re-arm it before streaming.
    engine.signals.write_memory_response.clear();

    emit_progress(progress, 0.0);
    let mut data_sent = 0usize;
    for chunk in binary.chunks(DATA_CHUNK_SIZE) {
        engine.signals.ack.clear();
        if let Err(e) = engine.send_packet(DataPacket(chunk)).await {
            error!("failed to send data packet: {e}");
            return Attempt::Failed { touched_flash: true };
        }
        if !engine.signals.ack.wait_timeout(options.timeout).await {
            warn!("timed out waiting for ACK response");
            return Attempt::Failed { touched_flash: true };
        }

        data_sent += chunk.len();
        emit_progress(progress, data_sent as f64 / binary.len() as f64 * 100.0);
    }

    if engine
        .signals
        .write_memory_response
        .wait_timeout(options.timeout)
        .await
    {
        Attempt::Succeeded
    } else if options.assume_success {
        info!("no final write memory status; assuming success");
        Attempt::Succeeded
    } else {
        warn!("timed out waiting for write memory response");
        Attempt::Failed { touched_flash: true }
    }
}

/// Right-pads with the erase pattern to the next flash-alignment boundary.
fn pad_to_alignment(binary: &[u8]) -> Vec<u8> {
    let mut padded = binary.to_vec();
    let remainder = padded.len() % FLASH_ALIGNMENT;
    if remainder != 0 {
        padded.resize(padded.len() + FLASH_ALIGNMENT - remainder, ERASE_PATTERN);
    }
    padded
}
