use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info, LevelFilter};

use blhost::commands::{self, CommandError, UploadOptions};
use blhost::engine::Engine;
use blhost::packets::status::{property_value_name, PropertyTag};
use blhost::transport::can::{CanConfig, CanTransport};
use blhost::transport::generic::GenericTransport;
use blhost::transport::serial::SerialTransport;

#[derive(Parser)]
#[command(name = "blhost", version, about = "Talk to the NXP MCUBOOT/KBOOT bootloader")]
struct Cli {
    #[command(subcommand)]
    interface: Interface,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Seconds to wait for each response
    #[arg(short, long, global = true, default_value_t = 1.0)]
    timeout: f64,

    /// Times to try to establish a connection
    #[arg(short = 'r', long, global = true, default_value_t = 3)]
    cmd_repeat: u32,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Interface {
    /// Communicate with the target over CAN bus
    Can {
        /// Arbitration id (hex or decimal) the target transmits with
        #[arg(long, value_parser = parse_number)]
        tx_id: u32,

        /// Arbitration id (hex or decimal) the host transmits with
        #[arg(long, value_parser = parse_number)]
        rx_id: u32,

        /// CAN driver; only "socketcan" is supported
        #[arg(short, long, default_value = "socketcan")]
        interface: String,

        /// CAN channel
        #[arg(short = 'l', long, default_value = "can0")]
        channel: String,

        /// Use 29-bit extended arbitration ids
        #[arg(long)]
        extended_id: bool,

        #[command(subcommand)]
        operation: Operation,
    },
    /// Communicate with the target over a serial port
    Serial {
        /// The serial port device
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value_t = 500_000)]
        baudrate: u32,

        #[command(subcommand)]
        operation: Operation,
    },
}

#[derive(Subcommand)]
enum Operation {
    /// Write a binary to flash, erasing the target region first
    Upload {
        /// The binary to upload
        #[arg(short = 'B', long)]
        binary: PathBuf,

        /// Address (hex or decimal) to write the binary to
        #[arg(short, long, value_parser = parse_number)]
        start_address: u32,

        /// Number of bytes (hex or decimal) to erase ahead of the write
        #[arg(short = 'c', long, value_parser = parse_number)]
        byte_count: u32,

        /// Leave the target in the bootloader instead of resetting it
        #[arg(long)]
        no_reset: bool,

        /// Treat a missing final write status as success
        #[arg(long)]
        assume_success: bool,

        /// Full upload attempts before giving up
        #[arg(long, default_value_t = 1)]
        attempts: u32,
    },
    /// Read target memory into a file
    Read {
        /// File the read bytes are written to
        #[arg(short = 'B', long)]
        binary: PathBuf,

        /// Address (hex or decimal) to read from
        #[arg(short, long, value_parser = parse_number)]
        start_address: u32,

        /// Number of bytes (hex or decimal) to read
        #[arg(short = 'c', long, value_parser = parse_number)]
        byte_count: u32,
    },
    /// Check that the target answers a ping
    Ping,
    /// Reset the target
    Reset,
    /// Read a bootloader property
    GetProperty {
        /// Property tag (hex or decimal)
        #[arg(long, value_parser = parse_number)]
        prop: u32,
    },
}

fn parse_number(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number {value:?}: {e}"))
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let color = if std::env::var_os("NO_COLOR").is_some() {
        simplelog::ColorChoice::Never
    } else if std::env::var_os("FORCE_COLOR").is_some() {
        simplelog::ColorChoice::Always
    } else {
        simplelog::ColorChoice::Auto
    };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        color,
    );
}

/// Logs progress at whole-percent steps so the data phase is visible without
/// flooding the terminal.
fn progress_logger(label: &'static str) -> commands::ProgressCallback {
    let mut last = -1i64;
    Box::new(move |percent| {
        let whole = percent.floor() as i64;
        if whole > last {
            last = whole;
            info!("{label}: {percent:.1}%");
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.common.verbose);
    let timeout = match Duration::try_from_secs_f64(cli.common.timeout) {
        Ok(timeout) => timeout,
        Err(_) => {
            error!("invalid timeout: {}", cli.common.timeout);
            return ExitCode::from(2);
        }
    };

    let (transport, operation) = match cli.interface {
        Interface::Serial {
            port,
            baudrate,
            operation,
        } => match SerialTransport::open(&port, baudrate) {
            Ok(transport) => (GenericTransport::from(transport), operation),
            Err(e) => {
                error!("failed to open serial port: {e}");
                return ExitCode::from(1);
            }
        },
        Interface::Can {
            tx_id,
            rx_id,
            interface,
            channel,
            extended_id,
            operation,
        } => {
            if interface != "socketcan" {
                error!("unsupported CAN interface {interface:?}; only socketcan is available");
                return ExitCode::from(2);
            }
            let config = CanConfig {
                channel,
                tx_id,
                rx_id,
                extended_id,
                frame_gap: None,
            };
            match CanTransport::open(config) {
                Ok(transport) => (GenericTransport::from(transport), operation),
                Err(e) => {
                    error!("failed to open CAN channel: {e}");
                    return ExitCode::from(1);
                }
            }
        }
    };

    let engine = Engine::new(transport);
    let code = run(&engine, operation, timeout, cli.common.cmd_repeat).await;
    engine.shutdown(Duration::from_secs(1)).await;
    ExitCode::from(code)
}

async fn run(
    engine: &Engine<GenericTransport>,
    operation: Operation,
    timeout: Duration,
    cmd_repeat: u32,
) -> u8 {
    match operation {
        Operation::Ping => {
            for attempt in 1..=cmd_repeat {
                if commands::ping(engine, timeout).await {
                    info!("ping responded in {attempt} attempt(s)");
                    return 0;
                }
            }
            error!("timed out waiting for ping response");
            1
        }
        Operation::Reset => {
            for attempt in 1..=cmd_repeat {
                if commands::reset(engine, timeout).await {
                    info!("reset responded in {attempt} attempt(s)");
                    return 0;
                }
            }
            error!("timed out waiting for reset response");
            1
        }
        Operation::GetProperty { prop } => {
            match commands::get_property(engine, prop, 0, timeout, cmd_repeat).await {
                Some(values) => {
                    let name = match PropertyTag::from_u32(prop) {
                        Some(tag) => format!("{tag:?}"),
                        None => format!("{prop:#04X}"),
                    };
                    let values: Vec<String> =
                        values.iter().map(|&value| property_value_name(value)).collect();
                    info!("property {name}: {}", values.join(", "));
                    0
                }
                None => {
                    error!("reading property failed");
                    1
                }
            }
        }
        Operation::Upload {
            binary,
            start_address,
            byte_count,
            no_reset,
            assume_success,
            attempts,
        } => {
            let options = UploadOptions {
                start_address,
                erase_byte_count: byte_count,
                timeout,
                ping_repeat: cmd_repeat,
                attempts,
                reset_after: !no_reset,
                assume_success,
            };
            match commands::upload_file(
                engine,
                &binary,
                &options,
                Some(progress_logger("upload progress")),
            )
            .await
            {
                Ok(true) => {
                    info!("uploading succeeded");
                    0
                }
                Ok(false) => {
                    error!("uploading failed");
                    1
                }
                Err(e @ CommandError::InvalidArgument) => {
                    error!("{e}");
                    2
                }
                Err(e) => {
                    error!("{e}");
                    1
                }
            }
        }
        Operation::Read {
            binary,
            start_address,
            byte_count,
        } => {
            match commands::read(
                engine,
                start_address,
                byte_count,
                timeout,
                cmd_repeat,
                Some(progress_logger("read memory")),
            )
            .await
            {
                Some(data) => match tokio::fs::write(&binary, &data).await {
                    Ok(()) => {
                        info!("reading memory succeeded");
                        0
                    }
                    Err(e) => {
                        error!("failed to write {:?}: {e}", binary);
                        1
                    }
                },
                None => {
                    error!("reading memory failed");
                    1
                }
            }
        }
    }
}
