//! Crate for talking to the NXP MCUBOOT/KBOOT bootloader from the host side.
//!
//! This crate is structured around the [`Encode`](encode::Encode) and [`Decode`](decode::Decode)
//! traits. Messages sent to the target implement [`Encode`](encode::Encode); responses received
//! from it implement [`Decode`](decode::Decode). The [`parser`] module reassembles the raw byte
//! stream into whole, CRC-checked frames, and the [`engine`] module correlates those frames with
//! in-flight requests.
//!
//! Because manually sending and receiving packets is a chore, this library also provides high
//! level [`commands`] such as [`upload`](commands::upload) and [`read`](commands::read), which
//! drive the full multi-phase bootloader workflows and report progress along the way.

pub mod commands;
pub mod crc;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod event;
pub mod packets;
pub mod parser;
pub mod transport;
pub mod version;
