//! # VBus Protocol Module
//!
//! Implementation of the RESOL VBus telegram protocol (version 1.0).
//!
//! This module handles:
//! - Telegram header validation (sync byte, addresses, protocol, command)
//! - 7-bit rolling checksum verification for header and frames
//! - Septet restoration of the stripped high bits of frame data
//! - Payload assembly and typed field extraction (raw, temperature, time)

pub mod checksum;
pub mod decoder;
pub mod protocol;
pub mod septet;

pub use decoder::decode;
pub use protocol::{Packet, PacketHeader};
