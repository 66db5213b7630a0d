//! # Error Types
//!
//! Custom error types for VBus Bridge using `thiserror`.

use thiserror::Error;

/// Errors produced while decoding a VBus telegram or extracting fields
/// from a decoded packet.
///
/// Every variant carries the concrete values a log reader needs to find
/// the offending byte or field; `expected` is always the locally computed
/// value and `got` the value found in the buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VBusError {
    /// Buffer is empty or does not start with the 0xAA sync byte
    #[error("buffer does not start with sync byte")]
    SyncByteMismatch,

    /// Buffer is too short to hold the header for its protocol
    #[error("buffer too short for header (got {got} bytes)")]
    HeaderTooShort { got: usize },

    /// Protocol identifier is not one this decoder supports
    #[error("unsupported protocol version 0x{protocol:02X}")]
    UnsupportedProtocol { protocol: u8 },

    /// Header checksum byte does not match the computed checksum
    #[error("invalid header checksum: expected 0x{expected:02X} got 0x{got:02X}")]
    HeaderChecksumMismatch { expected: u8, got: u8 },

    /// Buffer length does not match the length declared by the frame count
    #[error("invalid buffer length: expected {expected} got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// A byte after the sync byte has its high bit set before restoration
    #[error("byte at index {index} has its MSB set (0x{value:02X})")]
    HighBitSet { index: usize, value: u8 },

    /// A frame checksum byte does not match the computed checksum
    #[error("frame {frame} checksum invalid: expected 0x{expected:02X} got 0x{got:02X}")]
    FrameChecksumMismatch { frame: u8, expected: u8, got: u8 },

    /// A field read reaches past the end of the assembled payload
    #[error("invalid offset ({offset}) and size ({size}) for payload of {payload_len} bytes")]
    OffsetOutOfRange {
        offset: usize,
        size: usize,
        payload_len: usize,
    },
}

/// Main error type for VBus Bridge
#[derive(Debug, Error)]
pub enum VbusBridgeError {
    /// VBus protocol errors
    #[error("VBus protocol error: {0}")]
    Protocol(#[from] VBusError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No serial port could be opened
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),
}

/// Result type alias for VBus Bridge
pub type Result<T> = std::result::Result<T, VbusBridgeError>;
