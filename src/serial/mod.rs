//! # Serial Communication Module
//!
//! Handles serial communication with the VBus interface adapter.
//!
//! This module handles:
//! - Opening the serial port at 9,600 baud (8N1, the VBus line settings)
//! - Sync-delimited buffer framing: collecting the bytes between two
//!   0xAA sync bytes into one candidate telegram buffer
//! - Address filtering on raw header bytes before the buffer is decoded
//!
//! The framing logic is generic over [`tokio::io::AsyncBufRead`] so it can
//! be exercised against in-memory byte streams without hardware.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace};

use crate::error::{Result, VbusBridgeError};
use crate::vbus::protocol::VBUS_SYNC_BYTE;

/// VBus baud rate (9,600 baud on the live data line)
pub const VBUS_BAUD_RATE: u32 = 9_600;

/// Minimum candidate length to carry the address fields used for filtering
const MIN_FILTER_LENGTH: usize = 5;

/// Filter applied to telegrams read from the bus
///
/// Source and destination are matched against the raw header bytes while
/// framing; the command can only be trusted after the header checksum has
/// been verified, so callers apply [`PacketFilter::matches_command`] to
/// the decoded packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PacketFilter {
    /// Only accept telegrams from this source address
    #[serde(default)]
    pub source: Option<u16>,

    /// Only accept telegrams to this destination address
    #[serde(default)]
    pub destination: Option<u16>,

    /// Only accept telegrams carrying this command
    #[serde(default)]
    pub command: Option<u16>,
}

impl PacketFilter {
    /// Match the raw address fields of a candidate buffer
    fn matches_addresses(&self, destination: u16, source: u16) -> bool {
        self.source.map_or(true, |wanted| wanted == source)
            && self.destination.map_or(true, |wanted| wanted == destination)
    }

    /// Match the command of a successfully decoded packet
    pub fn matches_command(&self, command: u16) -> bool {
        self.command.map_or(true, |wanted| wanted == command)
    }
}

/// VBus Serial Port Handler
///
/// Manages the connection to the VBus interface adapter.
pub struct VbusSerial {
    /// Buffered serial port handle
    reader: BufReader<tokio_serial::SerialStream>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for VbusSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VbusSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl VbusSerial {
    /// Open a connection to the VBus adapter
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed; VBus runs at [`VBUS_BAUD_RATE`]
    ///
    /// # Returns
    ///
    /// * `Result<VbusSerial>` - Connected serial port or error
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Trying to open serial port: {}", path);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| VbusBridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Successfully opened VBus device at {}", path);

        Ok(Self {
            reader: BufReader::new(port),
            device_path: path.to_string(),
        })
    }

    /// Read the next telegram buffer matching the filter
    ///
    /// Blocks until a matching sync-delimited buffer arrives. The
    /// returned buffer starts with the sync byte and ends just before
    /// the next telegram's sync byte; it has not been decoded yet.
    ///
    /// # Errors
    ///
    /// Returns error if the serial stream ends or a read fails
    pub async fn read_buffer(&mut self, filter: &PacketFilter) -> Result<Vec<u8>> {
        read_delimited_buffer(&mut self.reader, filter).await
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

/// Read sync-delimited buffers from a byte stream until one matches
///
/// Discards bytes up to the next sync byte, then collects candidate
/// buffers (leading sync byte plus everything before the following sync
/// byte). Candidates too short to carry the address fields, and
/// candidates whose addresses fail the filter, are discarded and reading
/// continues with the next telegram.
///
/// # Errors
///
/// Returns [`VbusBridgeError::Serial`] when the stream ends before a
/// matching buffer is complete, and propagates I/O errors from the reader.
pub async fn read_delimited_buffer<R>(reader: &mut R, filter: &PacketFilter) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    // Wait for the start of the next telegram. Data bytes are 7-bit
    // clean, so any 0xAA on the wire is a sync byte.
    let mut scratch = Vec::new();
    let n = reader.read_until(VBUS_SYNC_BYTE, &mut scratch).await?;
    if n == 0 || scratch.last() != Some(&VBUS_SYNC_BYTE) {
        return Err(VbusBridgeError::Serial("serial stream closed".to_string()));
    }

    loop {
        let mut buffer = vec![VBUS_SYNC_BYTE];
        let n = reader.read_until(VBUS_SYNC_BYTE, &mut buffer).await?;
        if n == 0 || buffer.last() != Some(&VBUS_SYNC_BYTE) {
            return Err(VbusBridgeError::Serial("serial stream closed".to_string()));
        }

        // The trailing sync byte belongs to the next telegram
        buffer.pop();

        if buffer.len() < MIN_FILTER_LENGTH {
            trace!("Discarding runt buffer ({} bytes)", buffer.len());
            continue;
        }

        let destination = u16::from_le_bytes([buffer[1], buffer[2]]);
        let source = u16::from_le_bytes([buffer[3], buffer[4]]);

        if !filter.matches_addresses(destination, source) {
            trace!(
                "Discarding telegram from 0x{:04X} to 0x{:04X} (filtered)",
                source,
                destination
            );
            continue;
        }

        debug!(
            "Read telegram buffer from 0x{:04X} to 0x{:04X} ({} bytes)",
            source,
            destination,
            buffer.len()
        );
        return Ok(buffer);
    }
}
