//! # VBus Protocol Constants and Types
//!
//! Core protocol definitions for RESOL VBus telegrams.

use crate::error::VBusError;

/// VBus telegram sync byte (always 0xAA)
pub const VBUS_SYNC_BYTE: u8 = 0xAA;

/// Protocol version 1.0 identifier (the only data-telegram protocol supported)
pub const VBUS_PROTOCOL_1_0: u8 = 0x10;

/// Minimum buffer length to carry the address fields of any telegram
pub const MIN_HEADER_LENGTH: usize = 6;

/// Header length of a protocol 1.0 telegram
/// Structure: sync(1) + destination(2) + source(2) + protocol(1)
///          + command(2) + frame count(1) + checksum(1)
pub const PROTOCOL_1_0_HEADER_LENGTH: usize = 10;

/// Wire length of one frame: 4 data bytes + septet byte + checksum byte
pub const FRAME_LENGTH: usize = 6;

/// Number of payload bytes carried by one frame
pub const FRAME_DATA_LENGTH: usize = 4;

/// Default scale factor for temperature fields (controllers report 0.1 °C steps)
pub const DEFAULT_TEMPERATURE_FACTOR: f64 = 0.1;

/// Validated header of a protocol 1.0 telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Destination address (little-endian on the wire)
    pub destination: u16,

    /// Source address (little-endian on the wire)
    pub source: u16,

    /// Protocol version byte
    pub protocol: u8,

    /// Command (little-endian on the wire, protocol 1.0 only)
    pub command: u16,

    /// Number of 6-byte frames following the header
    pub frame_count: u8,

    /// Header checksum byte as transmitted
    pub checksum: u8,
}

/// A fully decoded VBus telegram
///
/// Holds the validated header and the assembled payload
/// (`frame_count * 4` restored data bytes, in frame order). Packets are
/// immutable once decoded; field extraction reads never modify them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    /// Assemble a packet from a validated header and restored payload
    pub(crate) fn new(header: PacketHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Destination address of the telegram
    pub fn destination(&self) -> u16 {
        self.header.destination
    }

    /// Source address of the telegram
    pub fn source(&self) -> u16 {
        self.header.source
    }

    /// Protocol version byte
    pub fn protocol(&self) -> u8 {
        self.header.protocol
    }

    /// Command of the telegram
    pub fn command(&self) -> u16 {
        self.header.command
    }

    /// Number of frames the telegram carried
    pub fn frame_count(&self) -> u8 {
        self.header.frame_count
    }

    /// Header checksum byte as transmitted
    pub fn header_checksum(&self) -> u8 {
        self.header.checksum
    }

    /// Assembled payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Read an unsigned little-endian integer from the payload
    ///
    /// Byte `k` of the field contributes `payload[offset + k] << (8 * k)`.
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset into the payload
    /// * `size` - Field width in bytes (at most 8)
    ///
    /// # Errors
    ///
    /// Returns [`VBusError::OffsetOutOfRange`] if the field reaches past
    /// the end of the payload or is wider than a `u64` can hold.
    pub fn raw_value(&self, offset: usize, size: usize) -> Result<u64, VBusError> {
        let in_bounds = offset
            .checked_add(size)
            .map_or(false, |end| end <= self.payload.len());

        if !in_bounds || size > std::mem::size_of::<u64>() {
            return Err(VBusError::OffsetOutOfRange {
                offset,
                size,
                payload_len: self.payload.len(),
            });
        }

        let mut value = 0u64;
        for (i, &byte) in self.payload[offset..offset + size].iter().enumerate() {
            value |= (byte as u64) << (8 * i);
        }

        Ok(value)
    }

    /// Read a scaled signed temperature from the payload
    ///
    /// The raw little-endian value is reinterpreted as a two's-complement
    /// integer over `size * 8` bits, then scaled. The scaling rule is
    /// deliberately asymmetric and must stay that way: a factor below 1
    /// divides by its reciprocal, a factor above 1 multiplies, and a
    /// factor of exactly 1 leaves the value unscaled. Downstream field
    /// definitions depend on the exact rounding this produces.
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset into the payload
    /// * `size` - Field width in bytes (at most 8)
    /// * `factor` - Scale factor; controllers typically use
    ///   [`DEFAULT_TEMPERATURE_FACTOR`]
    ///
    /// # Errors
    ///
    /// Returns [`VBusError::OffsetOutOfRange`] under the same conditions
    /// as [`Packet::raw_value`].
    pub fn temperature_value(
        &self,
        offset: usize,
        size: usize,
        factor: f64,
    ) -> Result<f64, VBusError> {
        let raw = self.raw_value(offset, size)?;

        let bits = size as u32 * 8;
        let mut value = raw as i128;
        if bits > 0 && value >= 1i128 << (bits - 1) {
            value -= 1i128 << bits;
        }

        let mut value = value as f64;
        if factor < 1.0 {
            value /= 1.0 / factor;
        } else if factor > 1.0 {
            value *= factor;
        }

        Ok(value)
    }

    /// Read a minutes-since-midnight time field as an `"HH:MM"` string
    ///
    /// The raw value is total minutes; no modulo-24 wraparound is applied,
    /// so values of 1440 minutes and above render hours of 24 and above
    /// (controllers use this for multi-day durations).
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset into the payload
    /// * `size` - Field width in bytes (at most 8)
    ///
    /// # Errors
    ///
    /// Returns [`VBusError::OffsetOutOfRange`] under the same conditions
    /// as [`Packet::raw_value`].
    pub fn time_value(&self, offset: usize, size: usize) -> Result<String, VBusError> {
        let raw = self.raw_value(offset, size)?;

        let hours = raw / 60;
        let minutes = raw % 60;

        Ok(format!("{:02}:{:02}", hours, minutes))
    }
}
