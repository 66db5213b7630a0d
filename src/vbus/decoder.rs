//! # VBus Telegram Decoder
//!
//! Decodes complete sync-delimited telegram buffers into [`Packet`]s.

use super::checksum::vbus_checksum;
use super::protocol::*;
use super::septet;
use crate::error::VBusError;

/// Decode a complete VBus telegram buffer
///
/// The buffer must span exactly one telegram, from its leading sync byte
/// to the last frame checksum. Decoding is all-or-nothing: the first
/// header, integrity, or frame failure aborts the whole telegram and no
/// partial packet is returned. Septet restoration happens on private
/// copies of the frame data, so the caller's buffer is never modified.
///
/// # Arguments
///
/// * `buffer` - Complete telegram bytes (sync byte through last frame)
///
/// # Returns
///
/// * `Result<Packet, VBusError>` - Decoded packet, or the first failure
///
/// # Errors
///
/// Returns an error if:
/// - The buffer is empty or does not start with 0xAA
/// - The buffer is too short for its protocol's header
/// - The protocol version is unsupported
/// - The header checksum, declared length, or any frame checksum is wrong
/// - Any byte after the sync byte has its high bit set
///
/// # Examples
///
/// ```
/// use vbus_bridge::vbus::decode;
///
/// let buffer = [
///     0xAA, 0x10, 0x00, 0x21, 0x73, 0x10, 0x00, 0x01,
///     0x01, 0x49, 0x1C, 0x7F, 0x00, 0x00, 0x03, 0x61,
/// ];
/// let packet = decode(&buffer)?;
/// assert_eq!(packet.source(), 0x7321);
/// # Ok::<(), vbus_bridge::error::VBusError>(())
/// ```
pub fn decode(buffer: &[u8]) -> Result<Packet, VBusError> {
    let header = parse_header(buffer)?;

    // Integrity guard over every byte after the sync byte, header and
    // frames alike: the sender strips bit 7 from all of them, so a set
    // MSB here means the input is corrupt. Runs before any restoration.
    for (index, &value) in buffer.iter().enumerate().skip(1) {
        if value & 0x80 != 0 {
            return Err(VBusError::HighBitSet { index, value });
        }
    }

    let mut payload = Vec::with_capacity(header.frame_count as usize * FRAME_DATA_LENGTH);

    for frame in 0..header.frame_count {
        let offset = PROTOCOL_1_0_HEADER_LENGTH + FRAME_LENGTH * frame as usize;
        let data = decode_frame(&buffer[offset..offset + FRAME_LENGTH], frame)?;
        payload.extend_from_slice(&data);
    }

    Ok(Packet::new(header, payload))
}

/// Parse and validate the telegram header
///
/// Failures are checked in a fixed order: sync byte, minimum length,
/// protocol support, protocol header length, header checksum, declared
/// total length.
fn parse_header(buffer: &[u8]) -> Result<PacketHeader, VBusError> {
    if buffer.first() != Some(&VBUS_SYNC_BYTE) {
        return Err(VBusError::SyncByteMismatch);
    }

    if buffer.len() < MIN_HEADER_LENGTH {
        return Err(VBusError::HeaderTooShort { got: buffer.len() });
    }

    let destination = u16::from_le_bytes([buffer[1], buffer[2]]);
    let source = u16::from_le_bytes([buffer[3], buffer[4]]);

    match buffer[5] {
        VBUS_PROTOCOL_1_0 => {}
        protocol => return Err(VBusError::UnsupportedProtocol { protocol }),
    }

    if buffer.len() < PROTOCOL_1_0_HEADER_LENGTH {
        return Err(VBusError::HeaderTooShort { got: buffer.len() });
    }

    let command = u16::from_le_bytes([buffer[6], buffer[7]]);
    let frame_count = buffer[8];
    let checksum = buffer[9];

    let expected = vbus_checksum(&buffer[1..9]);
    if expected != checksum {
        return Err(VBusError::HeaderChecksumMismatch {
            expected,
            got: checksum,
        });
    }

    let expected_length = PROTOCOL_1_0_HEADER_LENGTH + frame_count as usize * FRAME_LENGTH;
    if buffer.len() != expected_length {
        return Err(VBusError::LengthMismatch {
            expected: expected_length,
            got: buffer.len(),
        });
    }

    Ok(PacketHeader {
        destination,
        source,
        protocol: VBUS_PROTOCOL_1_0,
        command,
        frame_count,
        checksum,
    })
}

/// Verify and restore a single 6-byte frame
///
/// The checksum covers the wire-format data bytes plus the septet byte;
/// it is never computed over restored bytes, so verification must happen
/// before restoration.
fn decode_frame(frame: &[u8], index: u8) -> Result<[u8; FRAME_DATA_LENGTH], VBusError> {
    let expected = vbus_checksum(&frame[..FRAME_LENGTH - 1]);
    let got = frame[FRAME_LENGTH - 1];

    if expected != got {
        return Err(VBusError::FrameChecksumMismatch {
            frame: index,
            expected,
            got,
        });
    }

    let mut data = [0u8; FRAME_DATA_LENGTH];
    data.copy_from_slice(&frame[..FRAME_DATA_LENGTH]);
    septet::restore(&mut data, frame[FRAME_DATA_LENGTH]);

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference telegram from a DeltaSol controller: source 0x7321,
    /// one frame carrying a -10.0 °C temperature in its first two bytes.
    const REFERENCE_TELEGRAM: [u8; 16] = [
        0xAA, 0x10, 0x00, 0x21, 0x73, 0x10, 0x00, 0x01, 0x01, 0x49, 0x1C, 0x7F, 0x00, 0x00, 0x03,
        0x61,
    ];

    /// Build a wire-format telegram from raw frame data
    fn build_telegram(destination: u16, source: u16, command: u16, frames: &[[u8; 4]]) -> Vec<u8> {
        let mut buffer = vec![VBUS_SYNC_BYTE];
        buffer.extend_from_slice(&destination.to_le_bytes());
        buffer.extend_from_slice(&source.to_le_bytes());
        buffer.push(VBUS_PROTOCOL_1_0);
        buffer.extend_from_slice(&command.to_le_bytes());
        buffer.push(frames.len() as u8);
        buffer.push(vbus_checksum(&buffer[1..9]));

        for &frame in frames {
            let mut data = frame;
            let septet = septet::strip(&mut data);
            buffer.extend_from_slice(&data);
            buffer.push(septet);
            let body_start = buffer.len() - (FRAME_LENGTH - 1);
            buffer.push(vbus_checksum(&buffer[body_start..]));
        }

        buffer
    }

    #[test]
    fn test_decode_reference_telegram() {
        let packet = decode(&REFERENCE_TELEGRAM).unwrap();

        assert_eq!(packet.destination(), 0x0010);
        assert_eq!(packet.source(), 0x7321);
        assert_eq!(packet.protocol(), VBUS_PROTOCOL_1_0);
        assert_eq!(packet.command(), 0x0100);
        assert_eq!(packet.frame_count(), 1);
        assert_eq!(packet.header_checksum(), 0x49);
        assert_eq!(packet.payload(), &[0x9C, 0xFF, 0x00, 0x00]);

        assert_eq!(packet.temperature_value(0, 2, 0.1).unwrap(), -10.0);
        assert_eq!(packet.raw_value(2, 2).unwrap(), 0);
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert_eq!(decode(&[]), Err(VBusError::SyncByteMismatch));
    }

    #[test]
    fn test_decode_wrong_sync_byte() {
        let buffer = [0x00, 0x10, 0x00, 0x21, 0x73, 0x10];
        assert_eq!(decode(&buffer), Err(VBusError::SyncByteMismatch));
    }

    #[test]
    fn test_decode_header_too_short() {
        let buffer = [0xAA, 0x10, 0x00, 0x21, 0x73];
        assert_eq!(decode(&buffer), Err(VBusError::HeaderTooShort { got: 5 }));
    }

    #[test]
    fn test_decode_protocol_header_too_short() {
        // Long enough for the address fields, too short for the
        // protocol 1.0 header
        let buffer = [0xAA, 0x10, 0x00, 0x21, 0x73, 0x10, 0x00, 0x01];
        assert_eq!(decode(&buffer), Err(VBusError::HeaderTooShort { got: 8 }));
    }

    #[test]
    fn test_decode_unsupported_protocol() {
        let buffer = [0xAA, 0x10, 0x00, 0x21, 0x73, 0x20];
        assert_eq!(
            decode(&buffer),
            Err(VBusError::UnsupportedProtocol { protocol: 0x20 })
        );
    }

    #[test]
    fn test_decode_header_checksum_mismatch() {
        let mut buffer = REFERENCE_TELEGRAM;
        buffer[9] ^= 0x01;

        assert_eq!(
            decode(&buffer),
            Err(VBusError::HeaderChecksumMismatch {
                expected: 0x49,
                got: 0x48,
            })
        );
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut buffer = REFERENCE_TELEGRAM.to_vec();
        buffer.pop();

        assert_eq!(
            decode(&buffer),
            Err(VBusError::LengthMismatch {
                expected: 16,
                got: 15,
            })
        );
    }

    #[test]
    fn test_decode_high_bit_set() {
        let mut buffer = REFERENCE_TELEGRAM;
        buffer[10] |= 0x80;

        assert_eq!(
            decode(&buffer),
            Err(VBusError::HighBitSet {
                index: 10,
                value: 0x9C,
            })
        );
    }

    #[test]
    fn test_decode_frame_checksum_mismatch() {
        // Flipping the stored frame checksum: the computed value stays
        // 0x61, the stored byte is what changed
        let mut buffer = REFERENCE_TELEGRAM;
        buffer[15] = 0x62;

        assert_eq!(
            decode(&buffer),
            Err(VBusError::FrameChecksumMismatch {
                frame: 0,
                expected: 0x61,
                got: 0x62,
            })
        );
    }

    #[test]
    fn test_decode_corrupt_data_byte_fails_frame_checksum() {
        let mut buffer = REFERENCE_TELEGRAM;
        buffer[12] = 0x01;

        assert!(matches!(
            decode(&buffer),
            Err(VBusError::FrameChecksumMismatch { frame: 0, .. })
        ));
    }

    #[test]
    fn test_decode_zero_frame_telegram() {
        let buffer = build_telegram(0x0010, 0x7321, 0x0100, &[]);
        let packet = decode(&buffer).unwrap();

        assert_eq!(packet.frame_count(), 0);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_decode_multi_frame_telegram() {
        let frames = [
            [0x80, 0x00, 0xFF, 0x10],
            [0x12, 0xB4, 0x56, 0xF8],
            [0x00, 0x00, 0x00, 0x00],
        ];
        let buffer = build_telegram(0x0010, 0x7321, 0x0100, &frames);
        let packet = decode(&buffer).unwrap();

        assert_eq!(packet.frame_count(), 3);
        assert_eq!(
            packet.payload(),
            &[0x80, 0x00, 0xFF, 0x10, 0x12, 0xB4, 0x56, 0xF8, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_decode_aborts_on_any_frame_failure() {
        let frames = [[0x01, 0x02, 0x03, 0x04], [0x05, 0x06, 0x07, 0x08]];
        let mut buffer = build_telegram(0x0010, 0x7321, 0x0100, &frames);

        // Corrupt the second frame's stored checksum; no partial packet
        // is produced even though the first frame is intact
        let last = buffer.len() - 1;
        buffer[last] ^= 0x01;

        assert!(matches!(
            decode(&buffer),
            Err(VBusError::FrameChecksumMismatch { frame: 1, .. })
        ));
    }

    #[test]
    fn test_built_telegram_matches_reference() {
        // The test builder reproduces the captured reference telegram
        // byte for byte
        let buffer = build_telegram(0x0010, 0x7321, 0x0100, &[[0x9C, 0xFF, 0x00, 0x00]]);
        assert_eq!(buffer, REFERENCE_TELEGRAM);
    }
}
