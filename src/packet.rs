//! Wire header decode: packet types, NACK codes, and header parsing.
//!
//! A raw frame is `[sequence, type, payload...]`. This module turns that
//! into a [`DecodedPacket`]; everything past the header is an opaque
//! payload slice, type-specific parsing (e.g. `START_SESSION`'s size/CRC
//! fields) happens in [`crate::dispatch`].

/// `START_SESSION`: 4-byte big-endian size, 2-byte big-endian CRC.
pub const PKT_START_SESSION: u8 = 0x01;
/// `DATA`: firmware bytes.
pub const PKT_DATA: u8 = 0x02;
/// `END_SESSION`: empty payload.
pub const PKT_END_SESSION: u8 = 0x03;
/// `ABORT`: empty payload.
pub const PKT_ABORT: u8 = 0x04;
/// `PING`: empty payload.
pub const PKT_PING: u8 = 0x05;
/// `GET_STATUS`: empty payload.
pub const PKT_GET_STATUS: u8 = 0x06;
/// `JUMP_APP`: empty payload.
pub const PKT_JUMP_APP: u8 = 0x07;
/// `EMERGENCY_RESET`: empty payload.
pub const PKT_EMERGENCY_RESET: u8 = 0x08;
/// `GET_VERSION`: empty payload.
pub const PKT_GET_VERSION: u8 = 0x09;

/// NACK: invalid packet.
pub const NACK_INVALID_PACKET: u8 = 0x01;
/// NACK: sequence error.
pub const NACK_SEQUENCE_ERROR: u8 = 0x02;
/// NACK: flash busy.
pub const NACK_FLASH_BUSY: u8 = 0x03;
/// NACK: invalid type for the current state (`DFU_ACTIVE`).
pub const NACK_INVALID_TYPE: u8 = 0x04;
/// NACK: invalid announced size.
pub const NACK_INVALID_SIZE: u8 = 0x05;
/// NACK: incomplete transfer at `END_SESSION`.
pub const NACK_INCOMPLETE_TRANSFER: u8 = 0x08;
/// NACK: rejected while in `EMERGENCY_RECOVERY`.
pub const NACK_RECOVERY_MODE: u8 = 0x10;
/// NACK: invalid in the current state.
pub const NACK_INVALID_STATE: u8 = 0x11;
/// NACK: rejected because the bootloader is force-held (post-recovery).
pub const NACK_BOOTLOADER_FORCED: u8 = 0x12;

/// A decoded packet header plus its payload slice, borrowed from the
/// dequeued frame.
pub struct DecodedPacket<'a> {
    /// Per-session sequence tag, byte 0 of the frame.
    pub seq: u8,
    /// Packet type tag, byte 1 of the frame.
    pub packet_type: u8,
    /// Bytes 2.. of the frame. Empty for fixed-no-payload types.
    pub payload: &'a [u8],
}

/// Parse `bytes` (already known to satisfy `2 <= bytes.len() <=
/// MAX_PACKET_SIZE` by ring-buffer construction) into a header and
/// payload slice.
pub fn decode(bytes: &[u8]) -> DecodedPacket<'_> {
    DecodedPacket {
        seq: bytes[0],
        packet_type: bytes[1],
        payload: &bytes[2..],
    }
}
