//! Background image verification: the CRC accumulator driven one chunk
//! per `process_cycle`, and the validation record produced when it
//! finishes.

use crate::crc16::Crc16;

/// How many bytes of flash are read back and folded into the running
/// CRC per `process_cycle`, bounding the background work's per-cycle cost.
pub const VERIFY_CHUNK_BYTES: u32 = 256;

/// In-progress verification state, created on entry to `DFU_VERIFY`.
#[derive(Debug, Clone, Copy)]
pub struct Verification {
    pub(crate) crc: Crc16,
    pub(crate) offset: u32,
}

impl Verification {
    pub fn new() -> Self {
        Self {
            crc: Crc16::new(),
            offset: 0,
        }
    }
}

impl Default for Verification {
    fn default() -> Self {
        Self::new()
    }
}

/// Produced at the end of verification; read once on the transition out
/// of `DFU_VERIFY`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ValidationRecord {
    /// Bytes covered by the checksum (the session's `bytes_received`).
    pub size: u32,
    /// CRC-16/CCITT-FALSE computed over the staged image.
    pub calculated_crc: u16,
    /// CRC announced by `START_SESSION`.
    pub expected_crc: u16,
    /// `calculated_crc == expected_crc`.
    pub valid: bool,
}
