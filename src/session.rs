//! Per-session transfer state: expected sequence, cumulative bytes,
//! announced size and CRC.
//!
//! Invariants:
//!
//! * **S1** `bytes_received <= announced_size` at all times.
//! * **S2** `expected_seq - 1 == number of DATA packets accepted this session`.
//! * **S3** `active == true` implies the bootloader is in `DFU_ACTIVE` or
//!   `DFU_VERIFY` (enforced by the state machine, not by this struct).

/// Per-session descriptor. Lives for the duration of one transfer, from
/// `START_SESSION` through `END_SESSION` (or an abort/error).
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SessionDescriptor {
    /// Announced total firmware size in bytes, `0 < size <= MAX_APPLICATION_SIZE`.
    pub announced_size: u32,
    /// Announced CRC-16/CCITT-FALSE of the complete image.
    pub announced_crc: u16,
    /// Sequence number the next `DATA` packet must carry. `0` when idle.
    pub expected_seq: u32,
    /// Cumulative payload bytes successfully handed to flash this session.
    pub bytes_received: u32,
    /// `true` for the duration of `DFU_ACTIVE`/`DFU_VERIFY`.
    pub active: bool,
}

impl SessionDescriptor {
    /// No session in progress.
    pub const fn new() -> Self {
        Self {
            announced_size: 0,
            announced_crc: 0,
            expected_seq: 0,
            bytes_received: 0,
            active: false,
        }
    }

    /// Clear all session fields (entry action for `IDLE`).
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Begin a session (entry action for `DFU_ACTIVE`): first `DATA`
    /// packet must carry sequence `1`.
    pub fn begin(&mut self, announced_size: u32, announced_crc: u16) {
        self.announced_size = announced_size;
        self.announced_crc = announced_crc;
        self.expected_seq = 1;
        self.bytes_received = 0;
        self.active = true;
    }

    /// Record a successfully flashed `DATA` packet. Caller has already
    /// verified `seq == expected_seq` and that `bytes_received +
    /// payload_len <= announced_size`.
    pub fn accept_data(&mut self, payload_len: u32) {
        self.bytes_received += payload_len;
        self.expected_seq += 1;
    }

    /// `true` if every announced byte has arrived.
    pub fn complete(&self) -> bool {
        self.bytes_received == self.announced_size
    }

    /// Flash address the next `DATA` payload should be written to.
    pub fn next_write_address(&self, application_start: u32) -> u32 {
        application_start + self.bytes_received
    }
}
