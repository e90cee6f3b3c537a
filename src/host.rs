//! Capabilities the bootloader core expects the host platform to provide.
//!
//! The core never touches a register, a transport, or a clock directly.
//! Everything it needs from the outside world — the millisecond tick,
//! the flash program/erase primitives, and the ACK/NACK/status emitters —
//! is gathered into a single [`BootloaderHost`] implementation that the
//! integrator writes once and hands to [`crate::Bootloader::new`].

/// Result of polling the flash coordinator.
///
/// The core calls [`BootloaderHost::flash_poll`] at the top of every
/// `process_cycle` and reacts to the return value; it never blocks
/// waiting for a write to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Completion {
    /// No operation outstanding.
    Idle,
    /// An operation is still in progress.
    Busy,
    /// An operation finished since the last poll. `true` if it succeeded.
    JustCompleted(bool),
}

/// Host-provided capabilities: clock, flash, and packet acknowledgement.
///
/// Associated constants carry the timeouts and flash geometry; their
/// defaults are sane starting points so an integrator only needs to
/// override what differs for their target.
pub trait BootloaderHost {
    /// Start address of the writable application region.
    const APPLICATION_START: u32 = 0x0800_8000;

    /// Size in bytes of the application region. `announced_size` in a
    /// `START_SESSION` request must fall in `0 < size <= MAX_APPLICATION_SIZE`.
    const MAX_APPLICATION_SIZE: u32 = 1024 * 1024;

    /// Informative: smallest erasable unit, for implementers choosing
    /// write granularity. The core does not enforce alignment to this
    /// value itself; that is the flash driver's job.
    const FLASH_PAGE_SIZE: u32 = 2048;

    /// `DFU_ACTIVE` inactivity timeout in milliseconds before forcing `ERROR`.
    const SESSION_TIMEOUT_MS: u32 = 30_000;

    /// `DFU_VERIFY` timeout in milliseconds before forcing `ERROR`.
    const VERIFY_TIMEOUT_MS: u32 = 5_000;

    /// Time spent in `ERROR` before auto-transitioning to `IDLE`.
    const ERROR_RECOVERY_MS: u32 = 5_000;

    /// Time spent in `EMERGENCY_RECOVERY` before auto-transitioning to `IDLE`.
    const EMERGENCY_RECOVERY_MS: u32 = 10_000;

    /// Monotonic milliseconds, wrap-safe when compared with wrapping subtraction.
    fn now_ms(&mut self) -> u32;

    /// Start an asynchronous page program. Returns `false` if flash is
    /// already busy, or if `[address, address + bytes.len())` falls
    /// outside the application region. Non-blocking.
    fn flash_begin_write(&mut self, address: u32, bytes: &[u8]) -> bool;

    /// Poll for completion of the outstanding flash operation, if any.
    fn flash_poll(&mut self) -> Completion;

    /// Start an asynchronous page erase. Optional: hosts that erase on
    /// write, or that never erase through this interface, may leave the
    /// default (always rejects).
    fn flash_begin_erase(&mut self, _address: u32) -> bool {
        false
    }

    /// Read back previously-written application bytes, for CRC
    /// verification in `DFU_VERIFY`. Must return exactly `length` bytes
    /// starting at `address`, or `None` if the read cannot be serviced.
    fn flash_read(&mut self, address: u32, length: usize) -> Option<&[u8]>;

    /// Emit an ACK frame on the transport.
    fn send_ack(&mut self);

    /// Emit a NACK frame carrying the given error code.
    fn send_nack(&mut self, code: u8);

    /// Emit a status frame (see [`crate::dispatch::STATUS_FRAME_LEN`]),
    /// ahead of the ACK that always follows a `GET_STATUS` request.
    fn send_status(&mut self, frame: &[u8]);
}
