//! Monotonic counters and the read-only snapshot exposed to callers.

use crate::state::BootloaderState;

/// Bootloader-owned counters. All are monotonic except across two
/// resets: entry to `IDLE` from `EMERGENCY_RECOVERY` (drops/errors only)
/// and `init()` (everything).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Statistics {
    /// Packets successfully dequeued and dispatched.
    pub packets_processed: u32,
    /// Packets rejected by the ring buffer for lack of space or malformed length.
    pub packets_dropped: u32,
    /// Protocol/sequence/invariant errors observed.
    pub error_count: u32,
    /// Number of times `EMERGENCY_RECOVERY` was entered.
    pub recovery_attempts: u32,
    /// Number of times `RUNNING_APP` was entered.
    pub app_launch_attempts: u32,
}

impl Statistics {
    /// Zero all counters (`init()`).
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Zero only the drop/error counters (`EMERGENCY_RECOVERY` -> `IDLE`).
    pub fn reset_recovery(&mut self) {
        self.packets_dropped = 0;
        self.error_count = 0;
    }
}

/// Read-only point-in-time view of the bootloader's counters and state,
/// returned by `Bootloader::stats_snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Current bootloader state.
    pub state: BootloaderState,
    /// State the bootloader was in before the most recent transition.
    pub previous_state: BootloaderState,
    /// `true` if a transfer session is in progress.
    pub session_active: bool,
    /// Cumulative payload bytes accepted this session (0 when none active).
    pub bytes_received: u32,
    /// Announced total size of the in-progress transfer, if any.
    pub announced_size: u32,
    /// Counters as of this snapshot.
    pub stats: Statistics,
    /// Packets currently buffered and awaiting dispatch.
    pub buffered: usize,
}
