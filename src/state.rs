//! Bootloader states, the guarded transition table, and entry actions.
//!
//! Any transition not listed in [`BootloaderState::is_allowed`] is
//! fatal: the caller is expected to force [`BootloaderState::Error`]
//! directly rather than recurse into this module again. A transition
//! whose target equals the current state is handled separately, as a
//! harmless no-op, before this table is ever consulted (see
//! `Bootloader::transition`) — re-affirming the current state (a
//! retransmitted `EMERGENCY_RESET`, a second flash failure while
//! already in `ERROR`) must not be punished as if it were illegal.

/// Bootloader phase.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum BootloaderState {
    /// Waiting for a session to start, or for `JUMP_APP`/`RUNNING_APP`.
    Idle = 0,
    /// A transfer is in progress; accepting `DATA`/`END_SESSION`.
    DfuActive = 1,
    /// Transfer complete; background CRC verification is running.
    DfuVerify = 2,
    /// Verification succeeded; the application would be launched here.
    RunningApp = 3,
    /// Sticky recovery mode: only `PING`/`EMERGENCY_RESET` are honored.
    EmergencyRecovery = 4,
    /// An unrecoverable condition occurred; self-heals to `Idle`.
    Error = 5,
}

impl BootloaderState {
    /// `true` if `target` is a permitted transition from `self`.
    pub fn is_allowed(self, target: BootloaderState) -> bool {
        use BootloaderState::*;
        matches!(
            (self, target),
            (Idle, DfuActive)
                | (Idle, RunningApp)
                | (Idle, EmergencyRecovery)
                | (Idle, Error)
                | (DfuActive, DfuVerify)
                | (DfuActive, Idle)
                | (DfuActive, EmergencyRecovery)
                | (DfuActive, Error)
                | (DfuVerify, RunningApp)
                | (DfuVerify, Idle)
                | (DfuVerify, EmergencyRecovery)
                | (DfuVerify, Error)
                | (RunningApp, Idle)
                | (RunningApp, EmergencyRecovery)
                | (RunningApp, Error)
                | (EmergencyRecovery, Idle)
                | (EmergencyRecovery, Error)
                | (Error, Idle)
                | (Error, EmergencyRecovery)
        )
    }
}

impl Default for BootloaderState {
    fn default() -> Self {
        BootloaderState::Idle
    }
}
