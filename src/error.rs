//! Internal error taxonomy: protocol, resource, integrity and invariant
//! classes, used only inside the crate. The public API stays infallible
//! — [`BootloaderError`] is converted to a NACK code and/or a forced
//! state transition at a single call site rather than handed to the
//! caller.

/// An internal error, categorized by how it must be surfaced.
///
/// `Protocol` and `Resource` carry the NACK code the dispatcher should
/// emit; `Integrity` and `Invariant` have no wire representation and
/// instead force a transition to [`crate::state::BootloaderState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum BootloaderError {
    /// Malformed request or request invalid in the current state
    /// (bad sequence, bad size, wrong state for this packet type).
    Protocol(u8),
    /// Buffer full or flash busy; may escalate to recovery after a
    /// threshold but does not by itself force `ERROR`.
    Resource(u8),
    /// A transfer ended incomplete or otherwise failed integrity
    /// checking. Carries a NACK code when the failure was observed
    /// synchronously in response to a packet (e.g. `END_SESSION` with
    /// bytes outstanding); `None` when raised from background
    /// verification, which has no packet to answer.
    Integrity(Option<u8>),
    /// An illegal state transition was attempted internally.
    Invariant,
}

impl BootloaderError {
    /// NACK code to emit for this error, if it has a wire representation.
    pub fn nack_code(self) -> Option<u8> {
        match self {
            BootloaderError::Protocol(code) | BootloaderError::Resource(code) => Some(code),
            BootloaderError::Integrity(code) => code,
            BootloaderError::Invariant => None,
        }
    }

    /// `true` if this error must force a transition to `ERROR`.
    pub fn forces_error(self) -> bool {
        matches!(
            self,
            BootloaderError::Integrity(_) | BootloaderError::Invariant
        )
    }
}
