//! The bootloader core: owns the ring buffer, session, state machine and
//! statistics, and drives them from [`Bootloader::process_cycle`].
//!
//! Construct one [`Bootloader`] per device at startup — an owned
//! instance passed explicitly to every entry point, not a module-global
//! singleton — and call [`Bootloader::receive_packet`] from the transport
//! and [`Bootloader::process_cycle`] from the main loop.

use crate::buffer::PacketRingBuffer;
use crate::error::BootloaderError;
use crate::host::{BootloaderHost, Completion};
use crate::packet::{self, decode, DecodedPacket};
use crate::session::SessionDescriptor;
use crate::state::BootloaderState;
use crate::stats::{StatsSnapshot, Statistics};
use crate::verify::{ValidationRecord, Verification, VERIFY_CHUNK_BYTES};

/// Length in bytes of the status frame emitted for `GET_STATUS`.
///
/// Layout (all multi-byte fields big-endian, matching the wire format):
/// `state: u8, session_active: u8, expected_seq: u32, bytes_received: u32,
/// announced_size: u32, packets_processed: u32, packets_dropped: u32,
/// error_count: u32`.
pub const STATUS_FRAME_LEN: usize = 26;

/// Packets dropped for lack of buffer space before the core forces
/// `EMERGENCY_RECOVERY` on its own.
const DROP_ESCALATION_THRESHOLD: u32 = 10;

/// Sequence errors this session before the core forces
/// `EMERGENCY_RECOVERY` on its own.
const SEQ_ERROR_ESCALATION_THRESHOLD: u32 = 5;

/// Owns every piece of bootloader-resident state: the ring buffer, the
/// session descriptor, the state machine, and the statistics. The flash
/// coordinator, clock, and transport are reached through `host`.
pub struct Bootloader<H: BootloaderHost> {
    host: H,
    buffer: PacketRingBuffer,
    state: BootloaderState,
    previous_state: BootloaderState,
    session: SessionDescriptor,
    stats: Statistics,
    force_bootloader_mode: bool,
    state_entry_ms: u32,
    last_activity_ms: u32,
    verification: Option<Verification>,
    validation: Option<ValidationRecord>,
}

impl<H: BootloaderHost> Bootloader<H> {
    /// Construct a bootloader in `IDLE` with zeroed counters. Equivalent
    /// to constructing and then calling [`Bootloader::init`].
    pub fn new(host: H) -> Self {
        let mut this = Self {
            host,
            buffer: PacketRingBuffer::new(),
            state: BootloaderState::Idle,
            previous_state: BootloaderState::Idle,
            session: SessionDescriptor::new(),
            stats: Statistics::default(),
            force_bootloader_mode: false,
            state_entry_ms: 0,
            last_activity_ms: 0,
            verification: None,
            validation: None,
        };
        this.init();
        this
    }

    /// Zero all state and enter `IDLE`. Calling this twice in a row
    /// leaves identical state to calling it once.
    pub fn init(&mut self) {
        let now = self.host.now_ms();
        self.buffer.clear();
        self.buffer.reset_dropped();
        self.state = BootloaderState::Idle;
        self.previous_state = BootloaderState::Idle;
        self.session.clear();
        self.stats.reset_all();
        self.force_bootloader_mode = false;
        self.state_entry_ms = now;
        self.last_activity_ms = now;
        self.verification = None;
        self.validation = None;
    }

    /// Enqueue a raw packet frame for later processing. Wait-free, safe
    /// to call from the transport's interrupt context. Returns `false`
    /// if the buffer is full or the frame length is out of range.
    pub fn receive_packet(&self, bytes: &[u8]) -> bool {
        self.buffer.enqueue(bytes)
    }

    /// One cooperative tick: timeouts, flash poll, background
    /// verification, then drain every packet buffered at cycle start.
    pub fn process_cycle(&mut self) {
        self.evaluate_timeouts();

        match self.host.flash_poll() {
            Completion::JustCompleted(false) => {
                self.log_error(BootloaderError::Integrity(None));
                self.force_error();
            }
            Completion::JustCompleted(true) | Completion::Idle | Completion::Busy => {}
        }

        self.run_verification();

        self.stats.packets_dropped = self.buffer.dropped();
        if self.stats.packets_dropped > DROP_ESCALATION_THRESHOLD
            && self.state != BootloaderState::EmergencyRecovery
        {
            self.log_drop_escalation();
            self.emergency_condition();
        }

        while let Some(packet) = self.buffer.dequeue() {
            self.dispatch_packet(packet.bytes());
        }
    }

    /// Read-only snapshot of counters, state, and buffer occupancy.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state,
            previous_state: self.previous_state,
            session_active: self.session.active,
            bytes_received: self.session.bytes_received,
            announced_size: self.session.announced_size,
            stats: self.stats,
            buffered: self.buffer.len(),
        }
    }

    /// Current state. Exposed mainly for tests; prefer
    /// [`Bootloader::stats_snapshot`] in integration code.
    pub fn state(&self) -> BootloaderState {
        self.state
    }

    /// The most recently produced validation record, if any, from the
    /// last completed `DFU_VERIFY`.
    pub fn last_validation(&self) -> Option<ValidationRecord> {
        self.validation
    }

    /// Borrow the host. Mainly useful for integrators and tests that
    /// need to reach the transport/flash/clock directly (e.g. to assert
    /// on emitted ACK/NACK frames).
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutably borrow the host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // -- state machine -----------------------------------------------

    fn transition(&mut self, target: BootloaderState) {
        // Re-affirming the current state (e.g. a retransmitted
        // `EMERGENCY_RESET` while already in `EMERGENCY_RECOVERY`, or a
        // second flash failure while already in `ERROR`) is a no-op, not
        // an illegal transition: it must not force `ERROR` or re-run
        // entry actions that would double-count counters.
        if target == self.state {
            return;
        }

        let actual = if self.state.is_allowed(target) {
            target
        } else {
            self.log_error(BootloaderError::Invariant);
            BootloaderState::Error
        };
        self.log_transition(actual);
        self.previous_state = self.state;
        self.state = actual;
        self.on_enter(actual);
    }

    /// Emit the NACK a [`BootloaderError`] carries, if any, and force
    /// `ERROR` if the error's class demands it. The single boundary
    /// where internal errors become wire-visible effects; errors never
    /// propagate across the public API.
    fn fail(&mut self, err: BootloaderError) {
        self.log_error(err);
        if let Some(code) = err.nack_code() {
            self.host.send_nack(code);
        }
        if err.forces_error() {
            self.force_error();
        }
    }

    #[cfg(feature = "defmt-03")]
    fn log_transition(&self, target: BootloaderState) {
        if target != self.state {
            defmt::debug!("bootloader: {} -> {}", self.state, target);
        }
    }
    #[cfg(not(feature = "defmt-03"))]
    fn log_transition(&self, _target: BootloaderState) {}

    #[cfg(feature = "defmt-03")]
    fn log_error(&self, err: BootloaderError) {
        defmt::warn!("bootloader error: {}", err);
    }
    #[cfg(not(feature = "defmt-03"))]
    fn log_error(&self, _err: BootloaderError) {}

    #[cfg(feature = "defmt-03")]
    fn log_drop_escalation(&self) {
        defmt::warn!(
            "bootloader: {} packets dropped, forcing recovery",
            self.stats.packets_dropped
        );
    }
    #[cfg(not(feature = "defmt-03"))]
    fn log_drop_escalation(&self) {}

    fn force_error(&mut self) {
        self.transition(BootloaderState::Error);
    }

    fn emergency_condition(&mut self) {
        self.transition(BootloaderState::EmergencyRecovery);
    }

    fn on_enter(&mut self, state: BootloaderState) {
        let now = self.host.now_ms();
        self.state_entry_ms = now;

        match state {
            BootloaderState::Idle => {
                self.session.clear();
                // The sticky recovery mode self-clears on return to IDLE
                // (glossary: "until it self-clears").
                self.force_bootloader_mode = false;
                self.verification = None;
            }
            BootloaderState::DfuActive => {
                self.last_activity_ms = now;
            }
            BootloaderState::DfuVerify => {
                self.verification = Some(Verification::new());
                self.validation = None;
            }
            BootloaderState::RunningApp => {
                self.stats.app_launch_attempts += 1;
            }
            BootloaderState::EmergencyRecovery => {
                self.stats.recovery_attempts += 1;
                self.force_bootloader_mode = true;
            }
            BootloaderState::Error => {
                self.stats.error_count += 1;
            }
        }
    }

    fn evaluate_timeouts(&mut self) {
        let now = self.host.now_ms();
        match self.state {
            BootloaderState::DfuActive => {
                if self.session.active
                    && now.wrapping_sub(self.last_activity_ms) > H::SESSION_TIMEOUT_MS
                {
                    self.force_error();
                }
            }
            BootloaderState::DfuVerify => {
                if now.wrapping_sub(self.state_entry_ms) > H::VERIFY_TIMEOUT_MS {
                    self.force_error();
                }
            }
            BootloaderState::Error => {
                if now.wrapping_sub(self.state_entry_ms) > H::ERROR_RECOVERY_MS {
                    self.transition(BootloaderState::Idle);
                }
            }
            BootloaderState::EmergencyRecovery => {
                if now.wrapping_sub(self.state_entry_ms) > H::EMERGENCY_RECOVERY_MS {
                    self.stats.reset_recovery();
                    self.buffer.reset_dropped();
                    self.transition(BootloaderState::Idle);
                }
            }
            BootloaderState::Idle | BootloaderState::RunningApp => {}
        }
    }

    // -- background verification --------------------------------------

    fn run_verification(&mut self) {
        if self.state != BootloaderState::DfuVerify {
            return;
        }
        let (offset, crc) = match self.verification {
            Some(v) => (v.offset, v.crc),
            None => return,
        };

        let remaining = self.session.bytes_received.saturating_sub(offset);
        if remaining == 0 {
            let calculated = crc.finish();
            let expected = self.session.announced_crc;
            let valid = calculated == expected;
            self.validation = Some(ValidationRecord {
                size: self.session.bytes_received,
                calculated_crc: calculated,
                expected_crc: expected,
                valid,
            });
            self.verification = None;
            if valid {
                self.transition(BootloaderState::RunningApp);
            } else {
                self.log_error(BootloaderError::Integrity(None));
                self.force_error();
            }
            return;
        }

        let chunk = core::cmp::min(remaining, VERIFY_CHUNK_BYTES) as usize;
        let addr = H::APPLICATION_START + offset;
        let advanced = self.host.flash_read(addr, chunk).map(|bytes| {
            let mut crc = crc;
            crc.update(bytes);
            crc
        });

        match advanced {
            Some(new_crc) => {
                self.verification = Some(Verification {
                    crc: new_crc,
                    offset: offset + chunk as u32,
                });
            }
            None => {
                self.verification = None;
                self.log_error(BootloaderError::Integrity(None));
                self.force_error();
            }
        }
    }

    // -- dispatch -------------------------------------------------------

    fn dispatch_packet(&mut self, raw: &[u8]) {
        let decoded = decode(raw);
        self.stats.packets_processed += 1;

        if self.state == BootloaderState::EmergencyRecovery {
            match decoded.packet_type {
                packet::PKT_PING => self.host.send_ack(),
                packet::PKT_EMERGENCY_RESET => self.emergency_condition(),
                _ => self.fail(BootloaderError::Protocol(packet::NACK_RECOVERY_MODE)),
            }
            return;
        }

        match decoded.packet_type {
            packet::PKT_PING => {
                self.host.send_ack();
                return;
            }
            packet::PKT_GET_STATUS => {
                let frame = self.build_status_frame();
                self.host.send_status(&frame);
                self.host.send_ack();
                return;
            }
            packet::PKT_EMERGENCY_RESET => {
                self.emergency_condition();
                return;
            }
            packet::PKT_ABORT => {
                if self.state == BootloaderState::DfuActive {
                    self.transition(BootloaderState::Idle);
                    self.host.send_ack();
                } else {
                    self.fail(BootloaderError::Protocol(packet::NACK_INVALID_STATE));
                }
                return;
            }
            _ => {}
        }

        match self.state {
            BootloaderState::Idle => self.dispatch_idle(&decoded),
            BootloaderState::DfuActive => self.dispatch_dfu_active(&decoded),
            BootloaderState::DfuVerify | BootloaderState::RunningApp | BootloaderState::Error => {
                self.fail(BootloaderError::Protocol(packet::NACK_INVALID_STATE))
            }
            BootloaderState::EmergencyRecovery => unreachable!("handled above"),
        }
    }

    fn dispatch_idle(&mut self, d: &DecodedPacket) {
        match d.packet_type {
            packet::PKT_START_SESSION => {
                if d.payload.len() < 6 {
                    self.fail(BootloaderError::Protocol(packet::NACK_INVALID_PACKET));
                    return;
                }
                if self.force_bootloader_mode {
                    self.fail(BootloaderError::Protocol(packet::NACK_BOOTLOADER_FORCED));
                    return;
                }
                let size = u32::from_be_bytes([
                    d.payload[0],
                    d.payload[1],
                    d.payload[2],
                    d.payload[3],
                ]);
                let crc = u16::from_be_bytes([d.payload[4], d.payload[5]]);
                if size == 0 || size > H::MAX_APPLICATION_SIZE {
                    self.fail(BootloaderError::Protocol(packet::NACK_INVALID_SIZE));
                    return;
                }
                self.session.begin(size, crc);
                self.transition(BootloaderState::DfuActive);
                self.host.send_ack();
            }
            packet::PKT_JUMP_APP => {
                if self.force_bootloader_mode {
                    self.fail(BootloaderError::Protocol(packet::NACK_BOOTLOADER_FORCED));
                } else {
                    self.transition(BootloaderState::DfuVerify);
                    self.host.send_ack();
                }
            }
            _ => self.fail(BootloaderError::Protocol(packet::NACK_INVALID_PACKET)),
        }
    }

    fn dispatch_dfu_active(&mut self, d: &DecodedPacket) {
        match d.packet_type {
            packet::PKT_DATA => {
                if d.seq != (self.session.expected_seq & 0xFF) as u8 {
                    self.fail(BootloaderError::Protocol(packet::NACK_SEQUENCE_ERROR));
                    self.stats.error_count += 1;
                    if self.stats.error_count > SEQ_ERROR_ESCALATION_THRESHOLD {
                        self.emergency_condition();
                    }
                    return;
                }

                let payload_len = d.payload.len() as u32;
                if self.session.bytes_received + payload_len > self.session.announced_size {
                    self.fail(BootloaderError::Protocol(packet::NACK_INVALID_SIZE));
                    return;
                }

                let addr = self.session.next_write_address(H::APPLICATION_START);
                if self.host.flash_begin_write(addr, d.payload) {
                    self.session.accept_data(payload_len);
                    self.last_activity_ms = self.host.now_ms();
                    self.host.send_ack();
                } else {
                    self.fail(BootloaderError::Resource(packet::NACK_FLASH_BUSY));
                }
            }
            packet::PKT_END_SESSION => {
                if self.session.complete() {
                    self.transition(BootloaderState::DfuVerify);
                    self.host.send_ack();
                } else {
                    self.fail(BootloaderError::Integrity(Some(
                        packet::NACK_INCOMPLETE_TRANSFER,
                    )));
                }
            }
            _ => self.fail(BootloaderError::Protocol(packet::NACK_INVALID_TYPE)),
        }
    }

    fn build_status_frame(&self) -> [u8; STATUS_FRAME_LEN] {
        let mut frame = [0u8; STATUS_FRAME_LEN];
        frame[0] = self.state as u8;
        frame[1] = self.session.active as u8;
        frame[2..6].copy_from_slice(&self.session.expected_seq.to_be_bytes());
        frame[6..10].copy_from_slice(&self.session.bytes_received.to_be_bytes());
        frame[10..14].copy_from_slice(&self.session.announced_size.to_be_bytes());
        frame[14..18].copy_from_slice(&self.stats.packets_processed.to_be_bytes());
        frame[18..22].copy_from_slice(&self.stats.packets_dropped.to_be_bytes());
        frame[22..26].copy_from_slice(&self.stats.error_count.to_be_bytes());
        frame
    }
}
