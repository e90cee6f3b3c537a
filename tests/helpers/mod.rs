#![allow(dead_code)]
//! A bare-bones [`BootloaderHost`] for driving the core from tests: a
//! small in-memory flash array, a caller-controlled tick, and vectors
//! capturing every ACK/NACK/status frame emitted.

use bootloader_dfu_core::{BootloaderHost, Completion};

pub const APPLICATION_START: u32 = 0x1000;
pub const MAX_APPLICATION_SIZE: u32 = 8192;

pub struct MockHost {
    pub tick_ms: u32,
    flash: Vec<u8>,
    busy: bool,
    pending_ok: bool,
    pub reject_next_write: bool,
    pub acks: u32,
    pub nacks: Vec<u8>,
    pub status_frames: Vec<Vec<u8>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            tick_ms: 0,
            flash: vec![0u8; MAX_APPLICATION_SIZE as usize],
            busy: false,
            pending_ok: true,
            reject_next_write: false,
            acks: 0,
            nacks: Vec::new(),
            status_frames: Vec::new(),
        }
    }

    pub fn advance(&mut self, ms: u32) {
        self.tick_ms = self.tick_ms.wrapping_add(ms);
    }

    pub fn written_bytes(&self, address: u32, len: usize) -> &[u8] {
        let offset = (address - APPLICATION_START) as usize;
        &self.flash[offset..offset + len]
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BootloaderHost for MockHost {
    const APPLICATION_START: u32 = APPLICATION_START;
    const MAX_APPLICATION_SIZE: u32 = MAX_APPLICATION_SIZE;

    fn now_ms(&mut self) -> u32 {
        self.tick_ms
    }

    fn flash_begin_write(&mut self, address: u32, bytes: &[u8]) -> bool {
        if self.busy {
            return false;
        }
        if self.reject_next_write {
            self.reject_next_write = false;
            return false;
        }
        let start = Self::APPLICATION_START;
        let end = start + Self::MAX_APPLICATION_SIZE;
        if address < start || address as u64 + bytes.len() as u64 > end as u64 {
            return false;
        }
        let offset = (address - start) as usize;
        self.flash[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.busy = true;
        self.pending_ok = true;
        true
    }

    fn flash_poll(&mut self) -> Completion {
        if self.busy {
            self.busy = false;
            Completion::JustCompleted(self.pending_ok)
        } else {
            Completion::Idle
        }
    }

    fn flash_read(&mut self, address: u32, length: usize) -> Option<&[u8]> {
        let start = Self::APPLICATION_START;
        if address < start {
            return None;
        }
        let offset = (address - start) as usize;
        if offset + length > self.flash.len() {
            return None;
        }
        Some(&self.flash[offset..offset + length])
    }

    fn send_ack(&mut self) {
        self.acks += 1;
    }

    fn send_nack(&mut self, code: u8) {
        self.nacks.push(code);
    }

    fn send_status(&mut self, frame: &[u8]) {
        self.status_frames.push(frame.to_vec());
    }
}

/// Build a raw frame: `[seq, packet_type, ..payload]`.
pub fn frame(seq: u8, packet_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![seq, packet_type];
    bytes.extend_from_slice(payload);
    bytes
}

/// `START_SESSION` payload: big-endian size then big-endian CRC.
pub fn start_session_payload(size: u32, crc: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(6);
    payload.extend_from_slice(&size.to_be_bytes());
    payload.extend_from_slice(&crc.to_be_bytes());
    payload
}

/// Run `cycles` `process_cycle`s back to back, for carrying background
/// work (flash completion, verification) to completion in tests.
pub fn pump<H: BootloaderHost>(bl: &mut bootloader_dfu_core::Bootloader<H>, cycles: usize) {
    for _ in 0..cycles {
        bl.process_cycle();
    }
}
