#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Firmware-update (DFU) core for a microcontroller bootloader.
//!
//! This crate implements the protocol-level core of a bootloader: a
//! strictly-guarded state machine (idle / transfer / verify / execute /
//! recovery / error), a fixed-capacity single-producer/single-consumer
//! packet ring buffer decoupling reception from processing, and a
//! transfer session protocol that tracks sequence numbers and cumulative
//! bytes against an announced size and CRC.
//!
//! ## Scope
//!
//! The physical transport (UART/USB/CAN framer), the flash driver
//! (erase/program/read primitives), the ACK/NACK transport encoding, the
//! wall-clock/tick source, and the jump-to-application trampoline are
//! all external collaborators. The integrator implements
//! [`BootloaderHost`] once, and the core drives it from
//! [`Bootloader::process_cycle`].
//!
//! There is no signature verification (checksum only), no resumable
//! transfers across power cycles (sessions are memory-resident), and no
//! concurrent multi-client sessions.
//!
//! ## Example
//!
//! ```
//! use bootloader_dfu_core::{Bootloader, BootloaderHost, Completion};
//!
//! struct MyHost {
//!     tick: u32,
//!     flash: [u8; 1024],
//! }
//!
//! impl BootloaderHost for MyHost {
//!     const APPLICATION_START: u32 = 0;
//!     const MAX_APPLICATION_SIZE: u32 = 1024;
//!
//!     fn now_ms(&mut self) -> u32 {
//!         self.tick
//!     }
//!
//!     fn flash_begin_write(&mut self, address: u32, bytes: &[u8]) -> bool {
//!         let offset = address as usize;
//!         self.flash[offset..offset + bytes.len()].copy_from_slice(bytes);
//!         true
//!     }
//!
//!     fn flash_poll(&mut self) -> Completion {
//!         Completion::JustCompleted(true)
//!     }
//!
//!     fn flash_read(&mut self, address: u32, length: usize) -> Option<&[u8]> {
//!         let offset = address as usize;
//!         Some(&self.flash[offset..offset + length])
//!     }
//!
//!     fn send_ack(&mut self) {}
//!     fn send_nack(&mut self, _code: u8) {}
//!     fn send_status(&mut self, _frame: &[u8]) {}
//! }
//!
//! let mut bl = Bootloader::new(MyHost { tick: 0, flash: [0; 1024] });
//! bl.receive_packet(&[0, 0x05]); // PING
//! bl.process_cycle();
//! ```

pub mod buffer;
pub mod crc16;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod packet;
pub mod session;
pub mod state;
pub mod stats;
pub mod verify;

#[doc(inline)]
pub use crate::dispatch::Bootloader;
#[doc(inline)]
pub use crate::error::BootloaderError;
#[doc(inline)]
pub use crate::host::{BootloaderHost, Completion};
#[doc(inline)]
pub use crate::state::BootloaderState;
#[doc(inline)]
pub use crate::stats::{StatsSnapshot, Statistics};
