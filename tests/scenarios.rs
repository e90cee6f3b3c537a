//! End-to-end scenarios, one per named case.

mod helpers;

use bootloader_dfu_core::crc16::crc16;
use bootloader_dfu_core::packet::*;
use bootloader_dfu_core::{Bootloader, BootloaderState};
use helpers::{frame, pump, start_session_payload, MockHost};

fn new_bootloader() -> Bootloader<MockHost> {
    Bootloader::new(MockHost::new())
}

#[test]
fn happy_path_session_completes_and_launches() {
    let mut bl = new_bootloader();

    let chunk_a: Vec<u8> = (0..256u32).map(|i| (10 + i) as u8).collect();
    let chunk_b: Vec<u8> = (0..256u32).map(|i| (20 + i) as u8).collect();
    let mut whole = chunk_a.clone();
    whole.extend_from_slice(&chunk_b);
    let announced_crc = crc16(&whole);

    assert!(bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, announced_crc)
    )));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::DfuActive);
    assert_eq!(bl.host().acks, 1);

    assert!(bl.receive_packet(&frame(1, PKT_DATA, &chunk_a)));
    pump(&mut bl, 2);
    assert!(bl.receive_packet(&frame(2, PKT_DATA, &chunk_b)));
    pump(&mut bl, 2);
    assert_eq!(bl.host().acks, 3);

    assert!(bl.receive_packet(&frame(3, PKT_END_SESSION, &[])));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::DfuVerify);
    assert_eq!(bl.host().acks, 4);

    // Background verification reads back in VERIFY_CHUNK_BYTES-sized
    // chunks; bound the pump generously so the test fails fast instead
    // of hanging if verification never converges.
    for _ in 0..16 {
        if bl.state() != BootloaderState::DfuVerify {
            break;
        }
        pump(&mut bl, 1);
    }
    assert_eq!(bl.state(), BootloaderState::RunningApp);

    let validation = bl.last_validation().expect("validation record");
    assert!(validation.valid);
    assert_eq!(validation.size, 512);

    let snap = bl.stats_snapshot();
    assert_eq!(snap.stats.packets_processed, 4); // START, DATA, DATA, END
    assert_eq!(snap.stats.app_launch_attempts, 1);
    assert_eq!(snap.stats.error_count, 0);
    assert!(bl.host().nacks.is_empty());
}

#[test]
fn sequence_error_nacks_and_preserves_expected_seq() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, 0x1234),
    ));
    pump(&mut bl, 1);

    let payload = vec![0u8; 256];
    assert!(bl.receive_packet(&frame(1, PKT_DATA, &payload)));
    pump(&mut bl, 2);
    assert_eq!(bl.stats_snapshot().stats.error_count, 0);

    // Next DATA should carry seq=2; send seq=3 instead.
    assert!(bl.receive_packet(&frame(3, PKT_DATA, &payload)));
    pump(&mut bl, 1);

    assert_eq!(bl.stats_snapshot().stats.error_count, 1);
    assert_eq!(bl.state(), BootloaderState::DfuActive);
    assert_eq!(bl.host().nacks.last(), Some(&NACK_SEQUENCE_ERROR));
}

#[test]
fn buffer_overflow_drops_excess_packets() {
    let mut bl = new_bootloader();

    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..20u8 {
        if bl.receive_packet(&frame(i, PKT_DATA, &[0xAA, 0xBB])) {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }

    assert_eq!(accepted, 16); // BUFFER_SIZE
    assert_eq!(rejected, 4);

    pump(&mut bl, 1);
    assert_eq!(bl.stats_snapshot().stats.packets_dropped, 4);
}

#[test]
fn emergency_reset_enters_recovery_and_self_clears() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, 0x1234),
    ));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::DfuActive);

    bl.receive_packet(&frame(0, PKT_EMERGENCY_RESET, &[]));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::EmergencyRecovery);

    // Normal DFU entry is rejected while force-held.
    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, 0x1234),
    ));
    pump(&mut bl, 1);
    assert_eq!(bl.host().nacks.last(), Some(&NACK_RECOVERY_MODE));

    // Advance past EMERGENCY_RECOVERY_MS (10_000) and let it self-clear.
    bl.host_mut().advance(10_001);
    pump(&mut bl, 1);

    assert_eq!(bl.state(), BootloaderState::Idle);
    assert_eq!(bl.stats_snapshot().stats.packets_dropped, 0);
    assert_eq!(bl.stats_snapshot().stats.error_count, 0);
}

#[test]
fn repeated_emergency_reset_stays_in_recovery() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(0, PKT_EMERGENCY_RESET, &[]));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::EmergencyRecovery);
    let after_first = bl.stats_snapshot();

    // A retransmitted EMERGENCY_RESET (EMERGENCY_RESET never ACKs, so a
    // host may legitimately resend it) must re-affirm recovery mode, not
    // be treated as an illegal self-transition that forces ERROR.
    bl.receive_packet(&frame(0, PKT_EMERGENCY_RESET, &[]));
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::EmergencyRecovery);

    let after_second = bl.stats_snapshot();
    assert_eq!(after_second.stats.error_count, 0);
    assert_eq!(
        after_second.stats.recovery_attempts,
        after_first.stats.recovery_attempts
    );
}

#[test]
fn incomplete_transfer_nacks_then_recovers_to_idle() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, 0x1234),
    ));
    pump(&mut bl, 1);

    let half = vec![0u8; 256];
    bl.receive_packet(&frame(1, PKT_DATA, &half));
    pump(&mut bl, 2);

    bl.receive_packet(&frame(2, PKT_END_SESSION, &[]));
    pump(&mut bl, 1);

    assert_eq!(bl.host().nacks.last(), Some(&NACK_INCOMPLETE_TRANSFER));
    assert_eq!(bl.state(), BootloaderState::Error);
    assert_eq!(
        bl.stats_snapshot().stats.error_count,
        1,
        "entering ERROR increments error_count once"
    );

    bl.host_mut().advance(5_001);
    pump(&mut bl, 1);
    assert_eq!(bl.state(), BootloaderState::Idle);
}

#[test]
fn invalid_size_start_session_is_nacked() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(0, 0x1234),
    ));
    pump(&mut bl, 1);

    assert_eq!(bl.state(), BootloaderState::Idle);
    assert_eq!(bl.host().nacks.last(), Some(&NACK_INVALID_SIZE));
}

#[test]
fn flash_busy_nacks_without_consuming_sequence() {
    let mut bl = new_bootloader();

    bl.receive_packet(&frame(
        0,
        PKT_START_SESSION,
        &start_session_payload(512, 0x1234),
    ));
    pump(&mut bl, 1);

    bl.host_mut().reject_next_write = true;
    let payload = vec![0u8; 256];
    bl.receive_packet(&frame(1, PKT_DATA, &payload));
    pump(&mut bl, 1);

    assert_eq!(bl.host().nacks.last(), Some(&NACK_FLASH_BUSY));
    assert_eq!(bl.stats_snapshot().stats.error_count, 0);

    // Sender retries the same sequence number; this time flash accepts.
    bl.receive_packet(&frame(1, PKT_DATA, &payload));
    pump(&mut bl, 2);
    assert_eq!(bl.stats_snapshot().stats.packets_dropped, 0);
}
