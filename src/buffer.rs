//! Fixed-capacity single-producer/single-consumer packet queue.
//!
//! This is the sole decoupling point between packet reception (the
//! transport, possibly running in interrupt context) and packet
//! processing (the cooperative main loop). Slot storage is
//! pre-allocated; [`PacketRingBuffer::enqueue`] and
//! [`PacketRingBuffer::dequeue`] only ever touch lengths and their own
//! single-writer index atomic, never allocate, and never block.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Number of packet slots held by the buffer.
pub const BUFFER_SIZE: usize = 16;

/// Largest raw frame the buffer (and the decoder) will accept.
pub const MAX_PACKET_SIZE: usize = 256;

/// Shortest raw frame accepted: one sequence byte, one type byte.
pub const MIN_PACKET_SIZE: usize = 2;

/// A raw packet frame as handed to [`PacketRingBuffer::enqueue`].
#[derive(Clone, Copy)]
pub struct Packet {
    data: [u8; MAX_PACKET_SIZE],
    len: usize,
}

impl Packet {
    fn empty() -> Self {
        Self {
            data: [0u8; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// The frame bytes actually received, `data[0..len]`.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

struct Slot(UnsafeCell<MaybeUninit<Packet>>);

// SAFETY: a slot at index `i % BUFFER_SIZE` is written only by the
// producer, while `head == i`, and read only by the consumer, while
// `tail == i` and `tail != head`. `head` is written only by the
// producer and `tail` only by the consumer, so the two indices are each
// single-writer; the producer publishes a slot by storing the
// incremented `head` with `Release` ordering only after the slot's
// contents are fully written, and the consumer only reads a slot after
// observing that store with `Acquire` ordering (and symmetrically for
// `tail` freeing a slot back to the producer). Neither side ever
// mutates the other's counter, so there is no read-modify-write race
// between producer and consumer.
unsafe impl Sync for Slot {}

/// Bounded FIFO queue of raw packet frames, safe for exactly one
/// producer (e.g. an ISR) and exactly one consumer (the main loop).
///
/// Occupancy is derived as `head.wrapping_sub(tail)` rather than stored
/// in a separate counter touched by both sides: `head` is written only
/// by [`PacketRingBuffer::enqueue`], `tail` only by
/// [`PacketRingBuffer::dequeue`], so each index has exactly one writer
/// and the two never race on a shared read-modify-write.
pub struct PacketRingBuffer {
    slots: [Slot; BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
    packets_dropped: AtomicU32,
}

impl PacketRingBuffer {
    /// Construct an empty buffer.
    pub const fn new() -> Self {
        // `MaybeUninit` slots: nothing is read until `head`/`tail` say it's there.
        const EMPTY: Slot = Slot(UnsafeCell::new(MaybeUninit::uninit()));
        Self {
            slots: [EMPTY; BUFFER_SIZE],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            packets_dropped: AtomicU32::new(0),
        }
    }

    /// Reset to empty. Does not reset the dropped-packet counter; callers
    /// that want that reset (e.g. bootloader `init()`) do it explicitly.
    pub fn clear(&self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
    }

    /// Reset the dropped-packet counter.
    pub fn reset_dropped(&self) {
        self.packets_dropped.store(0, Ordering::Relaxed);
    }

    /// Number of packets currently buffered.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// `true` if no packets are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total packets dropped for lack of buffer space since the last
    /// [`PacketRingBuffer::reset_dropped`].
    pub fn dropped(&self) -> u32 {
        self.packets_dropped.load(Ordering::Relaxed)
    }

    /// Copy `bytes` into the head slot and publish it, if there is room
    /// and the length is in range. Returns `false` (and counts a drop)
    /// on a full buffer or a malformed (too short/too long) frame.
    ///
    /// Wait-free: bounded work, no allocation, safe to call from
    /// interrupt context as the sole producer.
    pub fn enqueue(&self, bytes: &[u8]) -> bool {
        if bytes.len() < MIN_PACKET_SIZE || bytes.len() > MAX_PACKET_SIZE {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // `head` is ours alone; `tail` belongs to the consumer, so read
        // it with `Acquire` to see slots it has already freed.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= BUFFER_SIZE {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let index = head % BUFFER_SIZE;
        // SAFETY: this slot is not visible to the consumer until `head`
        // is published below, and no other producer exists.
        unsafe {
            let slot = &mut *self.slots[index].0.get();
            let mut packet = Packet::empty();
            packet.data[..bytes.len()].copy_from_slice(bytes);
            packet.len = bytes.len();
            slot.write(packet);
        }

        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Remove and return the oldest buffered packet, if any. FIFO order.
    pub fn dequeue(&self) -> Option<Packet> {
        // `tail` is ours alone; `head` belongs to the producer, so read
        // it with `Acquire` to see slots it has already published.
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head.wrapping_sub(tail) == 0 {
            return None;
        }

        let index = tail % BUFFER_SIZE;
        // SAFETY: `head != tail` means the producer has published this
        // slot, and it will not touch it again until `head` wraps back
        // around to `index`, which cannot happen until this dequeue
        // publishes the freed slot via the `tail` store below.
        let packet = unsafe { (*self.slots[index].0.get()).assume_init() };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(packet)
    }
}

impl Default for PacketRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
