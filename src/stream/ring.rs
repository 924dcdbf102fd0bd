//! Index ring with write, pick and read cursors.
//!
//! Each cursor is a position in `0..2N`: the low part (`pos % N`) is the slot
//! index and `pos >= N` is the wrap flag, which flips every time the cursor
//! passes the end of the slot array. Counts are differences modulo `2N`, so a
//! ring whose cursors sit on the same index but with different flags is full,
//! and all `N` slots are usable.
//!
//! ```text
//!   ri ──────► pi ──────► wi
//!   │ in flight │  ready   │
//!   └──────── valid ───────┘
//! ```
//!
//! Cursor ownership: `wi` is advanced only by the producer (`push`), `pi` only
//! by whoever feeds the DMA (`pick`), `ri` only by the consumer (`pop`). A
//! cursor is published with `Release` after its slot has been written and read
//! with `Acquire` before the slot is touched, so one writer per cursor needs
//! no lock.

use portable_atomic::{AtomicU8, Ordering};

use crate::internal::constants::MAX_RING_DEPTH;

/// Cursor bookkeeping for a ring of `N` slots.
pub struct IndexRing<const N: usize> {
    wr: AtomicU8,
    pk: AtomicU8,
    rd: AtomicU8,
}

/// Point-in-time view of the three cursors as `(index, wrap flag)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RingSnapshot {
    /// Write index
    pub wi: u8,
    /// Write wrap flag
    pub wf: bool,
    /// Pick index
    pub pi: u8,
    /// Pick wrap flag
    pub pf: bool,
    /// Read index
    pub ri: u8,
    /// Read wrap flag
    pub rf: bool,
}

impl<const N: usize> IndexRing<N> {
    const DEPTH_OK: () = assert!(N > 0 && N <= MAX_RING_DEPTH, "ring depth must be 1..=128");

    /// Create an empty ring.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::DEPTH_OK;
        Self {
            wr: AtomicU8::new(0),
            pk: AtomicU8::new(0),
            rd: AtomicU8::new(0),
        }
    }

    /// Number of slots.
    #[inline(always)]
    pub const fn depth(&self) -> usize {
        N
    }

    #[inline(always)]
    const fn next(pos: u8) -> u8 {
        let next = pos as usize + 1;
        if next == 2 * N { 0 } else { next as u8 }
    }

    #[inline(always)]
    const fn distance(from: u8, to: u8) -> usize {
        (to as usize + 2 * N - from as usize) % (2 * N)
    }

    #[inline(always)]
    const fn slot(pos: u8) -> usize {
        pos as usize % N
    }

    /// Nodes pushed and not yet popped.
    #[inline]
    pub fn valid_count(&self) -> usize {
        Self::distance(self.rd.load(Ordering::Acquire), self.wr.load(Ordering::Acquire))
    }

    /// Nodes pushed and not yet picked.
    #[inline]
    pub fn ready_count(&self) -> usize {
        Self::distance(self.pk.load(Ordering::Acquire), self.wr.load(Ordering::Acquire))
    }

    /// Nodes picked and not yet popped.
    #[inline]
    pub fn in_flight_count(&self) -> usize {
        Self::distance(self.rd.load(Ordering::Acquire), self.pk.load(Ordering::Acquire))
    }

    /// Free slots available to `push`.
    #[inline]
    pub fn free_count(&self) -> usize {
        N - self.valid_count()
    }

    /// True when every slot holds a node.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.valid_count() == N
    }

    /// True when no node is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }

    /// Slot the next `push` will fill.
    #[inline]
    pub fn write_slot(&self) -> usize {
        Self::slot(self.wr.load(Ordering::Relaxed))
    }

    /// Slot the next `pick` will take, if any node is ready.
    #[inline]
    pub fn pick_slot(&self) -> Option<usize> {
        (self.ready_count() > 0).then(|| Self::slot(self.pk.load(Ordering::Relaxed)))
    }

    /// Slot the next `pop` will release, if any node is held.
    #[inline]
    pub fn read_slot(&self) -> Option<usize> {
        (self.valid_count() > 0).then(|| Self::slot(self.rd.load(Ordering::Relaxed)))
    }

    /// Slot the next `pop` will release, if that node has been picked.
    #[inline]
    pub fn retire_slot(&self) -> Option<usize> {
        (self.in_flight_count() > 0).then(|| Self::slot(self.rd.load(Ordering::Relaxed)))
    }

    /// Advance the write cursor and return the slot it covered.
    ///
    /// Unconditional: the caller checks [`free_count`](Self::free_count) first.
    pub fn push(&self) -> usize {
        debug_assert!(!self.is_full(), "push into a full ring");
        let pos = self.wr.load(Ordering::Relaxed);
        self.wr.store(Self::next(pos), Ordering::Release);
        Self::slot(pos)
    }

    /// Advance the read cursor; `None` when the ring is empty.
    pub fn pop(&self) -> Option<usize> {
        if self.valid_count() == 0 {
            return None;
        }
        let pos = self.rd.load(Ordering::Relaxed);
        self.rd.store(Self::next(pos), Ordering::Release);
        Some(Self::slot(pos))
    }

    /// Advance the pick cursor; `None` when nothing is ready.
    pub fn pick(&self) -> Option<usize> {
        if self.ready_count() == 0 {
            return None;
        }
        let pos = self.pk.load(Ordering::Relaxed);
        self.pk.store(Self::next(pos), Ordering::Release);
        Some(Self::slot(pos))
    }

    /// Drain the ring logically: read and pick cursors jump to the write cursor.
    pub fn reset(&self) {
        let pos = self.wr.load(Ordering::Acquire);
        self.pk.store(pos, Ordering::Release);
        self.rd.store(pos, Ordering::Release);
    }

    /// Check `ri <= pi <= wi` in ring order.
    pub fn is_ordered(&self) -> bool {
        self.in_flight_count() + self.ready_count() == self.valid_count()
    }

    /// Current cursor positions.
    pub fn snapshot(&self) -> RingSnapshot {
        let split = |pos: u8| (Self::slot(pos) as u8, pos as usize >= N);
        let (wi, wf) = split(self.wr.load(Ordering::Acquire));
        let (pi, pf) = split(self.pk.load(Ordering::Acquire));
        let (ri, rf) = split(self.rd.load(Ordering::Acquire));
        RingSnapshot {
            wi,
            wf,
            pi,
            pf,
            ri,
            rf,
        }
    }
}

impl<const N: usize> Default for IndexRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
