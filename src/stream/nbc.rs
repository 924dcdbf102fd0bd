//! Node buffer containers.
//!
//! A [`NodeContainer`] binds a fixed array of node slots to an [`IndexRing`].
//! The ring decides which slot each operation may touch; the container moves
//! node payloads in and out of those slots.
//!
//! TX nodes carry a caller-owned buffer that is returned on completion. RX
//! nodes carry a heap packet allocated when the node is requested and handed
//! to the user when the DMA fills it.

use alloc::vec::Vec;
use core::cell::UnsafeCell;

use embedded_dma::ReadBuffer;

use super::ring::{IndexRing, RingSnapshot};
use crate::dma::HwDescriptor;
use crate::driver::error::{Error, Result};

/// Fixed-depth ring of node slots.
pub struct NodeContainer<T, const N: usize> {
    ring: IndexRing<N>,
    slots: [UnsafeCell<Option<T>>; N],
}

// SAFETY: a slot is only accessed by the context that owns the cursor
// pointing at it. The producer writes the slot at `wi` before publishing
// `wi`; pickers read the slot at `pi` which the producer will not revisit
// until it is popped; the consumer takes the slot at `ri` before publishing
// `ri`. Payloads cross contexts, hence `T: Send`.
unsafe impl<T: Send, const N: usize> Sync for NodeContainer<T, N> {}

impl<T, const N: usize> NodeContainer<T, N> {
    /// Create an empty container (const, suitable for static initialization).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: IndexRing::new(),
            slots: [const { UnsafeCell::new(None) }; N],
        }
    }

    /// Store a node in the next free slot.
    ///
    /// Returns the slot index, or hands the node back when the ring is full.
    pub fn push(&self, node: T) -> core::result::Result<usize, T> {
        if self.ring.is_full() {
            return Err(node);
        }
        let slot = self.ring.write_slot();
        // SAFETY: the slot at `wi` is outside `ri..wi`, so no other context
        // reads it until `push` publishes the cursor below.
        unsafe { *self.slots[slot].get() = Some(node) };
        self.ring.push();
        Ok(slot)
    }

    /// Build a node for the next free slot and store it.
    ///
    /// `make` receives the slot index. If the ring is full or `make` fails the
    /// ring is left untouched.
    pub fn push_with<F>(&self, make: F) -> Result<usize>
    where
        F: FnOnce(usize) -> Result<T>,
    {
        if self.ring.is_full() {
            return Err(Error::NoMemory);
        }
        let node = make(self.ring.write_slot())?;
        self.push(node).map_err(|_| Error::NoMemory)
    }

    /// Advance the pick cursor and inspect the node it passed.
    pub fn pick_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(usize, &T) -> R,
    {
        let slot = self.ring.pick_slot()?;
        // SAFETY: the slot lies in `pi..wi`, fully written by the producer
        // and not reachable by `pop` before `pi` moves past it.
        let node = unsafe { (*self.slots[slot].get()).as_ref() }?;
        let out = f(slot, node);
        self.ring.pick();
        Some(out)
    }

    /// Release the oldest node that has been picked.
    pub fn retire(&self) -> Option<(usize, T)> {
        let slot = self.ring.retire_slot()?;
        self.take(slot)
    }

    /// Release the oldest node, picked or not.
    pub fn pop(&self) -> Option<(usize, T)> {
        let slot = self.ring.read_slot()?;
        self.take(slot)
    }

    fn take(&self, slot: usize) -> Option<(usize, T)> {
        // SAFETY: the slot is at `ri`; the producer cannot reuse it until the
        // cursor advances below.
        let node = unsafe { (*self.slots[slot].get()).take() };
        self.ring.pop();
        node.map(|n| (slot, n))
    }

    /// Pop every node, handing each to `f`, then reset the cursors.
    ///
    /// Returns how many nodes were drained.
    pub fn drain<F>(&self, mut f: F) -> usize
    where
        F: FnMut(T),
    {
        let mut drained = 0;
        while let Some((_, node)) = self.pop() {
            f(node);
            drained += 1;
        }
        self.ring.reset();
        drained
    }

    /// Nodes held (pushed, not popped).
    pub fn valid(&self) -> usize {
        self.ring.valid_count()
    }

    /// Nodes waiting to be handed to the DMA.
    pub fn ready(&self) -> usize {
        self.ring.ready_count()
    }

    /// Nodes handed to the DMA and not yet released.
    pub fn in_flight(&self) -> usize {
        self.ring.in_flight_count()
    }

    /// Free slots.
    pub fn free(&self) -> usize {
        self.ring.free_count()
    }

    /// Cursor positions, for diagnostics.
    pub fn snapshot(&self) -> RingSnapshot {
        self.ring.snapshot()
    }

    /// Check the `ri <= pi <= wi` ordering.
    pub fn is_ordered(&self) -> bool {
        self.ring.is_ordered()
    }
}

impl<T, const N: usize> Default for NodeContainer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TX nodes
// =============================================================================

/// A caller buffer queued for transmission with its prepared descriptor.
pub struct TxNode<B> {
    pub(crate) buffer: B,
    pub(crate) desc: HwDescriptor,
}

impl<B> TxNode<B> {
    pub(crate) const fn new(buffer: B, desc: HwDescriptor) -> Self {
        Self { buffer, desc }
    }
}

/// Address and length of a caller buffer as seen by the DMA.
pub(crate) fn buffer_span<B>(buffer: &B) -> (u32, usize)
where
    B: ReadBuffer<Word = u8>,
{
    // SAFETY: the buffer is moved into the ring right after this call and
    // stays there until the DMA has finished with it.
    let (ptr, len) = unsafe { buffer.read_buffer() };
    (bus_addr(ptr), len)
}

/// Bus address of a CPU pointer.
#[cfg(not(test))]
#[inline]
fn bus_addr(ptr: *const u8) -> u32 {
    ptr as u32
}

/// Host pointers are wider than the bus. Folding them into the low half of
/// the 32-bit space keeps every buffer inside the host map's SRAM window.
#[cfg(test)]
fn bus_addr(ptr: *const u8) -> u32 {
    (ptr as usize as u32) & 0x7FFF_FFFF
}

// =============================================================================
// RX nodes
// =============================================================================

/// A received packet handed to the user.
///
/// Ownership passes to the user on delivery. Give it back with the owning
/// device's `rx_release` so the stream's in-flight budget is credited.
#[derive(Debug)]
pub struct RxPacket {
    data: Vec<u8>,
    len: usize,
    magic: u32,
}

impl RxPacket {
    /// Allocate a zeroed packet of `size` bytes tagged with `magic`.
    pub(crate) fn allocate(size: usize, magic: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(size)?;
        data.resize(size, 0);
        Ok(Self {
            data,
            len: 0,
            magic,
        })
    }

    /// Bytes filled by the DMA.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Number of bytes filled.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the DMA wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated size.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn magic(&self) -> u32 {
        self.magic
    }

    pub(crate) fn set_filled(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    pub(crate) fn dma_addr(&mut self) -> u32 {
        bus_addr(self.data.as_mut_ptr())
    }

    #[cfg(test)]
    pub(crate) fn as_mut_capacity(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A packet buffer waiting for the DMA to fill it.
pub struct RxNode {
    pub(crate) packet: RxPacket,
    pub(crate) desc: HwDescriptor,
}

// =============================================================================
// Tests
// =============================================================================
