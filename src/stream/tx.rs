//! Transmit path.
//!
//! Caller buffers are moved into the TX ring by [`TxPath::submit`] and come
//! back through [`TxCallback::on_tx_done`] in submission order, either when
//! the DMA finished reading them or when the stream is stopped.
//!
//! The descriptor for a buffer is built at submit time, so an address or
//! alignment problem is reported to the caller synchronously and the buffer
//! is handed straight back.

use embedded_dma::ReadBuffer;
use embedded_hal::delay::DelayNs;

use super::link::{Binding, Link, Wiring};
use super::nbc::{NodeContainer, TxNode, buffer_span};
use super::ring::RingSnapshot;
use crate::dma::{Channel, Completion, DmaCallback, DmaMode, Transfer};
use crate::driver::error::{Error, Rejected, Result, SubmitResult};
use crate::hal::port::StreamDir;
use crate::sync::CriticalSectionCell;

/// How a transmit buffer left the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// The DMA read the whole buffer
    Done,
    /// The stream was stopped first
    Aborted,
}

/// Receives transmit buffers back.
///
/// Runs in interrupt context for [`TxStatus::Done`] and in the caller of
/// `stop` for [`TxStatus::Aborted`].
pub trait TxCallback<B>: Sync {
    /// Ownership of `buffer` returns to the application.
    fn on_tx_done(&self, buffer: B, status: TxStatus);
}

/// Transmit direction of a streaming peripheral.
pub struct TxPath<B: 'static, const N: usize> {
    nbc: NodeContainer<TxNode<B>, N>,
    link: Link,
    callback: CriticalSectionCell<Option<&'static dyn TxCallback<B>>>,
}

impl<B, const N: usize> TxPath<B, N>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    /// Create a detached path (const, suitable for static initialization).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nbc: NodeContainer::new(),
            link: Link::new(StreamDir::Tx),
            callback: CriticalSectionCell::new(None),
        }
    }

    /// Reserve a DMA channel and register this path as its owner.
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`] if already attached, [`Error::Busy`] if no
    /// channel frees up within `timeout_us`.
    pub fn attach(
        &'static self,
        wiring: Wiring,
        callback: Option<&'static dyn TxCallback<B>>,
        timeout_us: u32,
        delay: &mut dyn DelayNs,
    ) -> Result<Channel> {
        if self.link.binding().is_some() {
            return Err(Error::NotAllowed);
        }
        let channel = wiring.dma.request_channel(Some(self), timeout_us, delay)?;
        self.callback.set(callback);
        self.link.bind(Binding { wiring, channel });
        Ok(channel)
    }

    /// Stop if needed and give the channel back. Detaching a detached
    /// path succeeds.
    ///
    /// # Errors
    ///
    /// Errors from `stop`; the channel stays reserved and bound so the
    /// call can be repeated.
    pub fn detach(&self, delay: &mut dyn DelayNs) -> Result<()> {
        let Some(b) = self.link.binding() else {
            return Ok(());
        };
        self.stop(delay)?;
        b.wiring.dma.release_channel(b.channel)?;
        self.link.unbind();
        self.callback.set(None);
        Ok(())
    }

    /// Start accepting buffers.
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`] if detached or already running.
    pub fn start(&self) -> Result<()> {
        let b = self.link.bound()?;
        self.link.begin(&b)
    }

    /// Queue `buffer` for transmission.
    ///
    /// If the channel is idle the buffer goes to the hardware before this
    /// returns.
    ///
    /// # Errors
    ///
    /// The buffer is handed back with:
    /// - [`Error::NotAllowed`]: path detached or not running
    /// - [`Error::InvalidParameter`]: empty or oversized buffer, address
    ///   outside the memory map
    /// - [`Error::Alignment`]: word FIFO and length not a multiple of 4
    /// - [`Error::NoMemory`]: ring full, retry after a completion
    pub fn submit(&self, buffer: B) -> SubmitResult<B> {
        let b = match self.link.binding() {
            Some(b) if self.link.is_running() => b,
            _ => return Err(Rejected::new(Error::NotAllowed, buffer)),
        };
        let (addr, len) = buffer_span(&buffer);
        if len == 0 {
            return Err(Rejected::new(Error::InvalidParameter, buffer));
        }
        let transfer = Transfer::to_peripheral(addr, b.wiring.fifo, len, b.wiring.request);
        let desc = match b.wiring.dma.build(&transfer, DmaMode::Normal) {
            Ok(desc) => desc,
            Err(e) => return Err(Rejected::new(e, buffer)),
        };
        if let Err(node) = self.nbc.push(TxNode::new(buffer, desc)) {
            return Err(Rejected::new(Error::NoMemory, node.buffer));
        }
        self.kick();
        Ok(())
    }

    /// Feed ready nodes to an idle channel.
    fn kick(&self) {
        critical_section::with(|_| {
            if self.link.is_active() {
                return;
            }
            if let Some(b) = self.link.binding() {
                self.link.feed(&b, usize::MAX, || {
                    self.nbc.pick_with(|slot, node| node.desc.with_tag(slot as u16))
                });
            }
        });
    }

    /// Halt the channel and return every queued buffer as
    /// [`TxStatus::Aborted`]. Stopping a stopped path succeeds.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the channel does not halt; buffers stay queued.
    pub fn stop(&self, delay: &mut dyn DelayNs) -> Result<()> {
        let Some(b) = self.link.binding() else {
            return Ok(());
        };
        if !self.link.is_running() && self.nbc.valid() == 0 {
            return Ok(());
        }
        self.link.end(&b, delay)?;
        let callback = self.callback.get();
        let aborted = self.nbc.drain(|node| {
            if let Some(cb) = callback {
                cb.on_tx_done(node.buffer, TxStatus::Aborted);
            }
        });
        if aborted > 0 {
            debug!("tx: {} buffers aborted", aborted);
        }
        Ok(())
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.link.is_running()
    }

    /// True while descriptors are queued on the channel.
    pub fn is_active(&self) -> bool {
        self.link.is_active()
    }

    /// Channel owned by this path.
    pub fn channel(&self) -> Option<Channel> {
        self.link.channel()
    }

    /// Buffers held (queued or in flight).
    pub fn queued(&self) -> usize {
        self.nbc.valid()
    }

    /// Buffers not yet handed to the DMA.
    pub fn ready(&self) -> usize {
        self.nbc.ready()
    }

    /// Buffers handed to the DMA and not yet returned.
    pub fn in_flight(&self) -> usize {
        self.nbc.in_flight()
    }

    /// Free ring slots.
    pub fn free(&self) -> usize {
        self.nbc.free()
    }

    /// Ring cursors.
    pub fn snapshot(&self) -> RingSnapshot {
        self.nbc.snapshot()
    }
}

impl<B, const N: usize> Default for TxPath<B, N>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B, const N: usize> DmaCallback for TxPath<B, N>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    fn on_dma_complete(&self, _channel: Channel, completion: Completion) {
        let Some(b) = self.link.binding() else {
            return;
        };
        if !self.link.is_running() {
            return;
        }

        let callback = self.callback.get();
        let done = completion.consumed.min(self.nbc.in_flight());
        for i in 0..done {
            let Some((slot, node)) = self.nbc.retire() else {
                break;
            };
            if i + 1 == done
                && let Some(tag) = completion.last_tag
                && usize::from(tag) != slot
            {
                debug_assert!(false, "tx completion tag {tag} does not match slot {slot}");
                warn!("tx: completion tag {} != slot {}", tag, slot);
            }
            if let Some(cb) = callback {
                cb.on_tx_done(node.buffer, TxStatus::Done);
            }
        }

        self.link.feed(&b, completion.remained, || {
            self.nbc.pick_with(|slot, node| node.desc.with_tag(slot as u16))
        });
        if self.nbc.in_flight() == 0 {
            self.link.set_idle();
        }
    }
}
