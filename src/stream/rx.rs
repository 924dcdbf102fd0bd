//! Receive path.
//!
//! The RX ring holds packet buffers the DMA will fill. Starting the path
//! fills the ring; every completion hands the filled packets to
//! [`RxCallback::on_rx_ready`] in order and allocates replacements so the
//! ring stays full.
//!
//! Packets handed out are "online" until the application gives them back
//! with [`RxPath::release`]. When more than `pending_threshold` packets are
//! online at the start of a completion, the path stops itself and reports
//! [`StopReason::Backpressure`]; the application must release packets and
//! start the path again.

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicUsize, Ordering};

use super::link::{Binding, Link, Wiring};
use super::nbc::{NodeContainer, RxNode, RxPacket};
use super::ring::RingSnapshot;
use crate::dma::{Channel, Completion, DmaCallback, DmaMode, Transfer};
use crate::driver::config::StreamConfig;
use crate::driver::error::{Error, Result};
use crate::hal::port::StreamDir;
use crate::internal::constants::RX_PACKET_MAGIC;
use crate::sync::CriticalSectionCell;

/// Why the receive path stopped on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum StopReason {
    /// Too many packets held by the application
    Backpressure,
}

/// Receives filled packets.
///
/// Called from interrupt context.
pub trait RxCallback: Sync {
    /// A packet was filled. Give it back with `rx_release` when done.
    fn on_rx_ready(&self, packet: RxPacket);

    /// The path stopped itself.
    fn on_rx_stopped(&self, reason: StopReason) {
        let _ = reason;
    }
}

/// Receive direction of a streaming peripheral.
pub struct RxPath<const N: usize> {
    nbc: NodeContainer<RxNode, N>,
    link: Link,
    callback: CriticalSectionCell<Option<&'static dyn RxCallback>>,
    packet_size: AtomicUsize,
    threshold: AtomicUsize,
    delivered: AtomicUsize,
    released: AtomicUsize,
}

impl<const N: usize> RxPath<N> {
    /// Create a detached path (const, suitable for static initialization).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nbc: NodeContainer::new(),
            link: Link::new(StreamDir::Rx),
            callback: CriticalSectionCell::new(None),
            packet_size: AtomicUsize::new(0),
            threshold: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Reserve a DMA channel and register this path as its owner.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`]: already attached
    /// - [`Error::InvalidParameter`]: invalid `config` or `wiring.fifo` is
    ///   not a peripheral FIFO
    /// - [`Error::Alignment`]: packet size not a multiple of the FIFO width
    /// - [`Error::Busy`]: no channel within the configured timeout
    pub fn attach(
        &'static self,
        wiring: Wiring,
        config: &StreamConfig,
        callback: Option<&'static dyn RxCallback>,
        delay: &mut dyn DelayNs,
    ) -> Result<Channel> {
        if self.link.binding().is_some() {
            return Err(Error::NotAllowed);
        }
        config.validate()?;
        if config.packet_size % wiring.dma.fifo_unit(wiring.fifo)?.size() != 0 {
            return Err(Error::Alignment);
        }
        let channel = wiring
            .dma
            .request_channel(Some(self), config.channel_timeout_us, delay)?;
        self.packet_size.store(config.packet_size, Ordering::Relaxed);
        self.threshold.store(config.pending_threshold, Ordering::Relaxed);
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

    /// Start receiving: fill the ring with packets and start the channel.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`]: detached or already running
    /// - [`Error::NoMemory`]: not a single packet could be allocated
    /// - builder errors for the FIFO/packet combination
    pub fn start(&self) -> Result<()> {
        let b = self.link.bound()?;
        self.link.begin(&b)?;
        let mut posted = 0;
        let mut failure = None;
        while self.nbc.free() > 0 {
            match self.post(&b) {
                Ok(()) => posted += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            if posted == 0 {
                self.link.abort(&b);
                return Err(e);
            }
            warn!("rx: started with {} of {} packets: {}", posted, N, e);
        }
        self.kick(&b);
        Ok(())
    }

    /// Post one more receive packet.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`]: detached or not running
    /// - [`Error::NoMemory`]: ring full or allocation failed; the ring is
    ///   left unchanged
    pub fn request(&self) -> Result<()> {
        let b = self.link.bound()?;
        if !self.link.is_running() {
            return Err(Error::NotAllowed);
        }
        self.post(&b)?;
        self.kick(&b);
        Ok(())
    }

    fn make_node(&self, b: &Binding) -> Result<RxNode> {
        let size = self.packet_size.load(Ordering::Relaxed);
        let mut packet = RxPacket::allocate(size, self.magic())?;
        let transfer =
            Transfer::from_peripheral(b.wiring.fifo, packet.dma_addr(), size, b.wiring.request);
        let desc = b.wiring.dma.build(&transfer, DmaMode::Normal)?;
        Ok(RxNode { packet, desc })
    }

    /// Allocate a packet and push it. Task and interrupt both push into
    /// the RX ring, so the push runs with interrupts masked.
    fn post(&self, b: &Binding) -> Result<()> {
        if self.nbc.free() == 0 {
            return Err(Error::NoMemory);
        }
        let node = self.make_node(b)?;
        critical_section::with(|_| self.nbc.push(node).map(|_| ()).map_err(|_| Error::NoMemory))
    }

    fn kick(&self, b: &Binding) {
        critical_section::with(|_| {
            if !self.link.is_active() {
                self.feed(b, usize::MAX);
            }
        });
    }

    fn feed(&self, b: &Binding, budget: usize) -> usize {
        self.link.feed(b, budget, || {
            self.nbc.pick_with(|slot, node| node.desc.with_tag(slot as u16))
        })
    }

    /// Halt the channel and free every packet still in the ring. Stopping
    /// a stopped path succeeds.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the channel does not halt.
    pub fn stop(&self, delay: &mut dyn DelayNs) -> Result<()> {
        let Some(b) = self.link.binding() else {
            return Ok(());
        };
        if !self.link.is_running() && self.nbc.valid() == 0 {
            return Ok(());
        }
        self.link.end(&b, delay)?;
        let freed = self.nbc.drain(drop);
        debug!("rx: {} packets freed", freed);
        Ok(())
    }

    /// Give a delivered packet back.
    ///
    /// Lock free; may be called from inside [`RxCallback::on_rx_ready`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the packet was not delivered by this
    /// path or more packets are released than were delivered.
    pub fn release(&self, packet: RxPacket) -> Result<()> {
        if packet.magic() != self.magic() {
            return Err(Error::InvalidParameter);
        }
        let mut released = self.released.load(Ordering::Acquire);
        loop {
            if released == self.delivered.load(Ordering::Acquire) {
                return Err(Error::InvalidParameter);
            }
            match self.released.compare_exchange_weak(
                released,
                released.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(current) => released = current,
            }
        }
    }

    fn magic(&self) -> u32 {
        RX_PACKET_MAGIC ^ (self as *const Self as usize as u32)
    }

    /// Packets delivered and not yet released.
    pub fn online(&self) -> usize {
        self.delivered
            .load(Ordering::Acquire)
            .wrapping_sub(self.released.load(Ordering::Acquire))
    }

    /// True between `start` and `stop` (or a forced stop).
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

    /// Packets in the ring.
    pub fn queued(&self) -> usize {
        self.nbc.valid()
    }

    /// Packets handed to the DMA.
    pub fn in_flight(&self) -> usize {
        self.nbc.in_flight()
    }

    /// Packets waiting for a free hardware slot.
    pub fn ready(&self) -> usize {
        self.nbc.ready()
    }

    /// Ring cursors.
    pub fn snapshot(&self) -> RingSnapshot {
        self.nbc.snapshot()
    }

    fn force_stop(&self, b: &Binding, online: usize) {
        warn!(
            "rx: {} packets online, threshold {}; stopping",
            online,
            self.threshold.load(Ordering::Relaxed)
        );
        self.link.abort(b);
        self.nbc.drain(drop);
        if let Some(cb) = self.callback.get() {
            cb.on_rx_stopped(StopReason::Backpressure);
        }
    }
}

impl<const N: usize> Default for RxPath<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DmaCallback for RxPath<N> {
    fn on_dma_complete(&self, _channel: Channel, completion: Completion) {
        let Some(b) = self.link.binding() else {
            return;
        };
        if !self.link.is_running() {
            return;
        }

        let online = self.online();
        if online > self.threshold.load(Ordering::Relaxed) {
            self.force_stop(&b, online);
            return;
        }

        let callback = self.callback.get();
        let done = completion.consumed.min(self.nbc.in_flight());
        for i in 0..done {
            let Some((slot, mut node)) = self.nbc.retire() else {
                break;
            };
            let last = i + 1 == done;
            if last
                && let Some(tag) = completion.last_tag
                && usize::from(tag) != slot
            {
                debug_assert!(false, "rx completion tag {tag} does not match slot {slot}");
                warn!("rx: completion tag {} != slot {}", tag, slot);
            }
            let filled = match completion.tail_len {
                Some(len) if last => len,
                _ => node.desc.len(),
            };
            node.packet.set_filled(filled);
            match callback {
                Some(cb) => {
                    self.delivered.fetch_add(1, Ordering::AcqRel);
                    cb.on_rx_ready(node.packet);
                }
                None => drop(node.packet),
            }
        }

        while self.nbc.free() > 0 {
            match self.make_node(&b) {
                Ok(node) => {
                    if self.nbc.push(node).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("rx: refill failed: {}", e);
                    break;
                }
            }
        }

        self.feed(&b, completion.remained);
        if self.nbc.in_flight() == 0 {
            self.link.set_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dma::DmaPort;
    use crate::testing::{
        CLOCK_BIT, MockDelay, RX_FIFO_UART, RX_FIFO_WORD, RecordingRx, TestRig, leak,
    };

    fn config(threshold: usize) -> StreamConfig {
        StreamConfig::new()
            .with_packet_size(64)
            .with_pending_threshold(threshold)
    }

    fn attached<const N: usize>(
        rig: &TestRig,
        fifo: u32,
        threshold: usize,
    ) -> (&'static RxPath<N>, &'static RecordingRx) {
        let path: &'static RxPath<N> = leak(RxPath::new());
        let cb: &'static RecordingRx = leak(RecordingRx::new());
        path.attach(rig.wiring(fifo), &config(threshold), Some(cb), &mut MockDelay::new())
            .unwrap();
        (path, cb)
    }

    #[test]
    fn start_fills_ring_and_feeds_hardware() {
        let rig = TestRig::with_queue_depth(2);
        let (path, _) = attached::<4>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        let ch = path.channel().unwrap();
        assert_eq!(path.queued(), 4);
        assert_eq!(path.in_flight(), 2);
        assert_eq!(path.ready(), 2);
        assert!(rig.dma.is_running(ch));
    }

    #[test]
    fn completion_delivers_in_order_and_refills() {
        let rig = TestRig::new();
        let (path, cb) = attached::<3>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        let ch = path.channel().unwrap();
        let slots: std::vec::Vec<u16> =
            rig.dma.with_hal(|h| h.queued(ch).iter().map(|d| d.tag()).collect());
        assert_eq!(slots, [0, 1, 2]);

        rig.complete(ch, 2);
        assert_eq!(cb.count(), 2);
        assert_eq!(path.online(), 2);
        assert_eq!(path.queued(), 3);
        assert_eq!(path.in_flight(), 3);
        assert_eq!(cb.lengths(), [64, 64]);
    }

    #[test]
    fn short_tail_sets_packet_length() {
        let rig = TestRig::new();
        let (path, cb) = attached::<2>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        let ch = path.channel().unwrap();
        rig.complete_short(ch, 1, 17);
        assert_eq!(cb.lengths(), [17]);
    }

    #[test]
    fn release_credits_online_count() {
        let rig = TestRig::new();
        let (path, cb) = attached::<2>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        rig.complete(path.channel().unwrap(), 1);
        let packet = cb.take().unwrap();
        assert_eq!(path.online(), 1);
        path.release(packet).unwrap();
        assert_eq!(path.online(), 0);
    }

    #[test]
    fn foreign_packet_rejected() {
        let rig = TestRig::new();
        let (a, cb_a) = attached::<2>(&rig, RX_FIFO_UART, 8);
        let (b, _) = attached::<2>(&rig, RX_FIFO_WORD, 8);
        a.start().unwrap();
        b.start().unwrap();
        rig.complete(a.channel().unwrap(), 1);
        let packet = cb_a.take().unwrap();
        assert_eq!(b.release(packet), Err(Error::InvalidParameter));
        assert_eq!(a.online(), 1);
    }

    #[test]
    fn backpressure_forces_stop() {
        // Threshold 2, three packets delivered and never released: the next
        // completion stops the stream.
        let rig = TestRig::new();
        let (path, cb) = attached::<3>(&rig, RX_FIFO_UART, 2);
        path.start().unwrap();
        let ch = path.channel().unwrap();
        for _ in 0..3 {
            rig.complete(ch, 1);
        }
        assert_eq!(cb.count(), 3);
        assert!(path.is_running());
        assert!(cb.stops().is_empty());

        rig.complete(ch, 1);
        assert_eq!(cb.count(), 3);
        assert_eq!(cb.stops(), [StopReason::Backpressure]);
        assert!(!path.is_running());
        assert_eq!(path.queued(), 0);
        assert!(!rig.dma.is_running(ch));
        assert_eq!(rig.clock.refcount(CLOCK_BIT), 0);

        // Releasing and restarting resumes reception.
        while let Some(p) = cb.take() {
            path.release(p).unwrap();
        }
        path.start().unwrap();
        assert_eq!(path.queued(), 3);
    }

    #[test]
    fn request_respects_capacity() {
        let rig = TestRig::new();
        let (path, _) = attached::<2>(&rig, RX_FIFO_UART, 8);
        assert_eq!(path.request(), Err(Error::NotAllowed));
        path.start().unwrap();
        let before = path.snapshot();
        assert_eq!(path.request(), Err(Error::NoMemory));
        assert_eq!(path.snapshot(), before);
    }

    #[test]
    fn stop_frees_packets_and_is_idempotent() {
        let rig = TestRig::new();
        let (path, _) = attached::<4>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        let mut delay = MockDelay::new();
        path.stop(&mut delay).unwrap();
        assert_eq!(path.queued(), 0);
        assert!(!path.is_active());
        let snap = path.snapshot();
        path.stop(&mut delay).unwrap();
        assert_eq!(path.snapshot(), snap);
        assert!(!path.is_running());
    }

    #[test]
    fn stop_timeout_keeps_packets_until_halt_succeeds() {
        let rig = TestRig::new();
        let (path, cb) = attached::<4>(&rig, RX_FIFO_UART, 8);
        path.start().unwrap();
        let ch = path.channel().unwrap();
        rig.dma.with_hal(|h| h.set_stuck(ch, true));

        let mut delay = MockDelay::new();
        assert_eq!(path.stop(&mut delay), Err(Error::Timeout));
        assert_eq!(path.queued(), 4);
        assert!(!path.is_running());
        assert_eq!(rig.clock.refcount(CLOCK_BIT), 1);

        // Late completions are ignored while the halt is pending.
        rig.complete(ch, 1);
        assert_eq!(cb.count(), 0);

        rig.dma.with_hal(|h| h.set_stuck(ch, false));
        path.stop(&mut delay).unwrap();
        assert_eq!(path.queued(), 0);
        assert!(!path.is_active());
        assert!(!rig.dma.is_running(ch));
        assert_eq!(rig.clock.refcount(CLOCK_BIT), 0);
    }

    #[test]
    fn packet_size_must_suit_fifo_width() {
        let rig = TestRig::new();
        let path: &'static RxPath<2> = leak(RxPath::new());
        let cfg = StreamConfig::new().with_packet_size(6);
        let mut delay = MockDelay::new();
        assert_eq!(
            path.attach(rig.wiring(RX_FIFO_WORD), &cfg, None, &mut delay),
            Err(Error::Alignment)
        );
        assert_eq!(rig.dma.allocated(), 0);
        // A byte FIFO takes any size.
        path.attach(rig.wiring(RX_FIFO_UART), &cfg, None, &mut delay)
            .unwrap();
    }

    #[test]
    fn invalid_config_rejected() {
        let rig = TestRig::new();
        let path: &'static RxPath<2> = leak(RxPath::new());
        let cfg = StreamConfig::new().with_packet_size(0);
        assert_eq!(
            path.attach(rig.wiring(RX_FIFO_UART), &cfg, None, &mut MockDelay::new()),
            Err(Error::InvalidParameter)
        );
        assert_eq!(rig.dma.allocated(), 0);
    }
}
