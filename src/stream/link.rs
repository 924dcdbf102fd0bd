//! Channel binding and the per-direction run state.
//!
//! A [`Link`] ties one stream direction to its DMA channel, clock gate and
//! peripheral DMA request. It tracks two flags:
//!
//! - `running`: the user started the direction and has not stopped it
//! - `active`: descriptors are queued on the channel (the channel state
//!   machine is `Active`); cleared when a dispatch leaves nothing in flight
//!
//! Feeding the channel is the only place descriptors reach the hardware,
//! both from the task-side kick and from the completion dispatcher.

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use crate::dma::{Channel, DmaPort, HwDescriptor};
use crate::driver::error::{Error, Result};
use crate::hal::clock::ClockPort;
use crate::hal::port::{PortControl, StreamDir};
use crate::sync::CriticalSectionCell;

/// Collaborators and endpoint of one stream direction.
#[derive(Clone, Copy)]
pub struct Wiring {
    /// DMA controller
    pub dma: &'static dyn DmaPort,
    /// Clock gates
    pub clock: &'static dyn ClockPort,
    /// Peripheral registers
    pub port: &'static dyn PortControl,
    /// Peripheral FIFO address
    pub fifo: u32,
    /// DMA request line of the peripheral
    pub request: u8,
    /// Clock gate bits the direction needs while running
    pub clock_mask: u32,
}

#[derive(Clone, Copy)]
pub(crate) struct Binding {
    pub(crate) wiring: Wiring,
    pub(crate) channel: Channel,
}

pub(crate) struct Link {
    dir: StreamDir,
    binding: CriticalSectionCell<Option<Binding>>,
    running: AtomicBool,
    active: AtomicBool,
    clock_held: AtomicBool,
}

impl Link {
    pub(crate) const fn new(dir: StreamDir) -> Self {
        Self {
            dir,
            binding: CriticalSectionCell::new(None),
            running: AtomicBool::new(false),
            active: AtomicBool::new(false),
            clock_held: AtomicBool::new(false),
        }
    }

    pub(crate) fn bind(&self, binding: Binding) {
        self.binding.set(Some(binding));
    }

    pub(crate) fn unbind(&self) -> Option<Binding> {
        self.binding.with(Option::take)
    }

    pub(crate) fn binding(&self) -> Option<Binding> {
        self.binding.get()
    }

    /// Binding, or `NotAllowed` when the direction was never attached.
    pub(crate) fn bound(&self) -> Result<Binding> {
        self.binding().ok_or(Error::NotAllowed)
    }

    pub(crate) fn channel(&self) -> Option<Channel> {
        self.binding().map(|b| b.channel)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_idle(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Take the clock, open the DMA request line, mark running.
    pub(crate) fn begin(&self, b: &Binding) -> Result<()> {
        if self.is_running() {
            return Err(Error::NotAllowed);
        }
        if !self.clock_held.swap(true, Ordering::AcqRel)
            && let Err(e) = b.wiring.clock.acquire(b.wiring.clock_mask)
        {
            self.clock_held.store(false, Ordering::Release);
            return Err(e);
        }
        b.wiring.port.set_dma_request(self.dir, true);
        self.running.store(true, Ordering::Release);
        info!("stream: {} started on ch{}", self.dir, b.channel.index());
        Ok(())
    }

    /// Halt the channel and wait for it, then release the direction's
    /// resources. The clock is kept if the channel refuses to halt.
    pub(crate) fn end(&self, b: &Binding, delay: &mut dyn DelayNs) -> Result<()> {
        self.running.store(false, Ordering::Release);
        b.wiring.dma.stop(b.channel, delay)?;
        self.shut(b);
        info!("stream: {} stopped", self.dir);
        Ok(())
    }

    /// Interrupt-context variant of [`end`](Self::end): request the halt
    /// without waiting for it.
    pub(crate) fn abort(&self, b: &Binding) {
        self.running.store(false, Ordering::Release);
        b.wiring.dma.halt(b.channel);
        self.shut(b);
    }

    fn shut(&self, b: &Binding) {
        b.wiring.port.set_dma_request(self.dir, false);
        if self.clock_held.swap(false, Ordering::AcqRel)
            && let Err(e) = b.wiring.clock.release(b.wiring.clock_mask)
        {
            warn!("stream: clock release failed: {}", e);
        }
        self.set_idle();
    }

    /// Append up to `budget` descriptors produced by `next`.
    ///
    /// Restarts the channel if it went idle while work was appended.
    /// Returns how many descriptors reached the hardware.
    pub(crate) fn feed<F>(&self, b: &Binding, budget: usize, mut next: F) -> usize
    where
        F: FnMut() -> Option<HwDescriptor>,
    {
        let dma = b.wiring.dma;
        let room = budget.min(dma.free_slots(b.channel));
        let mut fed = 0;
        while fed < room {
            let Some(desc) = next() else {
                break;
            };
            if let Err(e) = dma.append(b.channel, &desc) {
                error!("stream: ch{} append failed: {}", b.channel.index(), e);
                break;
            }
            fed += 1;
        }
        if fed > 0 {
            self.active.store(true, Ordering::Release);
            if !dma.is_running(b.channel) {
                trace!("stream: ch{} (re)start", b.channel.index());
                if let Err(e) = dma.start(b.channel) {
                    error!("stream: ch{} start failed: {}", b.channel.index(), e);
                }
            }
        }
        fed
    }
}
