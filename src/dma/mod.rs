//! DMA controller
//!
//! The controller owns the register layer ([`DmaHal`]) and the global pool
//! of [`DMA_CHANNELS`] channels. Peripheral drivers reach it through the
//! object-safe [`DmaPort`] trait so the stream engine never names the HAL
//! type.
//!
//! # Channel ownership
//!
//! Each channel slot records who requested it and, for list transfers, the
//! descriptor chain currently installed. The interrupt handler routes a
//! completion to the owner found in the slot: identity is the channel
//! index, there are no back pointers from descriptors to drivers.
//!
//! # Example
//!
//! ```ignore
//! static DMA: DmaController<MyHal> = DmaController::new(MyHal::new(), board::MEMORY_MAP);
//!
//! let ch = DMA.request_channel(None, 1_000, &mut delay)?;
//! DMA.transfer(ch, &[Transfer::memcpy(src, dst, 256)], DmaMode::Normal)?;
//! ```

mod descriptor;
mod region;

pub use descriptor::{
    AddrMode, DescriptorBuilder, DescriptorChain, DmaMode, HwDescriptor, Transfer, Trigger, Unit,
    ctrl,
};
pub use region::{MemoryMap, PeripheralClass, Region, RegionKind};

use embedded_hal::delay::DelayNs;

use crate::driver::error::{Error, Result};
use crate::hal::irq::IrqController;
use crate::internal::constants::{CHANNEL_POLL_US, DMA_CHANNELS, HALT_POLL_US, HALT_TIMEOUT_US};
use crate::sync::CriticalSectionCell;

// =============================================================================
// Channel / completion
// =============================================================================

/// A channel reserved from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Wrap a raw channel number.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `index` is outside the pool.
    pub const fn new(index: u8) -> Result<Self> {
        if (index as usize) < DMA_CHANNELS {
            Ok(Self(index))
        } else {
            Err(Error::InvalidParameter)
        }
    }

    /// Channel number.
    #[inline(always)]
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// What the hardware reports when a channel raises its interrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    /// Descriptors finished since the last report
    pub consumed: usize,
    /// Free slots in the channel's hardware queue
    pub remained: usize,
    /// Bytes written into the last consumed descriptor, when short
    pub tail_len: Option<usize>,
    /// Tag of the last consumed descriptor
    pub last_tag: Option<u16>,
}

// =============================================================================
// Traits
// =============================================================================

/// Register layer of the DMA controller.
///
/// Implemented per chip. Methods are called with interrupts masked.
pub trait DmaHal {
    /// Queue one descriptor on `channel`. Returns `false` if the hardware
    /// queue is full.
    fn load(&mut self, channel: Channel, desc: &HwDescriptor) -> bool;

    /// Point `channel` at a linked chain; `descs[0]` is the head.
    fn program_list(&mut self, channel: Channel, descs: &[HwDescriptor]);

    /// Start (or restart) the channel.
    fn start(&mut self, channel: Channel);

    /// Request the channel to halt. Completion may lag; see `is_running`.
    fn halt(&mut self, channel: Channel);

    /// True while the channel is moving data.
    fn is_running(&self, channel: Channel) -> bool;

    /// Free slots in the channel's hardware descriptor queue.
    fn free_slots(&self, channel: Channel) -> usize;

    /// Fetch and clear the pending completion of `channel`.
    fn take_completion(&mut self, channel: Channel) -> Option<Completion>;

    /// Enable or disable the channel's completion interrupt.
    fn set_irq(&mut self, channel: Channel, enable: bool);
}

/// Receives completions for a channel it owns.
///
/// Called from interrupt context.
pub trait DmaCallback: Sync {
    /// Handle a completion reported on `channel`.
    fn on_dma_complete(&self, channel: Channel, completion: Completion);
}

/// Channel-level interface used by peripheral drivers.
pub trait DmaPort: Sync {
    /// Reserve a free channel, polling until `timeout_us` elapses.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] when no channel frees up in time.
    fn request_channel(
        &self,
        owner: Option<&'static dyn DmaCallback>,
        timeout_us: u32,
        delay: &mut dyn DelayNs,
    ) -> Result<Channel>;

    /// Return a channel to the pool, halting it first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the channel is not reserved.
    fn release_channel(&self, channel: Channel) -> Result<()>;

    /// Build a descriptor for `transfer`.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuilder::build`].
    fn build(&self, transfer: &Transfer, mode: DmaMode) -> Result<HwDescriptor>;

    /// Transfer unit of a peripheral FIFO.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuilder::fifo_unit`].
    fn fifo_unit(&self, fifo: u32) -> Result<Unit>;

    /// Free slots in the channel's hardware queue.
    fn free_slots(&self, channel: Channel) -> usize;

    /// Queue a descriptor on a reserved channel.
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`] if the channel is not reserved, [`Error::NoMemory`]
    /// if its hardware queue is full.
    fn append(&self, channel: Channel, desc: &HwDescriptor) -> Result<()>;

    /// Start a reserved channel.
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`] if the channel is not reserved.
    fn start(&self, channel: Channel) -> Result<()>;

    /// True while the channel is moving data.
    fn is_running(&self, channel: Channel) -> bool;

    /// Request a halt without waiting. Safe in interrupt context.
    fn halt(&self, channel: Channel);

    /// Halt and wait until the hardware confirms.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the channel keeps running.
    fn stop(&self, channel: Channel, delay: &mut dyn DelayNs) -> Result<()>;
}

// =============================================================================
// Controller
// =============================================================================

struct ChannelSlot {
    allocated: bool,
    owner: Option<&'static dyn DmaCallback>,
    chain: Option<DescriptorChain>,
}

impl ChannelSlot {
    const FREE: Self = Self {
        allocated: false,
        owner: None,
        chain: None,
    };
}

/// The DMA controller and its channel pool.
pub struct DmaController<H> {
    hal: CriticalSectionCell<H>,
    slots: CriticalSectionCell<[ChannelSlot; DMA_CHANNELS]>,
    builder: DescriptorBuilder,
}

impl<H: DmaHal + Send> DmaController<H> {
    /// Create a controller (const, suitable for static initialization).
    pub const fn new(hal: H, map: MemoryMap) -> Self {
        Self {
            hal: CriticalSectionCell::new(hal),
            slots: CriticalSectionCell::new([const { ChannelSlot::FREE }; DMA_CHANNELS]),
            builder: DescriptorBuilder::new(map),
        }
    }

    /// Route the controller interrupt to `vector` and unmask it.
    ///
    /// `vector` is expected to call [`on_interrupt`](Self::on_interrupt).
    pub fn init(&self, irq: &dyn IrqController, line: u16, vector: fn()) {
        irq.attach_vector(line, vector);
        irq.enable(line);
        info!("dma: irq {} attached", line);
    }

    /// Descriptor builder bound to this controller's memory map.
    pub const fn builder(&self) -> &DescriptorBuilder {
        &self.builder
    }

    /// Run `f` with the register layer.
    pub fn with_hal<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        self.hal.with(f)
    }

    /// Number of reserved channels.
    pub fn allocated(&self) -> usize {
        self.slots.with(|s| s.iter().filter(|c| c.allocated).count())
    }

    fn try_reserve(&self, owner: Option<&'static dyn DmaCallback>) -> Option<Channel> {
        self.slots.with(|slots| {
            let (index, slot) = slots.iter_mut().enumerate().find(|(_, s)| !s.allocated)?;
            slot.allocated = true;
            slot.owner = owner;
            slot.chain = None;
            Some(Channel(index as u8))
        })
    }

    fn is_allocated(&self, channel: Channel) -> bool {
        self.slots.with(|s| s[channel.0 as usize].allocated)
    }

    /// Run a memory-to-memory or list transfer on a reserved channel.
    ///
    /// `Normal` and `Wrap` take exactly one transfer; `List` links all of
    /// them. The chain stays installed until the channel completes or is
    /// halted, then it is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`]: channel not reserved or still running
    /// - [`Error::InvalidParameter`]: wrong number of transfers for `mode`
    /// - builder errors, see [`DescriptorBuilder::build`]
    pub fn transfer(&self, channel: Channel, transfers: &[Transfer], mode: DmaMode) -> Result<()> {
        if !self.is_allocated(channel) || self.is_running(channel) {
            return Err(Error::NotAllowed);
        }
        let chain = match mode {
            DmaMode::List => self.builder.build_chain(transfers)?,
            _ => {
                let [t] = transfers else {
                    return Err(Error::InvalidParameter);
                };
                let desc = self.builder.build(t, mode)?;
                DescriptorChain::single(desc)?
            }
        };

        critical_section::with(|_| {
            self.slots.with(|slots| {
                let slot = &mut slots[channel.0 as usize];
                self.hal.with(|hal| {
                    hal.program_list(channel, chain.descriptors());
                    hal.start(channel);
                });
                slot.chain = Some(chain);
            });
        });
        debug!("dma: ch{} transfer started", channel.0);
        Ok(())
    }

    /// Interrupt entry point.
    ///
    /// Collects every pending completion and forwards it to the channel's
    /// owner. Owners are invoked outside the controller's critical section.
    pub fn on_interrupt(&self) {
        for index in 0..DMA_CHANNELS {
            let channel = Channel(index as u8);
            let event = critical_section::with(|_| {
                let (completion, running) = self
                    .hal
                    .with(|hal| (hal.take_completion(channel), hal.is_running(channel)));
                let completion = completion?;
                self.slots.with(|slots| {
                    let slot = &mut slots[index];
                    if !running {
                        slot.chain = None;
                    }
                    if !slot.allocated {
                        warn!("dma: completion on free channel {}", index);
                        return None;
                    }
                    slot.owner.map(|owner| (owner, completion))
                })
            });
            if let Some((owner, completion)) = event {
                trace!(
                    "dma: ch{} consumed={} remained={}",
                    index,
                    completion.consumed,
                    completion.remained
                );
                owner.on_dma_complete(channel, completion);
            }
        }
    }
}

impl<H: DmaHal + Send> DmaPort for DmaController<H> {
    fn request_channel(
        &self,
        owner: Option<&'static dyn DmaCallback>,
        timeout_us: u32,
        delay: &mut dyn DelayNs,
    ) -> Result<Channel> {
        let mut waited = 0u32;
        loop {
            if let Some(channel) = self.try_reserve(owner) {
                self.hal.with(|hal| hal.set_irq(channel, true));
                debug!("dma: ch{} reserved", channel.0);
                return Ok(channel);
            }
            if waited >= timeout_us {
                warn!("dma: no free channel after {} us", timeout_us);
                return Err(Error::Busy);
            }
            delay.delay_us(CHANNEL_POLL_US);
            waited = waited.saturating_add(CHANNEL_POLL_US);
        }
    }

    fn release_channel(&self, channel: Channel) -> Result<()> {
        critical_section::with(|_| {
            self.slots.with(|slots| {
                let slot = &mut slots[channel.0 as usize];
                if !slot.allocated {
                    return Err(Error::InvalidParameter);
                }
                self.hal.with(|hal| {
                    hal.halt(channel);
                    hal.set_irq(channel, false);
                    let _ = hal.take_completion(channel);
                });
                *slot = ChannelSlot::FREE;
                Ok(())
            })
        })?;
        debug!("dma: ch{} released", channel.0);
        Ok(())
    }

    fn build(&self, transfer: &Transfer, mode: DmaMode) -> Result<HwDescriptor> {
        self.builder.build(transfer, mode)
    }

    fn fifo_unit(&self, fifo: u32) -> Result<Unit> {
        self.builder.fifo_unit(fifo)
    }

    fn free_slots(&self, channel: Channel) -> usize {
        self.hal.with(|hal| hal.free_slots(channel))
    }

    fn append(&self, channel: Channel, desc: &HwDescriptor) -> Result<()> {
        if !self.is_allocated(channel) {
            return Err(Error::NotAllowed);
        }
        let desc = desc.with_channel(channel.0);
        if self.hal.with(|hal| hal.load(channel, &desc)) {
            Ok(())
        } else {
            Err(Error::NoMemory)
        }
    }

    fn start(&self, channel: Channel) -> Result<()> {
        if !self.is_allocated(channel) {
            return Err(Error::NotAllowed);
        }
        self.hal.with(|hal| hal.start(channel));
        Ok(())
    }

    fn is_running(&self, channel: Channel) -> bool {
        self.hal.with(|hal| hal.is_running(channel))
    }

    fn halt(&self, channel: Channel) {
        critical_section::with(|_| {
            self.hal.with(|hal| hal.halt(channel));
            self.slots.with(|slots| slots[channel.0 as usize].chain = None);
        });
    }

    fn stop(&self, channel: Channel, delay: &mut dyn DelayNs) -> Result<()> {
        self.halt(channel);
        let mut waited = 0u32;
        while self.is_running(channel) {
            if waited >= HALT_TIMEOUT_US {
                error!("dma: ch{} failed to halt", channel.0);
                return Err(Error::Timeout);
            }
            delay.delay_us(HALT_POLL_US);
            waited += HALT_POLL_US;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
