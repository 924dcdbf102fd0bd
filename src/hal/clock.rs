//! Clock and reset control
//!
//! [`ClockControl`] is the chip's RCC register layer: gate bits, module reset
//! and domain frequencies. [`ClockGate`] wraps it with per-bit reference
//! counts so that independent users of one gate (the TX and RX directions of
//! a peripheral, or two peripherals sharing a bus clock) cannot switch the
//! clock off underneath each other.

use crate::driver::error::{Error, Result};
use crate::sync::CriticalSectionCell;

/// Clock domains whose frequency drivers need for divider math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDomain {
    /// CPU core clock
    Cpu,
    /// Peripheral bus clock
    Apb,
    /// Audio (I2S) reference clock
    Audio,
}

/// Whether a gate bit is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockState {
    /// Gate closed
    #[default]
    Disabled,
    /// Gate open
    Enabled,
}

/// RCC register layer.
pub trait ClockControl {
    /// Open the gates in `mask`.
    fn clock_enable(&mut self, mask: u32);
    /// Close the gates in `mask`.
    fn clock_disable(&mut self, mask: u32);
    /// Pulse the reset of the modules in `mask`.
    fn clock_reset(&mut self, mask: u32);
    /// Frequency of `domain` in Hz.
    fn get_clock(&self, domain: ClockDomain) -> u32;
}

/// Reference-counted clock interface used by drivers.
pub trait ClockPort: Sync {
    /// Take one reference on every gate in `mask`, enabling gates that go
    /// from zero to one.
    ///
    /// # Errors
    ///
    /// [`Error::Failed`] if a counter would overflow; no counter changes.
    fn acquire(&self, mask: u32) -> Result<()>;

    /// Drop one reference on every gate in `mask`, disabling gates that
    /// reach zero.
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`] if a gate in `mask` holds no reference; no
    /// counter changes.
    fn release(&self, mask: u32) -> Result<()>;

    /// Reset the modules in `mask`.
    fn reset(&self, mask: u32);

    /// Frequency of `domain` in Hz.
    fn frequency(&self, domain: ClockDomain) -> u32;
}

struct GateState<C> {
    ctl: C,
    counts: [u16; 32],
}

/// Reference-counting wrapper around a [`ClockControl`].
pub struct ClockGate<C> {
    inner: CriticalSectionCell<GateState<C>>,
}

impl<C: ClockControl + Send> ClockGate<C> {
    /// Wrap a register layer. All gates start with zero references.
    pub const fn new(ctl: C) -> Self {
        Self {
            inner: CriticalSectionCell::new(GateState {
                ctl,
                counts: [0; 32],
            }),
        }
    }

    /// References held on gate `bit`.
    pub fn refcount(&self, bit: u32) -> u16 {
        self.inner.with(|s| s.counts.get(bit as usize).copied().unwrap_or(0))
    }

    /// Whether every gate in `mask` is on.
    pub fn state(&self, mask: u32) -> ClockState {
        let on = self.inner.with(|s| bits(mask).all(|b| s.counts[b] > 0));
        if on && mask != 0 {
            ClockState::Enabled
        } else {
            ClockState::Disabled
        }
    }

    /// Run `f` with the register layer.
    pub fn with_control<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.inner.with(|s| f(&mut s.ctl))
    }
}

fn bits(mask: u32) -> impl Iterator<Item = usize> {
    (0..32).filter(move |b| mask & (1 << b) != 0)
}

impl<C: ClockControl + Send> ClockPort for ClockGate<C> {
    fn acquire(&self, mask: u32) -> Result<()> {
        self.inner.with(|s| {
            if bits(mask).any(|b| s.counts[b] == u16::MAX) {
                return Err(Error::Failed);
            }
            let mut rising = 0u32;
            for b in bits(mask) {
                if s.counts[b] == 0 {
                    rising |= 1 << b;
                }
                s.counts[b] += 1;
            }
            if rising != 0 {
                s.ctl.clock_enable(rising);
                debug!("clock: enable {:#x}", rising);
            }
            Ok(())
        })
    }

    fn release(&self, mask: u32) -> Result<()> {
        self.inner.with(|s| {
            if bits(mask).any(|b| s.counts[b] == 0) {
                return Err(Error::NotAllowed);
            }
            let mut falling = 0u32;
            for b in bits(mask) {
                s.counts[b] -= 1;
                if s.counts[b] == 0 {
                    falling |= 1 << b;
                }
            }
            if falling != 0 {
                s.ctl.clock_disable(falling);
                debug!("clock: disable {:#x}", falling);
            }
            Ok(())
        })
    }

    fn reset(&self, mask: u32) {
        self.inner.with(|s| s.ctl.clock_reset(mask));
    }

    fn frequency(&self, domain: ClockDomain) -> u32 {
        self.inner.with(|s| s.ctl.get_clock(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClock;

    const I2S: u32 = 1 << 4;
    const DMA: u32 = 1 << 9;

    #[test]
    fn first_acquire_enables_last_release_disables() {
        let gate = ClockGate::new(MockClock::new());
        gate.acquire(I2S).unwrap();
        gate.acquire(I2S).unwrap();
        assert_eq!(gate.with_control(|c| c.enable_calls()), 1);
        assert_eq!(gate.refcount(4), 2);

        gate.release(I2S).unwrap();
        assert_eq!(gate.state(I2S), ClockState::Enabled);
        assert_eq!(gate.with_control(|c| c.gates()), I2S);

        gate.release(I2S).unwrap();
        assert_eq!(gate.state(I2S), ClockState::Disabled);
        assert_eq!(gate.with_control(|c| c.gates()), 0);
    }

    #[test]
    fn multi_bit_masks_count_per_bit() {
        let gate = ClockGate::new(MockClock::new());
        gate.acquire(I2S | DMA).unwrap();
        gate.acquire(DMA).unwrap();
        gate.release(I2S | DMA).unwrap();
        assert_eq!(gate.with_control(|c| c.gates()), DMA);
        assert_eq!(gate.state(I2S | DMA), ClockState::Disabled);
        assert_eq!(gate.state(DMA), ClockState::Enabled);
    }

    #[test]
    fn release_without_reference_changes_nothing() {
        let gate = ClockGate::new(MockClock::new());
        gate.acquire(DMA).unwrap();
        assert_eq!(gate.release(I2S | DMA), Err(Error::NotAllowed));
        assert_eq!(gate.refcount(9), 1);
        assert_eq!(gate.with_control(|c| c.gates()), DMA);
    }

    #[test]
    fn frequency_and_reset_pass_through() {
        let gate = ClockGate::new(MockClock::new());
        assert_eq!(gate.frequency(ClockDomain::Apb), crate::testing::APB_HZ);
        gate.reset(I2S);
        assert_eq!(gate.with_control(|c| c.resets()), I2S);
    }
}
