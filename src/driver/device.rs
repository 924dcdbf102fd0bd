//! Shared device plumbing.
//!
//! Every facade embeds a [`DeviceCore`]: its static hardware description, the
//! lifecycle state and the per-device mutex that serializes task-context
//! entry points. [`Device`] is the type-erased handle the registry stores.

use core::any::Any;

use portable_atomic::{AtomicU8, Ordering};

use super::config::{DeviceState, PeripheralHw};
use super::error::{Error, Rejected, Result, SubmitResult};
use crate::dma::DmaPort;
use crate::hal::clock::{ClockDomain, ClockPort};
use crate::hal::pinmux::{self, PinMux};
use crate::hal::port::{PortControl, PortSetting};
use crate::internal::constants::DEFAULT_LOCK_SPINS;
use crate::stream::Wiring;
use crate::sync::{DeviceGuard, DeviceMutex};

/// Collaborators a facade is wired to at init.
#[derive(Clone, Copy)]
pub struct Platform {
    /// DMA controller
    pub dma: &'static dyn DmaPort,
    /// Clock gates
    pub clock: &'static dyn ClockPort,
    /// Peripheral registers
    pub port: &'static dyn PortControl,
}

impl Platform {
    pub(crate) fn tx_wiring(&self, hw: &PeripheralHw) -> Wiring {
        Wiring {
            dma: self.dma,
            clock: self.clock,
            port: self.port,
            fifo: hw.tx_fifo,
            request: hw.tx_request,
            clock_mask: hw.clock_mask,
        }
    }

    pub(crate) fn rx_wiring(&self, hw: &PeripheralHw) -> Wiring {
        Wiring {
            fifo: hw.rx_fifo,
            request: hw.rx_request,
            ..self.tx_wiring(hw)
        }
    }

    pub(crate) fn frequency(&self, domain: ClockDomain) -> u32 {
        self.clock.frequency(domain)
    }

    /// Route the pins, then reset and program the peripheral with its
    /// clock held for the duration.
    pub(crate) fn configure(
        &self,
        hw: &PeripheralHw,
        setting: PortSetting,
        mux: &mut dyn PinMux,
    ) -> Result<()> {
        pinmux::route(mux, hw.pins);
        self.clock.acquire(hw.clock_mask)?;
        self.clock.reset(hw.clock_mask);
        self.port.apply(setting);
        self.clock.release(hw.clock_mask)
    }
}

/// Generic device handle.
pub trait Device: Sync {
    /// Registry name.
    fn name(&self) -> &'static str;
    /// Lifecycle state.
    fn state(&self) -> DeviceState;
    /// Static hardware description.
    fn hw(&self) -> &'static PeripheralHw;
    /// Upcast for typed lookup.
    fn as_any(&self) -> &dyn Any;
}

/// Lifecycle state and lock shared by all facades.
pub struct DeviceCore {
    hw: &'static PeripheralHw,
    state: AtomicU8,
    mutex: DeviceMutex,
}

impl DeviceCore {
    /// Create an uninitialized core.
    pub const fn new(hw: &'static PeripheralHw) -> Self {
        Self {
            hw,
            state: AtomicU8::new(DeviceState::Uninit as u8),
            mutex: DeviceMutex::new(),
        }
    }

    /// Static hardware description.
    pub const fn hw(&self) -> &'static PeripheralHw {
        self.hw
    }

    /// Lifecycle state.
    pub fn state(&self) -> DeviceState {
        DeviceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn lock(&self) -> Result<DeviceGuard<'_>> {
        self.mutex.lock(DEFAULT_LOCK_SPINS)
    }

    pub(crate) fn require_inited(&self) -> Result<()> {
        if self.state() == DeviceState::Inited {
            Ok(())
        } else {
            Err(Error::NotAllowed)
        }
    }

    /// Run `f` as the device's init: `Uninit → Initing → Inited`, or back
    /// to `Uninit` if `f` fails.
    pub(crate) fn initialize<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.state
            .compare_exchange(
                DeviceState::Uninit as u8,
                DeviceState::Initing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::NotAllowed)?;
        let result = self.lock().and_then(|_guard| f());
        let next = if result.is_ok() {
            DeviceState::Inited
        } else {
            DeviceState::Uninit
        };
        self.state.store(next as u8, Ordering::Release);
        match result {
            Ok(()) => info!("{}: initialized", self.hw.name),
            Err(e) => warn!("{}: init failed: {}", self.hw.name, e),
        }
        result
    }

    /// Run `f` as the device's teardown. Requires `Inited`; the state goes
    /// back to `Uninit` only if `f` succeeds.
    pub(crate) fn teardown<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.require_inited()?;
        let _guard = self.lock()?;
        f()?;
        self.state.store(DeviceState::Uninit as u8, Ordering::Release);
        info!("{}: deinitialized", self.hw.name);
        Ok(())
    }

    /// Run `f` holding the device mutex. Requires `Inited`.
    pub(crate) fn locked<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.require_inited()?;
        let _guard = self.lock()?;
        f()
    }

    /// [`locked`](Self::locked) for buffer submissions: a state or lock
    /// failure hands the buffer back.
    pub(crate) fn submit<B, F>(&self, buffer: B, f: F) -> SubmitResult<B>
    where
        F: FnOnce(B) -> SubmitResult<B>,
    {
        if let Err(e) = self.require_inited() {
            return Err(Rejected::new(e, buffer));
        }
        match self.lock() {
            Ok(_guard) => f(buffer),
            Err(e) => Err(Rejected::new(e, buffer)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static HW: PeripheralHw = PeripheralHw {
        name: "test0",
        tx_fifo: 0,
        rx_fifo: 0,
        tx_request: 0,
        rx_request: 0,
        clock_mask: 0,
        pins: &[],
    };

    #[test]
    fn init_success_moves_to_inited() {
        let core = DeviceCore::new(&HW);
        assert_eq!(core.state(), DeviceState::Uninit);
        core.initialize(|| Ok(())).unwrap();
        assert_eq!(core.state(), DeviceState::Inited);
        assert_eq!(core.initialize(|| Ok(())), Err(Error::NotAllowed));
    }

    #[test]
    fn init_failure_rolls_back() {
        let core = DeviceCore::new(&HW);
        assert_eq!(core.initialize(|| Err(Error::Busy)), Err(Error::Busy));
        assert_eq!(core.state(), DeviceState::Uninit);
    }

    #[test]
    fn state_is_initing_during_init() {
        let core = DeviceCore::new(&HW);
        core.initialize(|| {
            assert_eq!(core.state(), DeviceState::Initing);
            assert_eq!(core.require_inited(), Err(Error::NotAllowed));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn teardown_requires_init() {
        let core = DeviceCore::new(&HW);
        assert_eq!(core.teardown(|| Ok(())), Err(Error::NotAllowed));
        core.initialize(|| Ok(())).unwrap();
        core.teardown(|| Ok(())).unwrap();
        assert_eq!(core.state(), DeviceState::Uninit);
    }

    #[test]
    fn failed_teardown_keeps_device() {
        let core = DeviceCore::new(&HW);
        core.initialize(|| Ok(())).unwrap();
        assert_eq!(core.teardown(|| Err(Error::Timeout)), Err(Error::Timeout));
        assert_eq!(core.state(), DeviceState::Inited);
    }

    #[test]
    fn locked_reports_contention() {
        let core = DeviceCore::new(&HW);
        assert_eq!(core.locked(|| Ok(())), Err(Error::NotAllowed));
        core.initialize(|| Ok(())).unwrap();
        let _held = core.lock().unwrap();
        assert_eq!(core.locked(|| Ok(())), Err(Error::Timeout));
    }

    #[test]
    fn submit_hands_buffer_back_on_contention() {
        let core = DeviceCore::new(&HW);
        let rejected = core.submit(7u8, |_| Ok(())).unwrap_err();
        assert_eq!((rejected.error, rejected.buffer), (Error::NotAllowed, 7));
        core.initialize(|| Ok(())).unwrap();
        {
            let _held = core.lock().unwrap();
            let rejected = core.submit(8u8, |_| Ok(())).unwrap_err();
            assert_eq!((rejected.error, rejected.buffer), (Error::Timeout, 8));
        }
        assert!(core.submit(9u8, |_| Ok(())).is_ok());
    }
}
