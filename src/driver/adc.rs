//! ADC facade
//!
//! Continuous sampling into DMA packets. Receive only: each filled packet
//! holds raw 32-bit conversion words in FIFO order.

use core::any::Any;

use embedded_hal::delay::DelayNs;

use super::config::{AdcConfig, DeviceState, PeripheralHw};
use super::device::{Device, DeviceCore, Platform};
use super::error::Result;
use crate::hal::clock::ClockDomain;
use crate::hal::pinmux::PinMux;
use crate::stream::{RxCallback, RxPacket, RxPath};

/// ADC device with an `N`-deep packet ring.
pub struct Adc<const N: usize> {
    core: DeviceCore,
    rx: RxPath<N>,
}

impl<const N: usize> Adc<N> {
    /// Create an uninitialized device.
    #[must_use]
    pub const fn new(hw: &'static PeripheralHw) -> Self {
        Self {
            core: DeviceCore::new(hw),
            rx: RxPath::new(),
        }
    }

    /// Program the conversion clock and reserve a DMA channel.
    ///
    /// The packet size must be a multiple of 4; the result FIFO is word
    /// wide.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`](super::Error::NotAllowed): already initialized
    /// - [`Error::InvalidParameter`](super::Error::InvalidParameter): bad config
    /// - [`Error::Alignment`](super::Error::Alignment): packet size not a
    ///   multiple of 4
    /// - [`Error::Busy`](super::Error::Busy): no DMA channel in time
    pub fn init(
        &'static self,
        platform: Platform,
        config: &AdcConfig,
        callback: Option<&'static dyn RxCallback>,
        mux: &mut dyn PinMux,
        delay: &mut dyn DelayNs,
    ) -> Result<()> {
        let (hw, rx) = (self.core.hw(), &self.rx);
        self.core.initialize(move || {
            let setting = config.port_setting(platform.frequency(ClockDomain::Apb))?;
            platform.configure(hw, setting, mux)?;
            rx.attach(platform.rx_wiring(hw), &config.stream, callback, delay)?;
            Ok(())
        })
    }

    /// Stop sampling and give the channel back.
    pub fn deinit(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.teardown(|| self.rx.detach(delay))
    }

    /// Start converting.
    pub fn start(&self) -> Result<()> {
        self.core.locked(|| self.rx.start())
    }

    /// Stop converting; packets still in the ring are freed.
    pub fn stop(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.locked(|| self.rx.stop(delay))
    }

    /// Post one more packet.
    pub fn read_async(&self) -> Result<()> {
        self.core.locked(|| self.rx.request())
    }

    /// Give a packet back. Lock free.
    pub fn rx_release(&self, packet: RxPacket) -> Result<()> {
        self.rx.release(packet)
    }

    /// Receive path.
    pub fn rx(&self) -> &RxPath<N> {
        &self.rx
    }
}

impl<const N: usize> Device for Adc<N> {
    fn name(&self) -> &'static str {
        self.core.hw().name
    }

    fn state(&self) -> DeviceState {
        self.core.state()
    }

    fn hw(&self) -> &'static PeripheralHw {
        self.core.hw()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
