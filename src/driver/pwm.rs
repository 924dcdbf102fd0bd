//! PWM facade
//!
//! Streams duty-cycle values from memory into the PWM compare FIFO. The
//! FIFO is word wide and each word carries four 8-bit duty values, so buffer
//! lengths must be a multiple of 4. Transmit only.

use core::any::Any;

use embedded_dma::ReadBuffer;
use embedded_hal::delay::DelayNs;

use super::config::{DeviceState, PeripheralHw, PwmConfig};
use super::device::{Device, DeviceCore, Platform};
use super::error::{Result, SubmitResult};
use crate::hal::clock::ClockDomain;
use crate::hal::pinmux::PinMux;
use crate::stream::{TxCallback, TxPath};

/// PWM device with an `N`-deep buffer ring.
pub struct Pwm<B: 'static, const N: usize> {
    core: DeviceCore,
    tx: TxPath<B, N>,
}

impl<B, const N: usize> Pwm<B, N>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    /// Create an uninitialized device.
    #[must_use]
    pub const fn new(hw: &'static PeripheralHw) -> Self {
        Self {
            core: DeviceCore::new(hw),
            tx: TxPath::new(),
        }
    }

    /// Program the prescaler and reserve a DMA channel.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`](super::Error::NotAllowed): already initialized
    /// - [`Error::InvalidParameter`](super::Error::InvalidParameter): bad config
    /// - [`Error::Busy`](super::Error::Busy): no DMA channel in time
    pub fn init(
        &'static self,
        platform: Platform,
        config: &PwmConfig,
        callback: Option<&'static dyn TxCallback<B>>,
        mux: &mut dyn PinMux,
        delay: &mut dyn DelayNs,
    ) -> Result<()> {
        let (hw, tx) = (self.core.hw(), &self.tx);
        self.core.initialize(move || {
            let setting = config.port_setting(platform.frequency(ClockDomain::Apb))?;
            platform.configure(hw, setting, mux)?;
            tx.attach(
                platform.tx_wiring(hw),
                callback,
                config.stream.channel_timeout_us,
                delay,
            )?;
            Ok(())
        })
    }

    /// Stop output and give the channel back.
    pub fn deinit(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.teardown(|| self.tx.detach(delay))
    }

    /// Start output.
    pub fn start(&self) -> Result<()> {
        self.core.locked(|| self.tx.start())
    }

    /// Stop output; queued buffers come back aborted.
    pub fn stop(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.locked(|| self.tx.stop(delay))
    }

    /// Queue a buffer of duty values.
    pub fn write_async(&self, buffer: B) -> SubmitResult<B> {
        self.core.submit(buffer, |b| self.tx.submit(b))
    }

    /// Transmit path.
    pub fn tx(&self) -> &TxPath<B, N> {
        &self.tx
    }
}

impl<B, const N: usize> Device for Pwm<B, N>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
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
