//! UART facade
//!
//! Byte streaming over DMA in both directions. Same shape as the I2S
//! facade; the FIFOs are byte-wide so any buffer length is accepted.

use core::any::Any;

use embedded_dma::ReadBuffer;
use embedded_hal::delay::DelayNs;

use super::config::{DeviceState, PeripheralHw, UartConfig};
use super::device::{Device, DeviceCore, Platform};
use super::error::{Result, SubmitResult};
use crate::hal::clock::ClockDomain;
use crate::hal::pinmux::PinMux;
use crate::stream::{RxCallback, RxPacket, RxPath, TxCallback, TxPath};

/// UART device.
pub struct Uart<B: 'static, const TXN: usize, const RXN: usize> {
    core: DeviceCore,
    tx: TxPath<B, TXN>,
    rx: RxPath<RXN>,
}

impl<B, const TXN: usize, const RXN: usize> Uart<B, TXN, RXN>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    /// Create an uninitialized device.
    #[must_use]
    pub const fn new(hw: &'static PeripheralHw) -> Self {
        Self {
            core: DeviceCore::new(hw),
            tx: TxPath::new(),
            rx: RxPath::new(),
        }
    }

    /// Route pins, program the line settings and reserve two DMA channels.
    ///
    /// # Errors
    ///
    /// As for [`I2s::init`](super::I2s::init), with the baud divider taken
    /// from the bus clock.
    pub fn init(
        &'static self,
        platform: Platform,
        config: &UartConfig,
        tx_callback: Option<&'static dyn TxCallback<B>>,
        rx_callback: Option<&'static dyn RxCallback>,
        mux: &mut dyn PinMux,
        delay: &mut dyn DelayNs,
    ) -> Result<()> {
        let (hw, tx, rx) = (self.core.hw(), &self.tx, &self.rx);
        self.core.initialize(move || {
            let setting = config.port_setting(platform.frequency(ClockDomain::Apb))?;
            platform.configure(hw, setting, mux)?;
            tx.attach(
                platform.tx_wiring(hw),
                tx_callback,
                config.stream.channel_timeout_us,
                delay,
            )?;
            if let Err(e) = rx.attach(platform.rx_wiring(hw), &config.stream, rx_callback, delay) {
                if let Err(undo) = tx.detach(delay) {
                    warn!("{}: tx rollback failed: {}", hw.name, undo);
                }
                return Err(e);
            }
            Ok(())
        })
    }

    /// Stop both directions and give the DMA channels back.
    pub fn deinit(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.teardown(|| {
            // Halt both directions before either channel is released.
            self.tx.stop(delay)?;
            self.rx.stop(delay)?;
            self.tx.detach(delay)?;
            self.rx.detach(delay)
        })
    }

    /// Start the transmit direction.
    pub fn start_tx(&self) -> Result<()> {
        self.core.locked(|| self.tx.start())
    }

    /// Stop the transmit direction; queued buffers come back aborted.
    pub fn stop_tx(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.locked(|| self.tx.stop(delay))
    }

    /// Queue bytes for transmission.
    pub fn write_async(&self, buffer: B) -> SubmitResult<B> {
        self.core.submit(buffer, |b| self.tx.submit(b))
    }

    /// Start the receive direction.
    pub fn start_rx(&self) -> Result<()> {
        self.core.locked(|| self.rx.start())
    }

    /// Stop the receive direction.
    pub fn stop_rx(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.locked(|| self.rx.stop(delay))
    }

    /// Post one more receive packet.
    pub fn read_async(&self) -> Result<()> {
        self.core.locked(|| self.rx.request())
    }

    /// Give a received packet back. Lock free.
    pub fn rx_release(&self, packet: RxPacket) -> Result<()> {
        self.rx.release(packet)
    }

    /// Transmit path.
    pub fn tx(&self) -> &TxPath<B, TXN> {
        &self.tx
    }

    /// Receive path.
    pub fn rx(&self) -> &RxPath<RXN> {
        &self.rx
    }
}

impl<B, const TXN: usize, const RXN: usize> Device for Uart<B, TXN, RXN>
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
