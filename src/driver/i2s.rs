//! I2S facade
//!
//! Full-duplex audio streaming. Transmit buffers are moved in with
//! [`I2s::write_async`] and returned through the [`TxCallback`]; received
//! packets arrive through the [`RxCallback`] and go back with
//! [`I2s::rx_release`]. Both FIFOs are word-wide, so transmit lengths must be
//! a multiple of 4 bytes.
//!
//! # Example
//!
//! ```ignore
//! static I2S: I2s<&'static [u8], 8, 4> = I2s::new(&boards::w800::I2S);
//!
//! I2S.init(platform, &I2sConfig::new(), Some(&PLAYER), Some(&RECORDER), &mut mux, &mut delay)?;
//! I2S.start_tx()?;
//! I2S.write_async(&SAMPLES)?;
//! ```

use core::any::Any;

use embedded_dma::ReadBuffer;
use embedded_hal::delay::DelayNs;

use super::config::{DeviceState, I2sConfig, PeripheralHw};
use super::device::{Device, DeviceCore, Platform};
use super::error::{Result, SubmitResult};
use crate::hal::clock::ClockDomain;
use crate::hal::pinmux::PinMux;
use crate::stream::{RxCallback, RxPacket, RxPath, TxCallback, TxPath};

/// I2S device with a `TXN`-deep transmit ring and an `RXN`-deep receive
/// ring.
pub struct I2s<B: 'static, const TXN: usize, const RXN: usize> {
    core: DeviceCore,
    tx: TxPath<B, TXN>,
    rx: RxPath<RXN>,
}

impl<B, const TXN: usize, const RXN: usize> I2s<B, TXN, RXN>
where
    B: ReadBuffer<Word = u8> + Send + 'static,
{
    /// Create an uninitialized device (const, suitable for static
    /// initialization).
    #[must_use]
    pub const fn new(hw: &'static PeripheralHw) -> Self {
        Self {
            core: DeviceCore::new(hw),
            tx: TxPath::new(),
            rx: RxPath::new(),
        }
    }

    /// Route pins, program the serializer and reserve one DMA channel per
    /// direction.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllowed`](super::Error::NotAllowed): already initialized
    /// - [`Error::InvalidParameter`](super::Error::InvalidParameter): bad config
    ///   or rate out of reach of the audio clock
    /// - [`Error::Busy`](super::Error::Busy): no DMA channel in time
    pub fn init(
        &'static self,
        platform: Platform,
        config: &I2sConfig,
        tx_callback: Option<&'static dyn TxCallback<B>>,
        rx_callback: Option<&'static dyn RxCallback>,
        mux: &mut dyn PinMux,
        delay: &mut dyn DelayNs,
    ) -> Result<()> {
        let (hw, tx, rx) = (self.core.hw(), &self.tx, &self.rx);
        self.core.initialize(move || {
            let setting = config.port_setting(platform.frequency(ClockDomain::Audio))?;
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
    ///
    /// # Errors
    ///
    /// [`Error::NotAllowed`](super::Error::NotAllowed) if not initialized;
    /// [`Error::Timeout`](super::Error::Timeout) if a channel does not halt.
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

    /// Queue a buffer for playback. See [`TxPath::submit`].
    pub fn write_async(&self, buffer: B) -> SubmitResult<B> {
        self.core.submit(buffer, |b| self.tx.submit(b))
    }

    /// Start the receive direction with a full ring of packets.
    pub fn start_rx(&self) -> Result<()> {
        self.core.locked(|| self.rx.start())
    }

    /// Stop the receive direction and free the packets still in the ring.
    pub fn stop_rx(&self, delay: &mut dyn DelayNs) -> Result<()> {
        self.core.locked(|| self.rx.stop(delay))
    }

    /// Post one more receive packet. See [`RxPath::request`].
    pub fn read_async(&self) -> Result<()> {
        self.core.locked(|| self.rx.request())
    }

    /// Give a received packet back. Does not take the device lock.
    pub fn rx_release(&self, packet: RxPacket) -> Result<()> {
        self.rx.release(packet)
    }

    /// Transmit path, for diagnostics.
    pub fn tx(&self) -> &TxPath<B, TXN> {
        &self.tx
    }

    /// Receive path, for diagnostics.
    pub fn rx(&self) -> &RxPath<RXN> {
        &self.rx
    }
}

impl<B, const TXN: usize, const RXN: usize> Device for I2s<B, TXN, RXN>
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
