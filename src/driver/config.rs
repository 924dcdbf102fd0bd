//! Configuration types for the streaming peripherals.
//!
//! Each facade takes a builder-style config (`new()` plus `with_*` setters)
//! and validates it at init. Register-level values (dividers, prescalers) are
//! derived from the config and the current clock frequency by
//! `port_setting`; the facade hands the result to its
//! [`PortControl`](crate::hal::PortControl).
//!
//! [`PeripheralHw`] is the static half of a device: FIFO addresses, DMA
//! request lines, clock gates and pin routing. Board files provide one per
//! peripheral instance.

use crate::driver::error::{Error, Result};
use crate::hal::pinmux::PinAssignment;
use crate::hal::port::{I2sFormat, Parity, PortSetting};
use crate::internal::constants::{
    DEFAULT_CHANNEL_TIMEOUT_US, DEFAULT_PACKET_SIZE, DEFAULT_PENDING_THRESHOLD, DMA_MAX_LEN,
};

// =============================================================================
// Device lifecycle
// =============================================================================

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceState {
    /// Not initialized
    #[default]
    Uninit = 0,
    /// `init` in progress
    Initing = 1,
    /// Ready for use
    Inited = 2,
}

impl DeviceState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DeviceState::Initing,
            2 => DeviceState::Inited,
            _ => DeviceState::Uninit,
        }
    }
}

// =============================================================================
// Static hardware description
// =============================================================================

/// Static description of one peripheral instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralHw {
    /// Registry name
    pub name: &'static str,
    /// Transmit FIFO register address
    pub tx_fifo: u32,
    /// Receive FIFO register address
    pub rx_fifo: u32,
    /// DMA request line for transmit
    pub tx_request: u8,
    /// DMA request line for receive
    pub rx_request: u8,
    /// Clock gate bits the peripheral needs while streaming
    pub clock_mask: u32,
    /// Pin routing applied at init
    pub pins: &'static [PinAssignment],
}

// =============================================================================
// Stream configuration
// =============================================================================

/// Per-direction streaming parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Size of each RX packet buffer in bytes
    pub packet_size: usize,
    /// RX packets the application may hold before the stream stops
    pub pending_threshold: usize,
    /// Wait budget for reserving a DMA channel (microseconds)
    pub channel_timeout_us: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packet_size: DEFAULT_PACKET_SIZE,
            pending_threshold: DEFAULT_PENDING_THRESHOLD,
            channel_timeout_us: DEFAULT_CHANNEL_TIMEOUT_US,
        }
    }

    /// Set the RX packet size.
    #[must_use]
    pub const fn with_packet_size(mut self, bytes: usize) -> Self {
        self.packet_size = bytes;
        self
    }

    /// Set the RX pending threshold.
    #[must_use]
    pub const fn with_pending_threshold(mut self, packets: usize) -> Self {
        self.pending_threshold = packets;
        self
    }

    /// Set the channel reservation timeout.
    #[must_use]
    pub const fn with_channel_timeout_us(mut self, timeout_us: u32) -> Self {
        self.channel_timeout_us = timeout_us;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the packet size is zero or larger
    /// than one descriptor can carry.
    pub const fn validate(&self) -> Result<()> {
        if self.packet_size == 0 || self.packet_size > DMA_MAX_LEN {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

fn divide(clock_hz: u32, rate: u64) -> Result<u16> {
    if rate == 0 {
        return Err(Error::InvalidParameter);
    }
    let div = u64::from(clock_hz) / rate;
    match u16::try_from(div) {
        Ok(0) | Err(_) => Err(Error::InvalidParameter),
        Ok(d) => Ok(d),
    }
}

// =============================================================================
// I2S
// =============================================================================

/// I2S configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2sConfig {
    /// Frames per second
    pub sample_rate: u32,
    /// Bits per sample: 8, 16, 24 or 32
    pub bits: u8,
    /// Two channels per frame
    pub stereo: bool,
    /// Frame format
    pub format: I2sFormat,
    /// Master clock as a multiple of the sample rate
    pub mclk_ratio: u16,
    /// Streaming parameters
    pub stream: StreamConfig,
}

impl Default for I2sConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl I2sConfig {
    /// 44.1 kHz, 16-bit stereo, Philips format, MCLK = 256 fs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample_rate: 44_100,
            bits: 16,
            stereo: true,
            format: I2sFormat::Philips,
            mclk_ratio: 256,
            stream: StreamConfig::new(),
        }
    }

    /// Set the sample rate.
    #[must_use]
    pub const fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz;
        self
    }

    /// Set the sample width.
    #[must_use]
    pub const fn with_bits(mut self, bits: u8) -> Self {
        self.bits = bits;
        self
    }

    /// Select mono or stereo.
    #[must_use]
    pub const fn with_stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    /// Set the frame format.
    #[must_use]
    pub const fn with_format(mut self, format: I2sFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the streaming parameters.
    #[must_use]
    pub const fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a zero rate, an unsupported width or
    /// an invalid stream config.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.mclk_ratio == 0 {
            return Err(Error::InvalidParameter);
        }
        if !matches!(self.bits, 8 | 16 | 24 | 32) {
            return Err(Error::InvalidParameter);
        }
        self.stream.validate()
    }

    /// Derive the serializer settings from the audio clock.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if a divider falls outside `1..=65535`.
    pub fn port_setting(&self, audio_hz: u32) -> Result<PortSetting> {
        self.validate()?;
        let channels: u64 = if self.stereo { 2 } else { 1 };
        let mclk = u64::from(self.sample_rate) * u64::from(self.mclk_ratio);
        let bclk = u64::from(self.sample_rate) * u64::from(self.bits) * channels;
        Ok(PortSetting::I2s {
            mclk_div: divide(audio_hz, mclk)?,
            bclk_div: divide(audio_hz, bclk)?,
            bits: self.bits,
            stereo: self.stereo,
            format: self.format,
        })
    }
}

// =============================================================================
// UART
// =============================================================================

/// UART configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate
    pub baud: u32,
    /// Data bits per character: 5 to 8
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Two stop bits
    pub two_stop: bool,
    /// Streaming parameters
    pub stream: StreamConfig,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl UartConfig {
    /// 115200 8N1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            baud: 115_200,
            data_bits: 8,
            parity: Parity::None,
            two_stop: false,
            stream: StreamConfig::new().with_packet_size(256),
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub const fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set the parity.
    #[must_use]
    pub const fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the character width.
    #[must_use]
    pub const fn with_data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Use two stop bits.
    #[must_use]
    pub const fn with_two_stop_bits(mut self, two: bool) -> Self {
        self.two_stop = two;
        self
    }

    /// Set the streaming parameters.
    #[must_use]
    pub const fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a zero baud rate, a character width
    /// outside 5..=8 or an invalid stream config.
    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 || !(5..=8).contains(&self.data_bits) {
            return Err(Error::InvalidParameter);
        }
        self.stream.validate()
    }

    /// Derive the baud divider (16x oversampling) from the bus clock.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the baud rate is out of reach.
    pub fn port_setting(&self, apb_hz: u32) -> Result<PortSetting> {
        self.validate()?;
        // Divider in sixteenths of the 16x sample clock.
        let div16 = u64::from(apb_hz) / u64::from(self.baud);
        let divisor = u16::try_from(div16 / 16).map_err(|_| Error::InvalidParameter)?;
        if divisor == 0 {
            return Err(Error::InvalidParameter);
        }
        Ok(PortSetting::Uart {
            divisor,
            fraction: (div16 % 16) as u8,
            data_bits: self.data_bits,
            parity: self.parity,
            two_stop: self.two_stop,
        })
    }
}

// =============================================================================
// ADC
// =============================================================================

/// ADC configuration for continuous DMA sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcConfig {
    /// Analog input channel (0..=7)
    pub channel: u8,
    /// Conversions per second
    pub sample_rate: u32,
    /// Streaming parameters
    pub stream: StreamConfig,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcConfig {
    /// Channel 0 at 1 kHz.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: 0,
            sample_rate: 1_000,
            stream: StreamConfig::new().with_packet_size(256),
        }
    }

    /// Select the input channel.
    #[must_use]
    pub const fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Set the conversion rate.
    #[must_use]
    pub const fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz;
        self
    }

    /// Set the streaming parameters.
    #[must_use]
    pub const fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a channel above 7, a zero rate or an
    /// invalid stream config.
    pub fn validate(&self) -> Result<()> {
        if self.channel > 7 || self.sample_rate == 0 {
            return Err(Error::InvalidParameter);
        }
        self.stream.validate()
    }

    /// Derive the conversion clock divider.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the rate is out of reach.
    pub fn port_setting(&self, apb_hz: u32) -> Result<PortSetting> {
        self.validate()?;
        Ok(PortSetting::Adc {
            channel: self.channel,
            clk_div: divide(apb_hz, u64::from(self.sample_rate))?,
        })
    }
}

// =============================================================================
// PWM
// =============================================================================

/// PWM configuration for DMA duty-cycle streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmConfig {
    /// Output channel (0..=4)
    pub channel: u8,
    /// Output frequency in Hz
    pub frequency: u32,
    /// Counter period (duty resolution is `period + 1` steps)
    pub period: u8,
    /// Streaming parameters
    pub stream: StreamConfig,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmConfig {
    /// Channel 0, 1 kHz, 256 steps.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: 0,
            frequency: 1_000,
            period: 255,
            stream: StreamConfig::new(),
        }
    }

    /// Select the output channel.
    #[must_use]
    pub const fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Set the output frequency.
    #[must_use]
    pub const fn with_frequency(mut self, hz: u32) -> Self {
        self.frequency = hz;
        self
    }

    /// Set the counter period.
    #[must_use]
    pub const fn with_period(mut self, period: u8) -> Self {
        self.period = period;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a channel above 4 or a zero frequency.
    pub fn validate(&self) -> Result<()> {
        if self.channel > 4 || self.frequency == 0 {
            return Err(Error::InvalidParameter);
        }
        self.stream.validate()
    }

    /// Derive the prescaler so that `apb / (prescaler + 1) / (period + 1)`
    /// is the output frequency.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the frequency is out of reach.
    pub fn port_setting(&self, apb_hz: u32) -> Result<PortSetting> {
        self.validate()?;
        let steps = u64::from(self.frequency) * (u64::from(self.period) + 1);
        let div = divide(apb_hz, steps)?;
        let prescaler = u8::try_from(div - 1).map_err(|_| Error::InvalidParameter)?;
        Ok(PortSetting::Pwm {
            channel: self.channel,
            prescaler,
            period: self.period,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
