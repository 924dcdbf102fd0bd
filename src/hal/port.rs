//! Peripheral register seam.
//!
//! Each facade programs its peripheral through a [`PortControl`]: one call
//! at init with the computed [`PortSetting`], then DMA request gating on
//! start and stop.

/// Data direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamDir {
    /// Memory to peripheral
    Tx,
    /// Peripheral to memory
    Rx,
}

impl core::fmt::Display for StreamDir {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            StreamDir::Tx => "tx",
            StreamDir::Rx => "rx",
        })
    }
}

/// I2S frame format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sFormat {
    /// Philips I2S
    #[default]
    Philips,
    /// Left justified (MSB)
    LeftJustified,
    /// PCM short frame
    Pcm,
}

/// UART parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Register-level settings computed by a facade at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortSetting {
    /// I2S serializer
    I2s {
        /// Master clock divider
        mclk_div: u16,
        /// Bit clock divider
        bclk_div: u16,
        /// Bits per sample
        bits: u8,
        /// Two channels
        stereo: bool,
        /// Frame format
        format: I2sFormat,
    },
    /// UART
    Uart {
        /// Integer part of the baud divider
        divisor: u16,
        /// Fractional part (sixteenths)
        fraction: u8,
        /// Data bits per character
        data_bits: u8,
        /// Parity
        parity: Parity,
        /// Two stop bits
        two_stop: bool,
    },
    /// ADC in continuous conversion
    Adc {
        /// Analog channel
        channel: u8,
        /// Conversion clock divider
        clk_div: u16,
    },
    /// PWM in DMA capture/update mode
    Pwm {
        /// Channel
        channel: u8,
        /// Prescaler
        prescaler: u8,
        /// Counter period
        period: u8,
    },
}

/// Peripheral register layer.
pub trait PortControl: Sync {
    /// Apply the settings computed at init.
    fn apply(&self, setting: PortSetting);
    /// Gate the peripheral's DMA request line for one direction.
    fn set_dma_request(&self, dir: StreamDir, enable: bool);
}
