//! Peripheral drivers built on the streaming engine.
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error kinds and result aliases
//! - [`device`] - Lifecycle, locking and the generic device handle
//! - [`registry`] - Name-based device lookup
//! - [`i2s`], [`uart`], [`adc`], [`pwm`] - Peripheral facades
//!
//! # Example
//!
//! ```ignore
//! use wm_dma_stream::driver::{I2s, I2sConfig, StreamConfig};
//!
//! let config = I2sConfig::new()
//!     .with_sample_rate(48_000)
//!     .with_stream(StreamConfig::new().with_packet_size(512));
//! ```

// Submodules
pub mod adc;
pub mod config;
pub mod device;
pub mod error;
pub mod i2s;
pub mod pwm;
pub mod registry;
pub mod uart;

// Re-exports for convenience
pub use adc::Adc;
pub use config::{
    AdcConfig, DeviceState, I2sConfig, PeripheralHw, PwmConfig, StreamConfig, UartConfig,
};
pub use device::{Device, Platform};
pub use error::{Error, Rejected, Result, SubmitResult};
pub use i2s::I2s;
pub use pwm::Pwm;
pub use registry::DeviceRegistry;
pub use uart::Uart;
