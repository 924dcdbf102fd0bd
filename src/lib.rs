//! W800 DMA Streaming Core
//!
//! A `no_std` streaming layer that keeps a DMA channel fed from a ring of
//! caller buffers, for the W800 family of microcontrollers.
//!
//! Peripherals such as I2S, UART, ADC and PWM move data continuously: the
//! application hands buffers in, the DMA drains or fills them, and the
//! completion interrupt hands them back and queues the next ones before the
//! channel runs dry.
//!
//! # Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Facades** ([`driver`]): `I2s`, `Uart`, `Adc`, `Pwm` with
//!    `init` / `start` / `write_async` / `read_async` / `stop` / `deinit`
//! 2. **Stream engine** ([`stream`]): per-direction node rings and the
//!    completion dispatcher
//! 3. **DMA** ([`dma`]): channel pool, descriptor builder, interrupt routing
//! 4. **HAL seams** ([`hal`]): clock, IRQ, pinmux and peripheral register traits
//!
//! ```text
//!   write_async ──► NodeContainer ──pick──► DmaPort::append ──► hardware
//!                        ▲                                          │
//!   on_tx_done ◄── pop ──┴──── dispatcher ◄── DmaController IRQ ◄───┘
//! ```
//!
//! # Concurrency
//!
//! Task-context entry points take a per-device mutex. The dispatcher runs in
//! interrupt context and never takes it; ring cursors have one writer each.
//!
//! # Features
//!
//! - `w800` (default): W800 address map and peripheral descriptions
//! - `log`: Forward internal logging to the `log` facade
//! - `defmt`: Forward internal logging to `defmt` and derive `defmt::Format`
//!
//! # Example
//!
//! ```ignore
//! use wm_dma_stream::boards::w800::{self, W800};
//! use wm_dma_stream::dma::DmaController;
//! use wm_dma_stream::driver::{I2s, I2sConfig, Platform};
//!
//! static DMA: DmaController<ChipDma> = DmaController::new(ChipDma::new(), w800::MEMORY_MAP);
//! static CLOCK: ClockGate<ChipRcc> = ClockGate::new(ChipRcc::new());
//! static I2S: I2s<&'static [u8], 8, 4> = I2s::new(&w800::I2S);
//!
//! DMA.init(&irq, W800::DMA_IRQ, || DMA.on_interrupt());
//! let platform = Platform { dma: &DMA, clock: &CLOCK, port: &I2S_REGS };
//! I2S.init(platform, &I2sConfig::new(), Some(&PLAYER), None, &mut mux, &mut delay)?;
//! I2S.start_tx()?;
//! I2S.write_async(&SAMPLES)?;
//! ```
//!
//! # Memory
//!
//! Rings and descriptors for streaming are statically sized. The heap is used
//! for RX packets and list-mode descriptor chains, always through fallible
//! allocation; exhaustion surfaces as [`Error::NoMemory`].

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
mod fmt;

// =============================================================================
// Modules
// =============================================================================

#[cfg(feature = "w800")]
#[cfg_attr(docsrs, doc(cfg(feature = "w800")))]
pub mod boards;
pub mod dma;
pub mod driver;
pub mod hal;
pub mod stream;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use dma::{Channel, DmaController, DmaMode, DmaPort, MemoryMap, Transfer};
pub use driver::config::{
    AdcConfig, DeviceState, I2sConfig, PeripheralHw, PwmConfig, StreamConfig, UartConfig,
};
pub use driver::error::{Error, Rejected, Result, SubmitResult};
pub use driver::{Adc, Device, DeviceRegistry, I2s, Platform, Pwm, Uart};
pub use stream::{RxCallback, RxPacket, StopReason, TxCallback, TxStatus};
