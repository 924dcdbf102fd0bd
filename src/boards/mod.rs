//! Board-specific address maps and peripheral descriptions.
//!
//! A board module provides the [`MemoryMap`](crate::dma::MemoryMap) the
//! descriptor builder classifies addresses with, one
//! [`PeripheralHw`](crate::driver::PeripheralHw) per streaming peripheral and
//! the DMA interrupt line.
//!
//! # Supported Boards
//!
//! - W800 (XT804, 288 KiB SRAM, optional PSRAM)

#[cfg(feature = "w800")]
#[cfg_attr(docsrs, doc(cfg(feature = "w800")))]
pub mod w800;
