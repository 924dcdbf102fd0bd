//! Synchronization and Concurrency Support
//!
//! Two execution contexts touch driver state: application tasks and the DMA
//! interrupt. Task entry points serialize on a per-device [`DeviceMutex`];
//! the interrupt never takes that lock. State the interrupt shares with tasks
//! lives either in a [`CriticalSectionCell`] or in a ring whose cursors each
//! have a single writer (see [`crate::stream::IndexRing`]).
//!
//! # Example
//!
//! ```ignore
//! use wm_dma_stream::sync::{CriticalSectionCell, DeviceMutex};
//!
//! static COUNT: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
//! static LOCK: DeviceMutex = DeviceMutex::new();
//!
//! let _guard = LOCK.lock(1_000)?;
//! COUNT.with(|c| *c += 1);
//! ```

mod primitives;

pub use primitives::{CriticalSectionCell, DeviceGuard, DeviceMutex};
