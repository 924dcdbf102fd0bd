//! Streaming engine
//!
//! Rings of transfer nodes in front of a DMA channel, one per direction.
//!
//! ```text
//!  write_async ─► push ─► [ ready │ in flight ] ─► pick ─► DMA queue
//!                              ▲                            │
//!        on_tx_done ◄─ pop ◄───┴──────── completion IRQ ◄───┘
//! ```
//!
//! # Concurrency
//!
//! Task context pushes nodes and, when the channel is idle, picks the first
//! ones with interrupts masked. The completion dispatcher runs in interrupt
//! context: it pops finished nodes, reports them, and picks more. It never
//! takes the device mutex; each ring cursor has one writer at a time.

mod link;
mod nbc;
mod ring;
mod rx;
mod tx;

pub use link::Wiring;
pub use nbc::{NodeContainer, RxPacket};
pub use ring::{IndexRing, RingSnapshot};
pub use rx::{RxCallback, RxPath, StopReason};
pub use tx::{TxCallback, TxPath, TxStatus};
