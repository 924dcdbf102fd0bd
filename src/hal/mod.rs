//! Hardware Abstraction Layer
//!
//! Traits for the collaborators the streaming core drives but does not
//! implement: clock gating, interrupt routing, pin multiplexing and the
//! peripheral register blocks. Chip support crates implement them; the
//! host tests use the mocks in `testing`.
//!
//! # Modules
//!
//! - [`clock`]: Clock gates with reference counting
//! - [`irq`]: Interrupt vector routing
//! - [`pinmux`]: Pin function selection
//! - [`port`]: Peripheral register programming
//!
//! # Delay Integration
//!
//! Bounded waits (channel requests, halting a channel) use
//! `embedded_hal::delay::DelayNs` directly. Pass any delay implementation
//! from your HAL.

pub mod clock;
pub mod irq;
pub mod pinmux;
pub mod port;

// Re-export commonly used types
pub use clock::{ClockControl, ClockDomain, ClockGate, ClockPort, ClockState};
pub use irq::{IrqController, IrqHandler, IrqLine};
pub use pinmux::{Direction, PinAssignment, PinMux, Pull};
pub use port::{I2sFormat, Parity, PortControl, PortSetting, StreamDir};
