//! Interrupt controller seam.
//!
//! The DMA completion dispatcher is an ordinary vector handler: the
//! application attaches a `fn()` that forwards to
//! [`DmaController::on_interrupt`](crate::dma::DmaController::on_interrupt).
//! Saving and restoring the global interrupt mask for short critical
//! sections goes through `critical_section::with`, not this trait.

/// Interrupt line number.
pub type IrqLine = u16;

/// Vector handler.
pub type IrqHandler = fn();

/// Interrupt controller.
pub trait IrqController: Sync {
    /// Install `handler` as the vector for `irq`.
    fn attach_vector(&self, irq: IrqLine, handler: IrqHandler);
    /// Unmask `irq`.
    fn enable(&self, irq: IrqLine);
    /// Mask `irq`.
    fn disable(&self, irq: IrqLine);
}
