//! Synchronization primitives for ISR-safe access.
//!
//! - [`CriticalSectionCell`]: state touched from both task and interrupt context
//! - [`DeviceMutex`]: per-device lock serializing task-context entry points

use core::cell::RefCell;
use critical_section::Mutex;
use portable_atomic::{AtomicBool, Ordering};

use crate::driver::error::{Error, Result};

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable access
/// from both normal code and interrupt handlers.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Execute a closure with exclusive mutable access.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow_mut()
                .ok()
                .map(|mut value| f(&mut value))
        })
    }
}

impl<T: Copy> CriticalSectionCell<T> {
    /// Copy the current value out.
    #[inline]
    pub fn get(&self) -> T {
        critical_section::with(|cs| *self.inner.borrow_ref(cs))
    }

    /// Replace the current value.
    #[inline]
    pub fn set(&self, value: T) {
        critical_section::with(|cs| *self.inner.borrow_ref_mut(cs) = value);
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}

/// Per-device lock for task-context entry points.
///
/// Never taken from interrupt context: the completion path relies on the
/// single-writer cursor discipline of the rings instead. Acquisition spins
/// for a bounded budget and reports [`Error::Timeout`] rather than blocking
/// forever.
pub struct DeviceMutex {
    locked: AtomicBool,
}

impl DeviceMutex {
    /// Create an unlocked mutex (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Try once to take the lock.
    #[inline]
    pub fn try_lock(&self) -> Option<DeviceGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| DeviceGuard { mutex: self })
    }

    /// Take the lock, spinning up to `spins` times.
    pub fn lock(&self, spins: u32) -> Result<DeviceGuard<'_>> {
        let mut remaining = spins;
        loop {
            if let Some(guard) = self.try_lock() {
                return Ok(guard);
            }
            if remaining == 0 {
                return Err(Error::Timeout);
            }
            remaining -= 1;
            core::hint::spin_loop();
        }
    }

    /// Check whether some context currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for DeviceMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the [`DeviceMutex`] when dropped.
pub struct DeviceGuard<'a> {
    mutex: &'a DeviceMutex,
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Ordering::Release);
    }
}
