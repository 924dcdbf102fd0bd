//! Error types for the DMA streaming core
//!
//! Every public operation reports one of a small set of error *kinds*. The
//! kind tells the caller what to do next:
//!
//! - [`Error::InvalidParameter`]: fix the call (bad length, channel, buffer)
//! - [`Error::NotAllowed`]: valid request, wrong state (not started, not initialized)
//! - [`Error::Busy`] / [`Error::Timeout`]: contention, try again later
//! - [`Error::NoMemory`]: ring full or allocation failed, back off and retry
//! - [`Error::Alignment`]: transfer length violates the unit size of the memory region
//! - [`Error::Failed`]: the hardware layer refused the request

use core::fmt;

/// Error kinds returned by driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Precondition violated by the caller (zero length, out-of-range channel, ...)
    InvalidParameter,
    /// Request is valid but the device or stream is in the wrong state
    NotAllowed,
    /// Shared resource (DMA channel pool) unavailable within the wait budget
    Busy,
    /// Lock acquisition or hardware halt did not complete in time
    Timeout,
    /// No free ring slot or heap allocation failed
    NoMemory,
    /// Word-unit transfer whose length is not a multiple of 4
    Alignment,
    /// Hardware-level failure not otherwise categorized
    Failed,
}

impl Error {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::InvalidParameter => "invalid parameter",
            Error::NotAllowed => "operation not allowed in current state",
            Error::Busy => "resource busy",
            Error::Timeout => "operation timed out",
            Error::NoMemory => "no memory",
            Error::Alignment => "transfer length not aligned to unit size",
            Error::Failed => "operation failed",
        }
    }

    /// True for kinds that clear up on their own (retry makes sense).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Error::Busy | Error::Timeout | Error::NoMemory)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Error::NoMemory
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// A submission that was refused, handing the caller's buffer back.
///
/// Buffers are moved into the driver on submit; when the driver cannot take
/// them the caller gets ownership back together with the reason.
#[derive(Debug)]
pub struct Rejected<B> {
    /// Why the buffer was refused
    pub error: Error,
    /// The buffer, untouched
    pub buffer: B,
}

impl<B> Rejected<B> {
    pub(crate) const fn new(error: Error, buffer: B) -> Self {
        Self { error, buffer }
    }

    /// Drop the buffer and keep the error.
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl<B> From<Rejected<B>> for Error {
    fn from(r: Rejected<B>) -> Self {
        r.error
    }
}

/// Result of handing a buffer to the driver.
pub type SubmitResult<B> = core::result::Result<(), Rejected<B>>;

// =============================================================================
// Unit Tests
// =============================================================================
