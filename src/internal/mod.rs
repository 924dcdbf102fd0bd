//! Internal Implementation Details
//!
//! Items here are `pub(crate)` and may change without notice.
//!
//! # Contents
//!
//! - [`constants`]: Channel counts, limits, magic numbers and default budgets

pub(crate) mod constants;
