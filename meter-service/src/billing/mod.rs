//! Usage deltas and currency figures derived from stored readings.
//!
//! Nothing here is persisted: every query recomputes from the canonical
//! reading history.

pub mod calculator;
pub mod rates;
pub mod usage;
pub mod view;

pub use calculator::bill;
pub use rates::{RateBook, RateUpdate, Rates};
pub use usage::{derive_usage, UsageError};
pub use view::{build_partition_view, DateRange, DerivedRow, Occupancy};
