use serde::Serialize;
use time::OffsetDateTime;

use super::{Money, Rate, ReadingValue};

/// Usage derived for one reading against its predecessor in the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageObservation {
    pub reading_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    pub reading_value: ReadingValue,
    /// `None` exactly for the baseline reading of a partition.
    pub previous_reading_value: Option<ReadingValue>,
    pub usage: i64,
    /// Set when the meter went backwards (rollback, replacement or misread).
    pub anomaly: bool,
}

/// Currency figures for one usage observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BilledAmount {
    pub rate: Rate,
    pub total: Money,
    /// Occupants the total was split across; at least 1.
    pub divisor: u32,
    pub per_head: Money,
}
