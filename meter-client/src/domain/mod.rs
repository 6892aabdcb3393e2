pub mod money;
pub mod reading;
pub mod tenant;
pub mod usage;

pub use money::{AmountParseError, Money, Rate};
pub use reading::{
    MeterType, NewReading, PartitionKey, Reading, ReadingValue, ReadingValueError, UnknownMeterType,
    MAX_READING_DIGITS,
};
pub use tenant::{NewTenant, Tenant};
pub use usage::{BilledAmount, UsageObservation};
