use meter_client::domain::{BilledAmount, Rate, UsageObservation};

/// Prices one observation and splits it across the room's occupants.
///
/// `occupancy` of `None` (directory unavailable) or `Some(0)` bills the whole
/// amount to the room. Negative usage yields a negative total; anomaly
/// handling belongs to the deriver and the operator.
pub fn bill(observation: &UsageObservation, rate: Rate, occupancy: Option<u32>) -> BilledAmount {
    let total = rate.charge(observation.usage);
    let divisor = occupancy.filter(|n| *n > 0).unwrap_or(1);

    BilledAmount {
        rate,
        total,
        divisor,
        per_head: total.share(divisor),
    }
}
