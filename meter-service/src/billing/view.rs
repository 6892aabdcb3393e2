use meter_client::domain::{BilledAmount, Rate, Reading, UsageObservation};
use time::OffsetDateTime;

use super::{bill, derive_usage, UsageError};

/// Half-open capture-time window: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl DateRange {
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Who lives in a room when the view is built. `count` is `None` when the
/// tenant directory could not answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    pub count: Option<u32>,
    pub names: Vec<String>,
}

/// One row of the derived view: a stored reading with its usage and bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRow {
    pub reading: Reading,
    pub observation: UsageObservation,
    pub billed: BilledAmount,
    pub occupancy: Occupancy,
}

/// Derives usage over a partition's full history, then keeps the rows that
/// fall inside `range`.
///
/// Filtering after derivation lets the first row of a range keep its real
/// predecessor instead of becoming a fresh baseline.
pub fn build_partition_view(
    history: Vec<Reading>,
    rate: Rate,
    occupancy: &Occupancy,
    range: &DateRange,
) -> Result<Vec<DerivedRow>, UsageError> {
    let observations = derive_usage(&history)?;

    Ok(history
        .into_iter()
        .zip(observations)
        .filter(|(reading, _)| range.contains(reading.captured_at))
        .map(|(reading, observation)| {
            let billed = bill(&observation, rate, occupancy.count);
            DerivedRow {
                reading,
                observation,
                billed,
                occupancy: occupancy.clone(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::{MeterType, Money, ReadingValue};
    use time::{macros::datetime, Duration};

    fn history(values: &[&str]) -> Vec<Reading> {
        let t0 = datetime!(2024-01-05 09:00:00 UTC);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading {
                id: i as i64 + 1,
                room_identifier: "101".to_string(),
                meter_type: MeterType::Electric,
                reading_value: ReadingValue::parse(v).unwrap(),
                captured_at: t0 + Duration::days(31 * i as i64),
                evidence_reference: None,
                recorded_by: None,
            })
            .collect()
    }

    #[test]
    fn example_partition_bills_rise_and_fall() {
        let occupancy = Occupancy {
            count: Some(2),
            names: vec!["Somchai".to_string(), "Malee".to_string()],
        };
        let rows = build_partition_view(history(&["100", "135", "120"]), Rate::whole(7), &occupancy, &DateRange::default())
            .unwrap();

        let totals: Vec<Money> = rows.iter().map(|r| r.billed.total).collect();
        assert_eq!(totals, [Money::ZERO, Money::from_minor(24_500), Money::from_minor(-10_500)]);
        assert!(rows[2].observation.anomaly);
        assert_eq!(rows[1].billed.per_head, Money::from_minor(12_250));
        assert_eq!(rows[1].occupancy.names.len(), 2);
    }

    #[test]
    fn range_filter_keeps_the_true_predecessor() {
        let readings = history(&["100", "135", "120"]);
        let range = DateRange {
            from: Some(readings[1].captured_at),
            to: None,
        };

        let rows = build_partition_view(readings, Rate::whole(7), &Occupancy::default(), &range).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].observation.usage, 35);
        assert_eq!(
            rows[0].observation.previous_reading_value.as_ref().map(ReadingValue::as_str),
            Some("100")
        );
    }

    #[test]
    fn range_end_is_exclusive() {
        let readings = history(&["100", "135"]);
        let range = DateRange {
            from: None,
            to: Some(readings[1].captured_at),
        };

        let rows = build_partition_view(readings, Rate::whole(7), &Occupancy::default(), &range).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn tie_in_history_fails_even_outside_range() {
        let mut readings = history(&["100", "110", "120"]);
        readings[1].captured_at = readings[0].captured_at;
        let range = DateRange {
            from: Some(readings[2].captured_at),
            to: None,
        };

        let res = build_partition_view(readings, Rate::whole(7), &Occupancy::default(), &range);
        assert!(matches!(res, Err(UsageError::NonMonotonicPartition { .. })));
    }
}
