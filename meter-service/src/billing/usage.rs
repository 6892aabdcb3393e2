use meter_client::domain::{MeterType, Reading, UsageObservation};
use time::OffsetDateTime;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("readings for room {room} ({meter_type}) are not strictly ordered at {at}")]
    NonMonotonicPartition {
        room: String,
        meter_type: MeterType,
        at: OffsetDateTime,
    },
    #[error("reading {id} belongs to room {room} ({meter_type}), not the partition being derived")]
    MixedPartition {
        id: i64,
        room: String,
        meter_type: MeterType,
    },
}

/// Derives one observation per reading, in a single pass.
///
/// `history` must be one partition in ascending `captured_at` order. The first
/// reading is the baseline (usage 0, no predecessor). Each later reading's
/// usage is its value minus its predecessor's, kept signed: a negative delta
/// is flagged as an anomaly and never clamped. A repeated or decreasing
/// timestamp fails the whole derivation.
pub fn derive_usage(history: &[Reading]) -> Result<Vec<UsageObservation>, UsageError> {
    let Some(first) = history.first() else {
        return Ok(Vec::new());
    };
    let partition = first.partition();

    let mut observations = Vec::with_capacity(history.len());
    let mut previous: Option<&Reading> = None;

    for reading in history {
        if !reading.in_partition(&partition) {
            return Err(UsageError::MixedPartition {
                id: reading.id,
                room: reading.room_identifier.clone(),
                meter_type: reading.meter_type,
            });
        }

        let observation = match previous {
            None => UsageObservation {
                reading_id: reading.id,
                captured_at: reading.captured_at,
                reading_value: reading.reading_value.clone(),
                previous_reading_value: None,
                usage: 0,
                anomaly: false,
            },
            Some(prev) => {
                if reading.captured_at <= prev.captured_at {
                    return Err(UsageError::NonMonotonicPartition {
                        room: partition.room_identifier,
                        meter_type: partition.meter_type,
                        at: reading.captured_at,
                    });
                }
                let usage = reading.reading_value.value() - prev.reading_value.value();
                UsageObservation {
                    reading_id: reading.id,
                    captured_at: reading.captured_at,
                    reading_value: reading.reading_value.clone(),
                    previous_reading_value: Some(prev.reading_value.clone()),
                    usage,
                    anomaly: usage < 0,
                }
            }
        };

        observations.push(observation);
        previous = Some(reading);
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::ReadingValue;
    use time::{macros::datetime, Duration};

    fn reading(id: i64, room: &str, meter_type: MeterType, value: &str, at: OffsetDateTime) -> Reading {
        Reading {
            id,
            room_identifier: room.to_string(),
            meter_type,
            reading_value: ReadingValue::parse(value).unwrap(),
            captured_at: at,
            evidence_reference: None,
            recorded_by: None,
        }
    }

    fn series(values: &[&str]) -> Vec<Reading> {
        let t0 = datetime!(2024-01-01 09:00:00 UTC);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| reading(i as i64 + 1, "101", MeterType::Electric, v, t0 + Duration::days(30 * i as i64)))
            .collect()
    }

    #[test]
    fn empty_history_derives_nothing() {
        assert_eq!(derive_usage(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn first_reading_is_a_zero_usage_baseline() {
        let obs = derive_usage(&series(&["0500"])).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].usage, 0);
        assert_eq!(obs[0].previous_reading_value, None);
        assert!(!obs[0].anomaly);
    }

    #[test]
    fn rise_then_fall_flags_the_fall() {
        let obs = derive_usage(&series(&["100", "135", "120"])).unwrap();

        let usages: Vec<i64> = obs.iter().map(|o| o.usage).collect();
        assert_eq!(usages, [0, 35, -15]);
        let anomalies: Vec<bool> = obs.iter().map(|o| o.anomaly).collect();
        assert_eq!(anomalies, [false, false, true]);
        assert_eq!(obs[1].previous_reading_value.as_ref().map(ReadingValue::as_str), Some("100"));
        assert_eq!(obs[2].previous_reading_value.as_ref().map(ReadingValue::as_str), Some("135"));
    }

    #[test]
    fn adjacent_deltas_are_exact() {
        let history = series(&["0007", "0010", "0010", "0002", "1000"]);
        let obs = derive_usage(&history).unwrap();

        for pair in history.windows(2).zip(obs.iter().skip(1)) {
            let ([prev, cur], o) = pair else { unreachable!() };
            assert_eq!(o.usage, cur.reading_value.value() - prev.reading_value.value());
        }
    }

    #[test]
    fn shared_timestamp_fails_without_output() {
        let mut history = series(&["100", "110", "120"]);
        history[2].captured_at = history[1].captured_at;

        let err = derive_usage(&history).unwrap_err();
        assert!(matches!(err, UsageError::NonMonotonicPartition { ref room, .. } if room == "101"));
    }

    #[test]
    fn descending_timestamps_fail() {
        let mut history = series(&["100", "110"]);
        history.swap(0, 1);
        assert!(matches!(
            derive_usage(&history),
            Err(UsageError::NonMonotonicPartition { .. })
        ));
    }

    #[test]
    fn mixed_partitions_are_rejected() {
        let mut history = series(&["100", "110"]);
        history[1].meter_type = MeterType::Water;
        assert!(matches!(derive_usage(&history), Err(UsageError::MixedPartition { id: 2, .. })));
    }
}
