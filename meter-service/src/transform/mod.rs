use meter_client::domain::{MeterType, NewReading, ReadingValue};
use serde::{Deserialize, Deserializer};
use time::{macros::datetime, OffsetDateTime};

use crate::{
    pipeline::{Envelope, PipelineError, Transform},
    IngestError,
};

/// Longest room identifier accepted.
pub const MAX_ROOM_LEN: usize = 64;

/// A reading as confirmed (or typed) by a person, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfirmedReading {
    pub room_number: String,
    pub meter_type: String,
    #[serde(default)]
    pub reading: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
}

/// A backfilled reading: a confirmed value plus its original capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRecord {
    pub confirmed: ConfirmedReading,
    pub captured_at: OffsetDateTime,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Pure validation of a confirmed reading.
///
/// Rules:
/// - room identifier must be non-empty and at most [`MAX_ROOM_LEN`] characters.
/// - meter type must be `water` or `electric`.
/// - reading must be 1 to 18 ASCII digits; an empty value is refused rather
///   than defaulted.
/// - captured_at must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_reading(input: ConfirmedReading, captured_at: OffsetDateTime) -> Result<NewReading, IngestError> {
    let room = input.room_number.trim();
    if room.is_empty() {
        return Err(IngestError::InvalidReading("room_number must not be empty".to_string()));
    }
    if room.chars().count() > MAX_ROOM_LEN {
        return Err(IngestError::InvalidReading(format!(
            "room_number is longer than {MAX_ROOM_LEN} characters"
        )));
    }

    let meter_type: MeterType = input
        .meter_type
        .parse()
        .map_err(|e| IngestError::InvalidReading(format!("{e}")))?;

    let reading_value = ReadingValue::parse(&input.reading)
        .map_err(|e| IngestError::InvalidReading(format!("{e}")))?;

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);
    if captured_at < min_ts || captured_at > max_ts {
        return Err(IngestError::InvalidReading("timestamp out of allowed range".to_string()));
    }

    Ok(NewReading {
        room_identifier: room.to_string(),
        meter_type,
        reading_value,
        captured_at,
        evidence_reference: non_blank(input.image_path),
        recorded_by: non_blank(input.user_id),
    })
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<ReadingRecord, NewReading> for ReadingValidation {
    async fn apply(&self, input: Envelope<ReadingRecord>) -> Result<Envelope<NewReading>, PipelineError> {
        let Envelope {
            payload,
            received_at,
            position,
        } = input;

        match validate_reading(payload.confirmed, payload.captured_at) {
            Ok(reading) => Ok(Envelope {
                payload: reading,
                received_at,
                position,
            }),
            Err(e) => {
                metrics::counter!("validation_reading_rejected_total").increment(1);
                Err(PipelineError::Transform(format!("record {position}: {e}")))
            }
        }
    }
}
