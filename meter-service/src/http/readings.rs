use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use meter_client::domain::{MeterType, Money, Rate, ReadingValue};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::SharedOrchestrator;
use crate::{
    billing::{DateRange, DerivedRow, RateUpdate, Rates},
    ingest::ViewFilter,
    IngestError,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    pub room: Option<String>,
    pub meter_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ReadingsQuery {
    pub fn into_filter(self) -> Result<ViewFilter, IngestError> {
        let meter_type = non_blank(self.meter_type)
            .map(|m| m.parse::<MeterType>())
            .transpose()
            .map_err(|e| IngestError::InvalidRequest(e.to_string()))?;

        let range = DateRange {
            from: parse_bound("from", self.from)?,
            to: parse_bound("to", self.to)?,
        };
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(IngestError::InvalidRequest("'from' is after 'to'".to_string()));
            }
        }

        Ok(ViewFilter {
            room: non_blank(self.room),
            meter_type,
            range,
        })
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bound(name: &str, value: Option<String>) -> Result<Option<OffsetDateTime>, IngestError> {
    non_blank(value)
        .map(|v| {
            OffsetDateTime::parse(&v, &Rfc3339)
                .map_err(|e| IngestError::InvalidRequest(format!("'{name}' is not an RFC 3339 timestamp: {e}")))
        })
        .transpose()
}

/// One row of the derived view, flattened for presentation and export.
#[derive(Debug, Serialize)]
pub struct ReadingRow {
    pub id: i64,
    pub room_number: String,
    pub meter_type: MeterType,
    pub reading_value: ReadingValue,
    pub previous_reading: Option<ReadingValue>,
    pub usage: i64,
    pub anomaly: bool,
    pub image_url: Option<String>,
    pub recorded_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub rate: Rate,
    pub total: Money,
    pub tenant_count: Option<u32>,
    pub divisor: u32,
    pub per_head: Money,
    pub tenant_names: Vec<String>,
}

impl From<DerivedRow> for ReadingRow {
    fn from(row: DerivedRow) -> Self {
        let DerivedRow {
            reading,
            observation,
            billed,
            occupancy,
        } = row;

        Self {
            id: reading.id,
            room_number: reading.room_identifier,
            meter_type: reading.meter_type,
            reading_value: reading.reading_value,
            previous_reading: observation.previous_reading_value,
            usage: observation.usage,
            anomaly: observation.anomaly,
            image_url: reading.evidence_reference,
            recorded_by: reading.recorded_by,
            created_at: reading.captured_at,
            rate: billed.rate,
            total: billed.total,
            tenant_count: occupancy.count,
            divisor: billed.divisor,
            per_head: billed.per_head,
            tenant_names: occupancy.names,
        }
    }
}

pub async fn list_readings(
    State(orchestrator): State<SharedOrchestrator>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Vec<ReadingRow>>, IngestError> {
    let filter = query.into_filter()?;
    let rows = orchestrator.derived_view(&filter).await?;
    Ok(Json(rows.into_iter().map(ReadingRow::from).collect()))
}

pub async fn get_rates(State(orchestrator): State<SharedOrchestrator>) -> Json<Rates> {
    Json(orchestrator.rates().snapshot())
}

pub async fn put_rates(
    State(orchestrator): State<SharedOrchestrator>,
    payload: Result<Json<RateUpdate>, JsonRejection>,
) -> Result<Json<Rates>, IngestError> {
    let Json(update) = payload.map_err(|e| IngestError::InvalidRequest(e.body_text()))?;
    Ok(Json(orchestrator.rates().update(update)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn query_builds_filter() {
        let filter = ReadingsQuery {
            room: Some(" 101 ".to_string()),
            meter_type: Some("electric".to_string()),
            from: Some("2024-01-01T00:00:00Z".to_string()),
            to: Some(String::new()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.room.as_deref(), Some("101"));
        assert_eq!(filter.meter_type, Some(MeterType::Electric));
        assert_eq!(filter.range.from, Some(datetime!(2024-01-01 00:00:00 UTC)));
        assert_eq!(filter.range.to, None);
    }

    #[test]
    fn bad_filters_are_invalid_requests() {
        let bad_type = ReadingsQuery {
            meter_type: Some("gas".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_type.into_filter(), Err(IngestError::InvalidRequest(_))));

        let bad_date = ReadingsQuery {
            from: Some("last tuesday".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_date.into_filter(), Err(IngestError::InvalidRequest(_))));

        let inverted = ReadingsQuery {
            from: Some("2024-02-01T00:00:00Z".to_string()),
            to: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(matches!(inverted.into_filter(), Err(IngestError::InvalidRequest(_))));
    }
}
