use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{MeterType, NewReading, PartitionKey, Reading, ReadingValue};
use crate::StoreError;

/// Raw `readings` row as returned by PostgreSQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadingRow {
    pub id: i64,
    pub room_number: String,
    pub meter_type: String,
    pub reading_value: String,
    pub image_url: Option<String>,
    pub recorded_by: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = StoreError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        if row.room_number.trim().is_empty() {
            return Err(StoreError::MalformedRow(format!("reading {} has an empty room_number", row.id)));
        }
        let meter_type: MeterType = row
            .meter_type
            .parse()
            .map_err(|e| StoreError::MalformedRow(format!("reading {}: {e}", row.id)))?;
        let reading_value = ReadingValue::parse(&row.reading_value)
            .map_err(|e| StoreError::MalformedRow(format!("reading {}: {e}", row.id)))?;

        Ok(Reading {
            id: row.id,
            room_identifier: row.room_number,
            meter_type,
            reading_value,
            captured_at: row.created_at,
            evidence_reference: row.image_url,
            recorded_by: row.recorded_by,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PartitionRow {
    room_number: String,
    meter_type: String,
}

/// Append one reading.
///
/// Appends to the same partition are serialized with a transaction-scoped
/// advisory lock, and a reading whose `captured_at` collides with an existing
/// one in its partition is rejected with [`StoreError::DuplicateTimestamp`].
pub async fn insert_reading(pool: &PgPool, reading: &NewReading) -> Result<Reading, StoreError> {
    let duplicate = || StoreError::DuplicateTimestamp {
        room: reading.room_identifier.clone(),
        meter_type: reading.meter_type,
        captured_at: reading.captured_at,
    };

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(reading.partition().to_string())
        .execute(&mut *tx)
        .await?;

    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id
        FROM readings
        WHERE room_number = $1
          AND meter_type  = $2
          AND created_at  = $3
        "#,
    )
    .bind(&reading.room_identifier)
    .bind(reading.meter_type.as_str())
    .bind(reading.captured_at)
    .fetch_optional(&mut *tx)
    .await?;

    if existing.is_some() {
        return Err(duplicate());
    }

    let row = sqlx::query_as::<_, ReadingRow>(
        r#"
        INSERT INTO readings (reading_value, image_url, room_number, meter_type, recorded_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, room_number, meter_type, reading_value, image_url, recorded_by, created_at
        "#,
    )
    .bind(reading.reading_value.as_str())
    .bind(&reading.evidence_reference)
    .bind(&reading.room_identifier)
    .bind(reading.meter_type.as_str())
    .bind(&reading.recorded_by)
    .bind(reading.captured_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => duplicate(),
        _ => StoreError::from(e),
    })?;

    tx.commit().await?;

    Reading::try_from(row)
}

/// Full history of one partition, oldest first.
///
/// Rows sharing a timestamp are kept adjacent (ordered by id) so that callers
/// can detect the collision instead of seeing an arbitrary order.
pub async fn list_ordered(
    pool: &PgPool,
    room: &str,
    meter_type: MeterType,
) -> Result<Vec<Reading>, StoreError> {
    let rows = sqlx::query_as::<_, ReadingRow>(
        r#"
        SELECT
            id,
            room_number,
            meter_type,
            reading_value,
            image_url,
            recorded_by,
            created_at
        FROM readings
        WHERE room_number = $1
          AND meter_type  = $2
        ORDER BY created_at, id
        "#,
    )
    .bind(room)
    .bind(meter_type.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Reading::try_from).collect()
}

/// Partitions that hold at least one reading, optionally narrowed to a room
/// and/or meter type.
pub async fn list_partitions(
    pool: &PgPool,
    room: Option<&str>,
    meter_type: Option<MeterType>,
) -> Result<Vec<PartitionKey>, StoreError> {
    let rows = sqlx::query_as::<_, PartitionRow>(
        r#"
        SELECT DISTINCT room_number, meter_type
        FROM readings
        WHERE ($1::text IS NULL OR room_number = $1)
          AND ($2::text IS NULL OR meter_type  = $2)
        ORDER BY room_number, meter_type
        "#,
    )
    .bind(room)
    .bind(meter_type.map(MeterType::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let meter_type = row
                .meter_type
                .parse()
                .map_err(|e| StoreError::MalformedRow(format!("partition {}: {e}", row.room_number)))?;
            Ok(PartitionKey {
                room_identifier: row.room_number,
                meter_type,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(meter_type: &str, reading_value: &str) -> ReadingRow {
        ReadingRow {
            id: 7,
            room_number: "101".to_string(),
            meter_type: meter_type.to_string(),
            reading_value: reading_value.to_string(),
            image_url: Some("uploads/meter-abc.jpg".to_string()),
            recorded_by: Some("3".to_string()),
            created_at: datetime!(2024-05-01 08:00:00 UTC),
        }
    }

    #[test]
    fn well_formed_row_converts() {
        let reading = Reading::try_from(row("electric", "0135")).unwrap();
        assert_eq!(reading.meter_type, MeterType::Electric);
        assert_eq!(reading.reading_value.as_str(), "0135");
        assert_eq!(reading.evidence_reference.as_deref(), Some("uploads/meter-abc.jpg"));
    }

    #[test]
    fn malformed_rows_are_rejected_not_coerced() {
        assert!(matches!(
            Reading::try_from(row("gas", "0135")),
            Err(StoreError::MalformedRow(_))
        ));
        assert!(matches!(
            Reading::try_from(row("water", "12O")),
            Err(StoreError::MalformedRow(_))
        ));
        let mut blank_room = row("water", "1");
        blank_room.room_number = " ".to_string();
        assert!(matches!(Reading::try_from(blank_room), Err(StoreError::MalformedRow(_))));
    }
}
