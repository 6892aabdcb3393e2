use time::OffsetDateTime;

use crate::domain::MeterType;

/// Failures reported by a reading or tenant store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("room {room} already has a {meter_type} reading captured at {captured_at}")]
    DuplicateTimestamp {
        room: String,
        meter_type: MeterType,
        captured_at: OffsetDateTime,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A row came back from the store that does not describe a valid record.
    #[error("malformed row from store: {0}")]
    MalformedRow(String),
    #[error("tenant {0} not found")]
    TenantNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}
