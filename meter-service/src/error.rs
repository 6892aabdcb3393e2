use meter_client::{domain::MeterType, StoreError};
use time::OffsetDateTime;

use crate::{billing::UsageError, ingest::Stage};

/// Every failure the ingestion engine reports to its callers.
///
/// Callers branch on the variant (or [`IngestError::kind`]) to decide between
/// a retake, manual entry, or aborting. A recognition that produced no digits
/// is not an error; see [`crate::ocr::Recognition::low_confidence`].
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    /// The photograph cannot be decoded; the user must retake it.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// The OCR engine could not be run at all. Deployment fault.
    #[error("OCR engine unavailable: {0}")]
    OcrEngineUnavailable(String),
    #[error("readings for room {room} ({meter_type}) are not strictly ordered at {at}")]
    NonMonotonicPartition {
        room: String,
        meter_type: MeterType,
        at: OffsetDateTime,
    },
    #[error("room {room} already has a {meter_type} reading captured at {captured_at}")]
    DuplicateTimestamp {
        room: String,
        meter_type: MeterType,
        captured_at: OffsetDateTime,
    },
    #[error("reading store unavailable: {0}")]
    StoreUnavailable(String),
    /// A confirmed reading that cannot be stored as given.
    #[error("invalid reading: {0}")]
    InvalidReading(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("ingestion cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: Stage, to: Stage },
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidImage(_) => "invalid_image",
            IngestError::OcrEngineUnavailable(_) => "ocr_engine_unavailable",
            IngestError::NonMonotonicPartition { .. } => "non_monotonic_partition",
            IngestError::DuplicateTimestamp { .. } => "duplicate_timestamp",
            IngestError::StoreUnavailable(_) => "store_unavailable",
            IngestError::InvalidReading(_) => "invalid_reading",
            IngestError::InvalidRequest(_) => "invalid_request",
            IngestError::NotFound(_) => "not_found",
            IngestError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// Whether the same call may succeed if the caller repeats it unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::DuplicateTimestamp { .. } | IngestError::StoreUnavailable(_)
        )
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateTimestamp {
                room,
                meter_type,
                captured_at,
            } => IngestError::DuplicateTimestamp {
                room,
                meter_type,
                captured_at,
            },
            StoreError::Unavailable(msg) => IngestError::StoreUnavailable(msg),
            StoreError::MalformedRow(msg) => IngestError::StoreUnavailable(format!("malformed row: {msg}")),
            StoreError::TenantNotFound(id) => IngestError::NotFound(format!("tenant {id}")),
        }
    }
}

impl From<UsageError> for IngestError {
    fn from(e: UsageError) -> Self {
        match e {
            UsageError::NonMonotonicPartition { room, meter_type, at } => {
                IngestError::NonMonotonicPartition { room, meter_type, at }
            }
            // A mixed slice means the store handed back rows from the wrong
            // partition.
            UsageError::MixedPartition { .. } => IngestError::StoreUnavailable(e.to_string()),
        }
    }
}
