use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, State},
    Json,
};
use meter_client::domain::Reading;
use serde::Serialize;

use super::SharedOrchestrator;
use crate::{transform::ConfirmedReading, IngestError};

/// Form field carrying the photograph.
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub success: bool,
    /// Sanitized digits; empty when nothing usable was recognized.
    pub reading: String,
    pub raw_text: String,
    pub low_confidence: bool,
    pub image_path: String,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub reading: Reading,
}

pub async fn recognize_photo(
    State(orchestrator): State<SharedOrchestrator>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, IngestError> {
    let mut payload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::InvalidImage(format!("malformed upload: {e}")))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| IngestError::InvalidImage(format!("cannot read upload: {e}")))?;
            payload = Some(bytes.to_vec());
            break;
        }
    }

    let payload = payload.ok_or_else(|| IngestError::InvalidImage(format!("no '{IMAGE_FIELD}' field in upload")))?;
    let outcome = orchestrator.recognize(payload).await?;

    Ok(Json(RecognizeResponse {
        success: true,
        reading: outcome.recognition.digits,
        raw_text: outcome.recognition.raw_text,
        low_confidence: outcome.low_confidence,
        image_path: outcome.evidence_reference,
    }))
}

pub async fn save_reading(
    State(orchestrator): State<SharedOrchestrator>,
    payload: Result<Json<ConfirmedReading>, JsonRejection>,
) -> Result<Json<SaveResponse>, IngestError> {
    let Json(confirmed) = payload.map_err(|e| IngestError::InvalidReading(e.body_text()))?;
    let reading = orchestrator.confirm(confirmed).await?;
    Ok(Json(SaveResponse { success: true, reading }))
}
