use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::IngestError;

pub fn status_for(err: &IngestError) -> StatusCode {
    match err {
        IngestError::InvalidImage(_) | IngestError::InvalidReading(_) | IngestError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        IngestError::NotFound(_) => StatusCode::NOT_FOUND,
        IngestError::DuplicateTimestamp { .. } => StatusCode::CONFLICT,
        IngestError::OcrEngineUnavailable(_) | IngestError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        IngestError::NonMonotonicPartition { .. } | IngestError::InvalidTransition { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = json!({
            "success": false,
            "kind": self.kind(),
            "retryable": self.is_retryable(),
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::MeterType;
    use time::macros::datetime;

    #[test]
    fn caller_faults_and_host_faults_map_apart() {
        assert_eq!(status_for(&IngestError::InvalidImage("empty".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&IngestError::OcrEngineUnavailable("missing eng.traineddata".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&IngestError::DuplicateTimestamp {
                room: "101".into(),
                meter_type: MeterType::Water,
                captured_at: datetime!(2024-01-01 00:00:00 UTC),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&IngestError::NotFound("tenant 9".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_response_carries_kind() {
        let res = IngestError::InvalidReading("room_number must not be empty".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
