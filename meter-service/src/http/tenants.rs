use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use meter_client::domain::{NewTenant, Tenant};
use serde_json::{json, Value};

use super::SharedOrchestrator;
use crate::{transform::MAX_ROOM_LEN, IngestError};

pub async fn list_tenants(State(orchestrator): State<SharedOrchestrator>) -> Result<Json<Vec<Tenant>>, IngestError> {
    Ok(Json(orchestrator.tenants().list().await?))
}

pub async fn add_tenant(
    State(orchestrator): State<SharedOrchestrator>,
    payload: Result<Json<NewTenant>, JsonRejection>,
) -> Result<Json<Tenant>, IngestError> {
    let Json(tenant) = payload.map_err(|e| IngestError::InvalidRequest(e.body_text()))?;
    let tenant = validate_tenant(tenant)?;

    let stored = orchestrator.tenants().add(tenant).await?;
    tracing::info!(id = stored.id, room = %stored.room_identifier, "tenant added");
    Ok(Json(stored))
}

pub async fn remove_tenant(
    State(orchestrator): State<SharedOrchestrator>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, IngestError> {
    orchestrator.tenants().remove(id).await?;
    tracing::info!(id, "tenant removed");
    Ok(Json(json!({ "success": true })))
}

fn validate_tenant(tenant: NewTenant) -> Result<NewTenant, IngestError> {
    let name = tenant.name.trim().to_string();
    let room = tenant.room_identifier.trim().to_string();
    if name.is_empty() {
        return Err(IngestError::InvalidRequest("tenant name must not be empty".to_string()));
    }
    if room.is_empty() || room.chars().count() > MAX_ROOM_LEN {
        return Err(IngestError::InvalidRequest(format!(
            "room_number must be 1 to {MAX_ROOM_LEN} characters"
        )));
    }

    Ok(NewTenant {
        name,
        room_identifier: room,
        student_id: tenant
            .student_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_fields_are_trimmed_and_required() {
        let ok = validate_tenant(NewTenant {
            name: " Malee ".to_string(),
            room_identifier: "101 ".to_string(),
            student_id: Some("  ".to_string()),
        })
        .unwrap();
        assert_eq!(ok.name, "Malee");
        assert_eq!(ok.room_identifier, "101");
        assert_eq!(ok.student_id, None);

        let nameless = validate_tenant(NewTenant {
            name: " ".to_string(),
            room_identifier: "101".to_string(),
            student_id: None,
        });
        assert!(matches!(nameless, Err(IngestError::InvalidRequest(_))));
    }
}
