//! JSON API over the orchestrator, plus read-only access to evidence files.

pub mod error;
pub mod ingest;
pub mod readings;
pub mod tenants;

use std::{path::Path, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{evidence::PUBLIC_PREFIX, Orchestrator};

pub type SharedOrchestrator = Arc<Orchestrator>;

pub fn router(orchestrator: SharedOrchestrator, evidence_dir: &Path, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/ocr", post(ingest::recognize_photo))
        .route("/api/save", post(ingest::save_reading))
        .route("/api/readings", get(readings::list_readings))
        .route("/api/rates", get(readings::get_rates).put(readings::put_rates))
        .route("/api/tenants", get(tenants::list_tenants).post(tenants::add_tenant))
        .route("/api/tenants/:id", delete(tenants::remove_tenant))
        .nest_service(&format!("/{PUBLIC_PREFIX}"), ServeDir::new(evidence_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}
