//! Collaborator seams: the reading store and the tenant directory.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Context;
use meter_client::{
    domain::{MeterType, NewReading, NewTenant, PartitionKey, Reading, Tenant},
    StoreError,
};
use sqlx::postgres::PgPoolOptions;

use crate::config::{StoreConfig, StoreKind};

pub use memory::{MemoryReadingStore, MemoryTenantDirectory};
pub use postgres::{PgReadingStore, PgTenantDirectory};

/// Append-only reading storage.
///
/// Implementations serialize appends within a partition and reject a reading
/// whose `captured_at` is already taken in that partition.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError>;

    /// One partition's readings, oldest first.
    async fn list_ordered(&self, room: &str, meter_type: MeterType) -> Result<Vec<Reading>, StoreError>;

    async fn partitions(
        &self,
        room: Option<&str>,
        meter_type: Option<MeterType>,
    ) -> Result<Vec<PartitionKey>, StoreError>;
}

#[async_trait::async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn occupancy_count(&self, room: &str) -> Result<u32, StoreError>;

    async fn tenant_names(&self, room: &str) -> Result<Vec<String>, StoreError>;

    async fn list(&self) -> Result<Vec<Tenant>, StoreError>;

    async fn add(&self, tenant: NewTenant) -> Result<Tenant, StoreError>;

    async fn remove(&self, id: i64) -> Result<(), StoreError>;
}

/// Builds the configured store pair.
pub async fn from_config(cfg: &StoreConfig) -> anyhow::Result<(Arc<dyn ReadingStore>, Arc<dyn TenantDirectory>)> {
    match cfg.kind {
        StoreKind::Postgres => {
            let uri = cfg.uri.as_deref().context("store.uri is required for the postgres store")?;
            let pool = PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .connect(uri)
                .await
                .context("connecting to postgres")?;
            Ok((
                Arc::new(PgReadingStore::new(pool.clone())),
                Arc::new(PgTenantDirectory::new(pool)),
            ))
        }
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; readings are lost on restart");
            Ok((
                Arc::new(MemoryReadingStore::default()),
                Arc::new(MemoryTenantDirectory::default()),
            ))
        }
    }
}
