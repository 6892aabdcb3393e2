use meter_client::{
    db::{reading_queries, tenant_queries},
    domain::{MeterType, NewReading, NewTenant, PartitionKey, Reading, Tenant},
    StoreError,
};
use sqlx::PgPool;

use super::{ReadingStore, TenantDirectory};

pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError> {
        reading_queries::insert_reading(&self.pool, &reading).await
    }

    async fn list_ordered(&self, room: &str, meter_type: MeterType) -> Result<Vec<Reading>, StoreError> {
        reading_queries::list_ordered(&self.pool, room, meter_type).await
    }

    async fn partitions(
        &self,
        room: Option<&str>,
        meter_type: Option<MeterType>,
    ) -> Result<Vec<PartitionKey>, StoreError> {
        reading_queries::list_partitions(&self.pool, room, meter_type).await
    }
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn occupancy_count(&self, room: &str) -> Result<u32, StoreError> {
        tenant_queries::occupancy_count(&self.pool, room).await
    }

    async fn tenant_names(&self, room: &str) -> Result<Vec<String>, StoreError> {
        tenant_queries::tenant_names(&self.pool, room).await
    }

    async fn list(&self) -> Result<Vec<Tenant>, StoreError> {
        tenant_queries::list_tenants(&self.pool).await
    }

    async fn add(&self, tenant: NewTenant) -> Result<Tenant, StoreError> {
        tenant_queries::insert_tenant(&self.pool, &tenant).await
    }

    async fn remove(&self, id: i64) -> Result<(), StoreError> {
        tenant_queries::delete_tenant(&self.pool, id).await
    }
}
