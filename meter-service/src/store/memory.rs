use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use meter_client::{
    domain::{MeterType, NewReading, NewTenant, PartitionKey, Reading, Tenant},
    StoreError,
};

use super::{ReadingStore, TenantDirectory};

#[derive(Default)]
struct ReadingState {
    next_id: i64,
    partitions: BTreeMap<PartitionKey, Vec<Reading>>,
}

/// Reading store kept in process memory. Every partition stays sorted by
/// `captured_at`; a single lock serializes all appends.
#[derive(Default)]
pub struct MemoryReadingStore {
    state: Mutex<ReadingState>,
}

impl MemoryReadingStore {
    fn lock(&self) -> MutexGuard<'_, ReadingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;

        let partition = state.partitions.entry(reading.partition()).or_default();
        let at = partition.partition_point(|r| r.captured_at < reading.captured_at);
        if partition.get(at).is_some_and(|r| r.captured_at == reading.captured_at) {
            return Err(StoreError::DuplicateTimestamp {
                room: reading.room_identifier,
                meter_type: reading.meter_type,
                captured_at: reading.captured_at,
            });
        }

        let stored = reading.into_reading(id);
        partition.insert(at, stored.clone());
        Ok(stored)
    }

    async fn list_ordered(&self, room: &str, meter_type: MeterType) -> Result<Vec<Reading>, StoreError> {
        let key = PartitionKey {
            room_identifier: room.to_string(),
            meter_type,
        };
        Ok(self.lock().partitions.get(&key).cloned().unwrap_or_default())
    }

    async fn partitions(
        &self,
        room: Option<&str>,
        meter_type: Option<MeterType>,
    ) -> Result<Vec<PartitionKey>, StoreError> {
        Ok(self
            .lock()
            .partitions
            .iter()
            .filter(|(key, readings)| {
                !readings.is_empty()
                    && room.map_or(true, |r| key.room_identifier == r)
                    && meter_type.map_or(true, |m| key.meter_type == m)
            })
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[derive(Default)]
struct TenantState {
    next_id: i64,
    tenants: Vec<Tenant>,
}

#[derive(Default)]
pub struct MemoryTenantDirectory {
    state: Mutex<TenantState>,
}

impl MemoryTenantDirectory {
    fn lock(&self) -> MutexGuard<'_, TenantState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn occupancy_count(&self, room: &str) -> Result<u32, StoreError> {
        let count = self
            .lock()
            .tenants
            .iter()
            .filter(|t| t.room_identifier == room)
            .count();
        u32::try_from(count).map_err(|_| StoreError::MalformedRow(format!("occupancy count {count} for room {room}")))
    }

    async fn tenant_names(&self, room: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .tenants
            .iter()
            .filter(|t| t.room_identifier == room)
            .map(|t| t.name.clone())
            .collect())
    }

    async fn list(&self) -> Result<Vec<Tenant>, StoreError> {
        let mut tenants = self.lock().tenants.clone();
        tenants.sort_by(|a, b| a.room_identifier.cmp(&b.room_identifier).then(a.id.cmp(&b.id)));
        Ok(tenants)
    }

    async fn add(&self, tenant: NewTenant) -> Result<Tenant, StoreError> {
        let mut state = self.lock();
        state.next_id += 1;
        let stored = Tenant {
            id: state.next_id,
            name: tenant.name,
            room_identifier: tenant.room_identifier,
            student_id: tenant.student_id,
        };
        state.tenants.push(stored.clone());
        Ok(stored)
    }

    async fn remove(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let before = state.tenants.len();
        state.tenants.retain(|t| t.id != id);
        if state.tenants.len() == before {
            return Err(StoreError::TenantNotFound(id));
        }
        Ok(())
    }
}
