use sqlx::PgPool;

use crate::domain::{NewTenant, Tenant};
use crate::StoreError;

pub async fn list_tenants(pool: &PgPool) -> Result<Vec<Tenant>, StoreError> {
    let rows = sqlx::query_as::<_, Tenant>(
        r#"
        SELECT id, name, room_number, student_id
        FROM tenants
        ORDER BY room_number, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_tenant(pool: &PgPool, tenant: &NewTenant) -> Result<Tenant, StoreError> {
    let row = sqlx::query_as::<_, Tenant>(
        r#"
        INSERT INTO tenants (name, room_number, student_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, room_number, student_id
        "#,
    )
    .bind(&tenant.name)
    .bind(&tenant.room_identifier)
    .bind(&tenant.student_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn delete_tenant(pool: &PgPool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::TenantNotFound(id));
    }
    Ok(())
}

/// Number of tenants currently bound to a room.
pub async fn occupancy_count(pool: &PgPool, room: &str) -> Result<u32, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE room_number = $1")
        .bind(room)
        .fetch_one(pool)
        .await?;

    u32::try_from(count).map_err(|_| StoreError::MalformedRow(format!("occupancy count {count} for room {room}")))
}

pub async fn tenant_names(pool: &PgPool, room: &str) -> Result<Vec<String>, StoreError> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM tenants WHERE room_number = $1 ORDER BY id")
        .bind(room)
        .fetch_all(pool)
        .await?;

    Ok(names)
}
