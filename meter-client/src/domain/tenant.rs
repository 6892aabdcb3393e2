use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "room_number")]
    #[serde(rename = "room_number")]
    pub room_identifier: String,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTenant {
    pub name: String,
    #[serde(rename = "room_number")]
    pub room_identifier: String,
    #[serde(default)]
    pub student_id: Option<String>,
}
