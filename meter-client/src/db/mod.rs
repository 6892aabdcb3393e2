pub mod reading_queries;
pub mod tenant_queries;
