use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Audit stamps for entities that opt into the auditable capability.
///
/// The whole struct is flattened into the owning row; every field is
/// nullable because rows created by anonymous actors carry no `*_by` value
/// and rows never updated carry no `updated_*` value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Audit {
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Uuid>,
}
