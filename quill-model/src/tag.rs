use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A hashtag with its independently maintained usage statistics.
///
/// `usage_count` and `last_used_at` are owned by the upsert/decrement
/// statements in the tags repository; the generic update path skips them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tag {
    pub id: Uuid,
    pub row_version: i64,

    pub name: String,
    pub usage_count: i32,
    pub last_used_at: DateTime<Utc>,
}
