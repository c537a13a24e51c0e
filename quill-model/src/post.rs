use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::Audit;

/// A post row. Root posts, replies and reposts share this shape; replies
/// reference their parent through `reply_for_id`, reposts through
/// `repost_id`.
///
/// The four `*_count` columns are owned by dedicated increment/decrement
/// statements and are never written by the generic update path.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Post {
    pub id: Uuid,
    pub row_version: i64,

    pub content: Option<String>,
    pub tags: Vec<String>,

    pub reply_for_id: Option<Uuid>,
    pub repost_id: Option<Uuid>,

    pub depth: i32,
    pub likes_count: i32,
    pub views_count: i32,
    pub replies_count: i32,
    pub reposts_count: i32,

    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

/// Ordered media attachment owned by a post. `key` is the object-store key
/// and the stable identity used when diffing desired against current media.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostMedia {
    pub id: Uuid,
    pub row_version: i64,

    pub post_id: Uuid,
    pub key: String,
    pub sort_order: i32,

    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

/// One user's like on one post.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostLike {
    pub id: Uuid,
    pub row_version: i64,

    pub post_id: Uuid,
    pub user_id: Uuid,
    pub liked_at: DateTime<Utc>,
}

/// View tracking row, one per (post, user) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostView {
    pub id: Uuid,
    pub row_version: i64,

    pub post_id: Uuid,
    pub user_id: Uuid,
    pub first_viewed_at: DateTime<Utc>,
    pub last_viewed_at: DateTime<Utc>,
}
