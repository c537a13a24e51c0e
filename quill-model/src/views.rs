use uuid::Uuid;

/// Flat row produced by the read-model join: one row per (post, media)
/// combination, author columns repeated on each. Media and author columns
/// are nullable because both joins are LEFT.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostReadRow {
    pub id: Uuid,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub reply_for_id: Option<Uuid>,
    pub repost_id: Option<Uuid>,
    pub depth: i32,
    pub likes_count: i32,
    pub views_count: i32,
    pub replies_count: i32,
    pub reposts_count: i32,

    pub media_id: Option<Uuid>,
    pub media_key: Option<String>,
    pub media_order: Option<i32>,

    pub creator_id: Option<Uuid>,
    pub creator_username: Option<String>,
    pub creator_first_name: Option<String>,
    pub creator_last_name: Option<String>,
    pub creator_profile_image_key: Option<String>,
}

/// Post author as exposed on the read side.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostAuthor {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

/// A media attachment resolved to a fetchable URL.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaItem {
    pub key: String,
    pub url: String,
}

/// Fully materialized view of one post, re-queried after every write so
/// store-computed values (counters, audit stamps) are always current.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostDetails {
    pub id: Uuid,
    pub author: Option<PostAuthor>,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub depth: i32,
    pub likes_count: i32,
    pub views_count: i32,
    pub replies_count: i32,
    pub reposts_count: i32,
    pub media: Vec<MediaItem>,
    /// Embedded original when this post is a repost; one level deep.
    pub repost: Option<Box<PostDetails>>,
}
