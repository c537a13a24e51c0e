use uuid::Uuid;

/// Input for creating a post.
///
/// `media` holds object-store keys as returned by the staging upload; keys
/// under the temporary prefix are moved to permanent storage during the
/// write, keys already permanent pass through unchanged.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreatePostInput {
    pub content: Option<String>,
    pub reply_for_id: Option<Uuid>,
    pub repost_id: Option<Uuid>,
    pub media: Vec<String>,
}

/// Input for updating a post's content and media set. The desired media
/// keys are compared against the stored children by key; order in the
/// vector is the desired sort order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdatePostInput {
    pub id: Uuid,
    pub content: Option<String>,
    pub media: Vec<String>,
}
