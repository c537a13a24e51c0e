//! Post write orchestration: create/update/delete of the post aggregate
//! plus the high-frequency like/view operations.
//!
//! Each public operation owns exactly one [`UnitOfWork`]. Blob moves happen
//! before the transactional phase because the object store cannot join the
//! database transaction; when the transaction fails afterwards, the
//! orchestrator rolls back and then awaits best-effort deletion of every
//! blob it moved during the same call. An orphaned blob after a crash in
//! that window is an accepted, recoverable leak swept out of band.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use quill_model::formatting;
use quill_model::{
    CreatePostInput, MediaItem, PageRequest, Paginated, Post, PostAuthor, PostDetails, PostLike,
    PostMedia, PostReadRow, PostView, UpdatePostInput,
};
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::repositories::{
    PostCounter, PostLikesRepository, PostMediaRepository, PostViewsRepository, PostsRepository,
    TagsRepository,
};
use crate::database::uow::UnitOfWork;
use crate::error::{QuillError, Result};
use crate::services::diff::{MediaChanges, TagChanges, diff_media, diff_tags};
use crate::storage::ObjectStore;

const MEDIA_FOLDER: &str = "posts/media";
const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);

fn hashtag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag pattern"))
}

/// Extracts the canonical tag set from post content: `#word` matches,
/// lowercased, de-duplicated preserving first occurrence. Extraction is
/// idempotent; identical content always yields an identical set.
pub fn extract_tags(content: Option<&str>) -> Vec<String> {
    let Some(content) = content else {
        return Vec::new();
    };

    let mut tags = Vec::new();
    for capture in hashtag_pattern().captures_iter(content) {
        let tag = formatting::tag(&capture[1]);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// One upload after the persist step. `moved` is set when this call moved
/// the blob out of staging, which makes it a compensation target.
#[derive(Debug, Clone)]
struct PersistedUpload {
    key: String,
    moved: bool,
}

/// Moves every staged upload to permanent storage, concurrently. When any
/// move fails the blobs already moved by this batch are compensated before
/// the first error propagates.
async fn persist_uploads(
    store: &dyn ObjectStore,
    keys: &[String],
    folder: &str,
) -> Result<Vec<PersistedUpload>> {
    let results = join_all(keys.iter().map(|key| store.persist(key, folder, false))).await;

    let mut uploads = Vec::with_capacity(keys.len());
    let mut first_error = None;
    for (key, result) in keys.iter().zip(results) {
        match result {
            Ok(new_key) => uploads.push(PersistedUpload {
                moved: new_key != *key,
                key: new_key,
            }),
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    if let Some(error) = first_error {
        compensate_uploads(store, &uploads).await;
        return Err(error);
    }
    Ok(uploads)
}

/// Best-effort deletion of blobs moved by this call. Failures are logged
/// and swallowed: relational state is already consistent and an orphaned
/// blob is recoverable, while the original failure must not be masked.
async fn compensate_uploads(store: &dyn ObjectStore, uploads: &[PersistedUpload]) {
    for upload in uploads.iter().filter(|u| u.moved) {
        if let Err(error) = store.delete(&upload.key).await {
            warn!(key = %upload.key, %error, "failed to delete orphaned blob after rollback");
        }
    }
}

/// Orchestrates all post aggregate writes.
pub struct PostsService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    posts: PostsRepository,
    tags: TagsRepository,
    media: PostMediaRepository,
    likes: PostLikesRepository,
    views: PostViewsRepository,
    presign_ttl: Duration,
}

impl fmt::Debug for PostsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostsService")
            .field("presign_ttl", &self.presign_ttl)
            .finish_non_exhaustive()
    }
}

impl PostsService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            pool,
            store,
            posts: PostsRepository::new(actor.clone()),
            tags: TagsRepository::new(),
            media: PostMediaRepository::new(actor.clone()),
            likes: PostLikesRepository::new(actor.clone()),
            views: PostViewsRepository::new(actor),
            presign_ttl: DEFAULT_PRESIGN_TTL,
        }
    }

    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Creates a post aggregate: the row, its media children, tag usage and
    /// the counters of any referenced post, all visible atomically.
    pub async fn create(&self, input: CreatePostInput) -> Result<PostDetails> {
        if input.reply_for_id.is_some() && input.repost_id.is_some() {
            return Err(QuillError::Validation(
                "a post cannot be both a reply and a repost".into(),
            ));
        }

        let mut uow = UnitOfWork::new(self.pool.clone());

        // Resolve references before any mutation.
        let replied = match input.reply_for_id {
            Some(id) => Some(self.require_post(&mut uow, id).await?),
            None => None,
        };
        if let Some(id) = input.repost_id {
            self.require_post(&mut uow, id).await?;
        }

        let uploads = persist_uploads(self.store.as_ref(), &input.media, MEDIA_FOLDER).await?;

        let content = formatting::optional_text(input.content.as_deref());
        let tags = extract_tags(content.as_deref());

        let mut post = Post {
            id: Uuid::now_v7(),
            content,
            tags: tags.clone(),
            reply_for_id: input.reply_for_id,
            repost_id: input.repost_id,
            // depth derives from the parent exactly once, at creation
            depth: replied.as_ref().map(|p| p.depth + 1).unwrap_or(0),
            ..Post::default()
        };

        let mut media: Vec<PostMedia> = uploads
            .iter()
            .enumerate()
            .map(|(idx, upload)| PostMedia {
                post_id: post.id,
                key: upload.key.clone(),
                sort_order: idx as i32,
                ..PostMedia::default()
            })
            .collect();

        if let Err(error) = self.create_in_tx(&mut uow, &mut post, &tags, &mut media).await {
            self.abandon(&mut uow).await;
            compensate_uploads(self.store.as_ref(), &uploads).await;
            return Err(error);
        }

        info!(post_id = %post.id, tags = tags.len(), media = media.len(), "created post");
        self.details_by_id(&mut uow, post.id).await
    }

    async fn create_in_tx(
        &self,
        uow: &mut UnitOfWork,
        post: &mut Post,
        tags: &[String],
        media: &mut [PostMedia],
    ) -> Result<()> {
        uow.begin().await?;
        self.posts.add(uow, post).await?;
        self.tags.upsert_usage(uow, tags).await?;
        self.media.add_many(uow, media).await?;
        if let Some(parent_id) = post.reply_for_id {
            self.posts.increment(uow, parent_id, PostCounter::Replies).await?;
        }
        if let Some(reposted_id) = post.repost_id {
            self.posts.increment(uow, reposted_id, PostCounter::Reposts).await?;
        }
        uow.commit().await
    }

    /// Updates content and media of an existing post, reconciling children
    /// and tag usage against the stored state.
    pub async fn update(&self, input: UpdatePostInput) -> Result<PostDetails> {
        let mut uow = UnitOfWork::new(self.pool.clone());

        let mut post = self.require_post(&mut uow, input.id).await?;
        let current_media = self.media.list_by_post(&mut uow, post.id).await?;

        let uploads = persist_uploads(self.store.as_ref(), &input.media, MEDIA_FOLDER).await?;
        let desired_keys: Vec<String> = uploads.iter().map(|u| u.key.clone()).collect();

        let content = formatting::optional_text(input.content.as_deref());
        let tags = extract_tags(content.as_deref());
        let tag_changes = diff_tags(&post.tags, &tags);
        let media_changes = diff_media(&current_media, &desired_keys, post.id);

        post.content = content;
        post.tags = tags;

        if let Err(error) = self
            .update_in_tx(&mut uow, &mut post, &tag_changes, media_changes)
            .await
        {
            self.abandon(&mut uow).await;
            // surviving children keep their blobs; only this call's moves
            // are compensated
            compensate_uploads(self.store.as_ref(), &uploads).await;
            return Err(error);
        }

        info!(post_id = %post.id, "updated post");
        self.details_by_id(&mut uow, post.id).await
    }

    async fn update_in_tx(
        &self,
        uow: &mut UnitOfWork,
        post: &mut Post,
        tag_changes: &TagChanges,
        media_changes: MediaChanges,
    ) -> Result<()> {
        let MediaChanges {
            mut to_add,
            to_reposition,
            to_remove,
        } = media_changes;

        uow.begin().await?;
        self.posts.update(uow, post).await?;
        self.tags.upsert_usage(uow, &tag_changes.added).await?;
        self.tags.decrement_usage(uow, &tag_changes.removed).await?;
        self.media.add_many(uow, &mut to_add).await?;
        for mut moved in to_reposition {
            self.media.update(uow, &mut moved).await?;
        }
        self.media.delete_many(uow, &to_remove).await?;
        uow.commit().await
    }

    /// Deletes a post, returning counters and tag usage it contributed.
    /// Media rows cascade with the post row; blob cleanup is the out-of-band
    /// sweep's job, so no compensation is involved here.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        let post = self.require_post(&mut uow, id).await?;

        if let Err(error) = self.delete_in_tx(&mut uow, &post).await {
            self.abandon(&mut uow).await;
            return Err(error);
        }

        info!(post_id = %id, "deleted post");
        Ok(())
    }

    async fn delete_in_tx(&self, uow: &mut UnitOfWork, post: &Post) -> Result<()> {
        uow.begin().await?;
        if let Some(parent_id) = post.reply_for_id {
            self.posts.decrement(uow, parent_id, PostCounter::Replies).await?;
        }
        if let Some(reposted_id) = post.repost_id {
            self.posts.decrement(uow, reposted_id, PostCounter::Reposts).await?;
        }
        self.tags.decrement_usage(uow, &post.tags).await?;
        self.posts.delete(uow, post.id).await?;
        uow.commit().await
    }

    /// Records a like; repeated likes by the same user are a no-op.
    pub async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        self.require_post(&mut uow, post_id).await?;

        if self.likes.find(&mut uow, post_id, user_id).await?.is_some() {
            return Ok(());
        }

        let mut like = PostLike {
            id: Uuid::nil(),
            row_version: 0,
            post_id,
            user_id,
            liked_at: Utc::now(),
        };

        let result: Result<()> = async {
            uow.begin().await?;
            self.likes.add(&mut uow, &mut like).await?;
            self.posts
                .increment(&mut uow, post_id, PostCounter::Likes)
                .await?;
            uow.commit().await
        }
        .await;

        if let Err(error) = result {
            self.abandon(&mut uow).await;
            return Err(error);
        }
        Ok(())
    }

    /// Removes a like; absent likes are a no-op.
    pub async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        self.require_post(&mut uow, post_id).await?;

        let Some(like) = self.likes.find(&mut uow, post_id, user_id).await? else {
            return Ok(());
        };

        let result: Result<()> = async {
            uow.begin().await?;
            self.likes.delete(&mut uow, like.id).await?;
            self.posts
                .decrement(&mut uow, post_id, PostCounter::Likes)
                .await?;
            uow.commit().await
        }
        .await;

        if let Err(error) = result {
            self.abandon(&mut uow).await;
            return Err(error);
        }
        Ok(())
    }

    /// Counts the first view per (post, user) pair; later views only
    /// advance `last_viewed_at`.
    pub async fn record_view(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        self.require_post(&mut uow, post_id).await?;

        match self.views.find(&mut uow, post_id, user_id).await? {
            None => {
                let now = Utc::now();
                let mut view = PostView {
                    id: Uuid::nil(),
                    row_version: 0,
                    post_id,
                    user_id,
                    first_viewed_at: now,
                    last_viewed_at: now,
                };

                let result: Result<()> = async {
                    uow.begin().await?;
                    self.views.add(&mut uow, &mut view).await?;
                    self.posts
                        .increment(&mut uow, post_id, PostCounter::Views)
                        .await?;
                    uow.commit().await
                }
                .await;

                if let Err(error) = result {
                    self.abandon(&mut uow).await;
                    return Err(error);
                }
                Ok(())
            }
            Some(mut view) => {
                view.last_viewed_at = Utc::now();
                self.views.update(&mut uow, &mut view).await
            }
        }
    }

    /// Fully joined view of one post.
    pub async fn get(&self, id: Uuid) -> Result<PostDetails> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        self.details_by_id(&mut uow, id).await
    }

    /// A creator's root posts, newest first.
    pub async fn get_user_posts(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<PostDetails>> {
        self.page_by_creator(user_id, page, false).await
    }

    /// A creator's replies and reposts, newest first.
    pub async fn get_user_replies(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<PostDetails>> {
        self.page_by_creator(user_id, page, true).await
    }

    /// Direct replies to one post, newest first.
    pub async fn get_post_replies(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<PostDetails>> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        let replies = self.posts.replies_of(&mut uow, post_id, page).await?;
        let total = self.posts.replies_of_count(&mut uow, post_id).await?;
        let ids: Vec<Uuid> = replies.iter().map(|p| p.id).collect();
        let items = self.details_by_ids(&mut uow, &ids).await?;
        Ok(Paginated { items, total })
    }

    async fn page_by_creator(
        &self,
        user_id: Uuid,
        page: PageRequest,
        replies_or_reposts: bool,
    ) -> Result<Paginated<PostDetails>> {
        let mut uow = UnitOfWork::new(self.pool.clone());
        let posts = self
            .posts
            .by_creator(&mut uow, user_id, page, Some(replies_or_reposts))
            .await?;
        let total = self
            .posts
            .by_creator_count(&mut uow, user_id, Some(replies_or_reposts))
            .await?;
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let items = self.details_by_ids(&mut uow, &ids).await?;
        Ok(Paginated { items, total })
    }

    async fn require_post(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<Post> {
        self.posts
            .get(uow, id)
            .await?
            .ok_or_else(|| QuillError::not_found("post", id))
    }

    /// Rolls back after a failed transactional phase. A rollback failure is
    /// logged but must not displace the original error.
    async fn abandon(&self, uow: &mut UnitOfWork) {
        if let Err(error) = uow.rollback().await {
            warn!(%error, "rollback after failed write did not complete cleanly");
        }
    }

    async fn details_by_id(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<PostDetails> {
        let mut details = self.details_by_ids(uow, &[id]).await?;
        details
            .pop()
            .ok_or_else(|| QuillError::not_found("post", id))
    }

    async fn details_by_ids(&self, uow: &mut UnitOfWork, ids: &[Uuid]) -> Result<Vec<PostDetails>> {
        let rows = self.posts.read_rows_by_ids(uow, ids).await?;

        let mut repost_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.repost_id).collect();
        repost_ids.sort_unstable();
        repost_ids.dedup();
        let repost_rows = self.posts.read_rows_by_ids(uow, &repost_ids).await?;

        let reposts: HashMap<Uuid, PostDetails> = self
            .assemble(repost_rows, &HashMap::new())?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let mut assembled: HashMap<Uuid, PostDetails> = self
            .assemble(rows, &reposts)?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        Ok(ids.iter().filter_map(|id| assembled.remove(id)).collect())
    }

    /// Groups flat join rows into one view per post: media ordered by sort
    /// index and resolved to presigned URLs, author image resolved to its
    /// public URL, repost embedded one level deep.
    fn assemble(
        &self,
        rows: Vec<PostReadRow>,
        reposts: &HashMap<Uuid, PostDetails>,
    ) -> Result<Vec<PostDetails>> {
        let mut order: Vec<Uuid> = Vec::new();
        let mut grouped: HashMap<Uuid, Vec<PostReadRow>> = HashMap::new();
        for row in rows {
            if !grouped.contains_key(&row.id) {
                order.push(row.id);
            }
            grouped.entry(row.id).or_default().push(row);
        }

        let mut details = Vec::with_capacity(order.len());
        for id in order {
            let Some(group) = grouped.remove(&id) else {
                continue;
            };
            let first = &group[0];

            let author = first.creator_id.map(|creator_id| PostAuthor {
                id: creator_id,
                username: first.creator_username.clone().unwrap_or_default(),
                first_name: first.creator_first_name.clone(),
                last_name: first.creator_last_name.clone(),
                profile_image_url: first
                    .creator_profile_image_key
                    .as_deref()
                    .map(|key| self.store.public_url(key)),
            });

            let mut media = Vec::new();
            for row in &group {
                if let (Some(key), Some(sort_order)) = (&row.media_key, row.media_order) {
                    let url = self.store.presigned_url(key, self.presign_ttl)?;
                    media.push((sort_order, MediaItem {
                        key: key.clone(),
                        url,
                    }));
                }
            }
            media.sort_by_key(|(sort_order, _)| *sort_order);

            details.push(PostDetails {
                id,
                author,
                content: first.content.clone(),
                tags: first.tags.clone(),
                depth: first.depth,
                likes_count: first.likes_count,
                views_count: first.views_count,
                replies_count: first.replies_count,
                reposts_count: first.reposts_count,
                media: media.into_iter().map(|(_, item)| item).collect(),
                repost: first
                    .repost_id
                    .and_then(|rid| reposts.get(&rid).cloned())
                    .map(Box::new),
            });
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;

    fn staged(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn extract_tags_normalizes_case_and_deduplicates() {
        let tags = extract_tags(Some("Hello #World and #world"));
        assert_eq!(tags, vec!["world".to_owned()]);
    }

    #[test]
    fn extract_tags_preserves_first_occurrence_order() {
        let tags = extract_tags(Some("#b #a #B #c"));
        assert_eq!(tags, vec!["b".to_owned(), "a".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn extract_tags_of_empty_content_is_empty() {
        assert!(extract_tags(None).is_empty());
        assert!(extract_tags(Some("no tags here")).is_empty());
    }

    #[tokio::test]
    async fn persist_uploads_calls_persist_once_per_key_and_marks_moves() {
        let mut store = MockObjectStore::new();
        store.expect_persist().times(2).returning(|key, _, _| {
            if let Some(name) = key.strip_prefix("temp/") {
                Ok(format!("private/posts/media/{name}"))
            } else {
                Ok(key.to_owned())
            }
        });

        let uploads = persist_uploads(
            &store,
            &staged(&["temp/a.png", "private/posts/media/b.png"]),
            MEDIA_FOLDER,
        )
        .await
        .unwrap();

        assert_eq!(uploads.len(), 2);
        assert!(uploads[0].moved);
        assert_eq!(uploads[0].key, "private/posts/media/a.png");
        assert!(!uploads[1].moved);
    }

    #[tokio::test]
    async fn failed_persist_compensates_the_batch_before_returning() {
        let mut store = MockObjectStore::new();
        store.expect_persist().times(2).returning(|key, _, _| {
            if key == "temp/ok.png" {
                Ok("private/posts/media/ok.png".to_owned())
            } else {
                Err(QuillError::ObjectStore("store unavailable".into()))
            }
        });
        store
            .expect_delete()
            .times(1)
            .withf(|key| key == "private/posts/media/ok.png")
            .returning(|_| Ok(()));

        let result =
            persist_uploads(&store, &staged(&["temp/ok.png", "temp/bad.png"]), MEDIA_FOLDER).await;

        assert!(matches!(result, Err(QuillError::ObjectStore(_))));
    }

    #[tokio::test]
    async fn compensation_swallows_delete_failures() {
        let mut store = MockObjectStore::new();
        store
            .expect_delete()
            .times(1)
            .returning(|_| Err(QuillError::ObjectStore("still down".into())));

        let uploads = vec![PersistedUpload {
            key: "private/posts/media/a.png".into(),
            moved: true,
        }];

        // must complete despite the failure
        compensate_uploads(&store, &uploads).await;
    }

    #[tokio::test]
    async fn compensation_skips_blobs_that_were_not_moved() {
        let mut store = MockObjectStore::new();
        store.expect_delete().never();

        let uploads = vec![PersistedUpload {
            key: "private/posts/media/kept.png".into(),
            moved: false,
        }];

        compensate_uploads(&store, &uploads).await;
    }
}
