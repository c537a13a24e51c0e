use std::sync::Arc;
use std::sync::OnceLock;

use quill_model::{Audit, PageRequest, Post, PostReadRow};
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::repository::Repository;
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("content", "content"),
        ColumnDef::new("tags", "tags"),
        ColumnDef::new("reply_for_id", "reply_for_id"),
        ColumnDef::new("repost_id", "repost_id"),
        ColumnDef::new("depth", "depth"),
        ColumnDef::skip_on_update("likes_count", "likes_count"),
        ColumnDef::skip_on_update("views_count", "views_count"),
        ColumnDef::skip_on_update("replies_count", "replies_count"),
        ColumnDef::skip_on_update("reposts_count", "reposts_count"),
    ];
    const AUDITABLE: bool = true;

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<Post>)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn row_version(&self) -> i64 {
        self.row_version
    }

    fn set_row_version(&mut self, version: i64) {
        self.row_version = version;
    }

    fn audit(&self) -> Option<&Audit> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut Audit> {
        Some(&mut self.audit)
    }

    fn bind_insert<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.content.clone())
            .bind(self.tags.clone())
            .bind(self.reply_for_id)
            .bind(self.repost_id)
            .bind(self.depth)
            .bind(self.likes_count)
            .bind(self.views_count)
            .bind(self.replies_count)
            .bind(self.reposts_count)
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        // counters are skip-on-update; their dedicated statements own them
        query
            .bind(self.content.clone())
            .bind(self.tags.clone())
            .bind(self.reply_for_id)
            .bind(self.repost_id)
            .bind(self.depth)
    }
}

/// The four high-frequency post counters, each owned by the dedicated
/// increment/decrement statement rather than the generic update path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCounter {
    Likes,
    Views,
    Replies,
    Reposts,
}

impl PostCounter {
    fn column(self) -> &'static str {
        match self {
            PostCounter::Likes => "likes_count",
            PostCounter::Views => "views_count",
            PostCounter::Replies => "replies_count",
            PostCounter::Reposts => "reposts_count",
        }
    }
}

const READ_SQL: &str = r#"
    SELECT
        p.id AS "id",
        p.content AS "content",
        p.tags AS "tags",
        p.reply_for_id AS "reply_for_id",
        p.repost_id AS "repost_id",
        p.depth AS "depth",
        p.likes_count AS "likes_count",
        p.views_count AS "views_count",
        p.replies_count AS "replies_count",
        p.reposts_count AS "reposts_count",
        pm.id AS "media_id",
        pm.key AS "media_key",
        pm.sort_order AS "media_order",
        u.id AS "creator_id",
        u.username AS "creator_username",
        u.first_name AS "creator_first_name",
        u.last_name AS "creator_last_name",
        u.profile_image_key AS "creator_profile_image_key"
    FROM posts p
    LEFT JOIN post_media pm ON pm.post_id = p.id
    LEFT JOIN users u ON u.id = p.created_by
"#;

/// Post rows plus the read-model join and the dedicated counter statements.
#[derive(Debug)]
pub struct PostsRepository {
    base: Repository<Post>,
}

impl PostsRepository {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            base: Repository::new(actor),
        }
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<Option<Post>> {
        self.base.get(uow, id).await
    }

    pub async fn add(&self, uow: &mut UnitOfWork, post: &mut Post) -> Result<()> {
        self.base.add(uow, post).await
    }

    pub async fn update(&self, uow: &mut UnitOfWork, post: &mut Post) -> Result<()> {
        self.base.update(uow, post).await
    }

    pub async fn delete(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<()> {
        self.base.delete(uow, id).await
    }

    /// Flat read-model rows for the given posts, one row per attached media
    /// item (or one bare row when a post has none).
    pub async fn read_rows_by_ids(
        &self,
        uow: &mut UnitOfWork,
        ids: &[Uuid],
    ) -> Result<Vec<PostReadRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{READ_SQL} WHERE p.id = ANY($1)");
        let mut db = uow.acquire().await?;
        let rows = sqlx::query_as::<_, PostReadRow>(&sql)
            .bind(ids.to_vec())
            .fetch_all(db.conn())
            .await?;
        Ok(rows)
    }

    /// Pages a creator's posts, newest first. `replies_or_reposts` narrows
    /// to only replies/reposts (`Some(true)`) or only root posts
    /// (`Some(false)`).
    pub async fn by_creator(
        &self,
        uow: &mut UnitOfWork,
        creator_id: Uuid,
        page: PageRequest,
        replies_or_reposts: Option<bool>,
    ) -> Result<Vec<Post>> {
        let schema = Post::schema();
        let sql = format!(
            "SELECT {} FROM posts WHERE {} ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            schema.select_list,
            Self::creator_filter(replies_or_reposts),
        );

        let mut db = uow.acquire().await?;
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(creator_id)
            .bind(page.limit)
            .bind(page.from)
            .fetch_all(db.conn())
            .await?;
        Ok(posts)
    }

    pub async fn by_creator_count(
        &self,
        uow: &mut UnitOfWork,
        creator_id: Uuid,
        replies_or_reposts: Option<bool>,
    ) -> Result<i64> {
        let sql = format!(
            "SELECT count(id) FROM posts WHERE {}",
            Self::creator_filter(replies_or_reposts),
        );

        let mut db = uow.acquire().await?;
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(creator_id)
            .fetch_one(db.conn())
            .await?;
        Ok(count)
    }

    pub async fn replies_of(
        &self,
        uow: &mut UnitOfWork,
        reply_for_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Post>> {
        let schema = Post::schema();
        let sql = format!(
            "SELECT {} FROM posts WHERE reply_for_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            schema.select_list,
        );

        let mut db = uow.acquire().await?;
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(reply_for_id)
            .bind(page.limit)
            .bind(page.from)
            .fetch_all(db.conn())
            .await?;
        Ok(posts)
    }

    pub async fn replies_of_count(&self, uow: &mut UnitOfWork, reply_for_id: Uuid) -> Result<i64> {
        let mut db = uow.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM posts WHERE reply_for_id = $1")
            .bind(reply_for_id)
            .fetch_one(db.conn())
            .await?;
        Ok(count)
    }

    pub async fn increment(
        &self,
        uow: &mut UnitOfWork,
        id: Uuid,
        counter: PostCounter,
    ) -> Result<()> {
        self.change_counter(uow, id, counter, 1).await
    }

    pub async fn decrement(
        &self,
        uow: &mut UnitOfWork,
        id: Uuid,
        counter: PostCounter,
    ) -> Result<()> {
        self.change_counter(uow, id, counter, -1).await
    }

    /// Counter bumps advance the row version like any other update but are
    /// deliberately unconditional: a bump never collides with, and is never
    /// overwritten by, a full-row optimistic update.
    async fn change_counter(
        &self,
        uow: &mut UnitOfWork,
        id: Uuid,
        counter: PostCounter,
        delta: i32,
    ) -> Result<()> {
        let column = counter.column();
        let sql = format!(
            "UPDATE posts SET {column} = GREATEST(0, {column} + $2), \
             row_version = row_version + 1 WHERE id = $1"
        );

        let mut db = uow.acquire().await?;
        sqlx::query(&sql)
            .bind(id)
            .bind(delta)
            .execute(db.conn())
            .await?;
        Ok(())
    }

    fn creator_filter(replies_or_reposts: Option<bool>) -> &'static str {
        match replies_or_reposts {
            Some(true) => "created_by = $1 AND (reply_for_id IS NOT NULL OR repost_id IS NOT NULL)",
            Some(false) => "created_by = $1 AND reply_for_id IS NULL AND repost_id IS NULL",
            None => "created_by = $1",
        }
    }
}
