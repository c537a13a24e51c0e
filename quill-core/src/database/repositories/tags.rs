use std::sync::OnceLock;

use chrono::Utc;
use quill_model::Tag;
use uuid::Uuid;

use crate::database::entity::{Entity, PgQuery};
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for Tag {
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("name", "name"),
        ColumnDef::skip_on_update("usage_count", "usage_count"),
        ColumnDef::skip_on_update("last_used_at", "last_used_at"),
    ];

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<Tag>)
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

    fn bind_insert<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.name.clone())
            .bind(self.usage_count)
            .bind(self.last_used_at)
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        // usage stats are skip-on-update; the upsert/decrement statements
        // own them
        query.bind(self.name.clone())
    }
}

/// Tag usage statistics, maintained exclusively through the set-based
/// statements below so concurrent posts never fight over counter rows.
#[derive(Debug, Default)]
pub struct TagsRepository;

impl TagsRepository {
    pub fn new() -> Self {
        Self
    }

    /// Records one use of each tag: inserts unseen tags with a count of one,
    /// bumps the rest. Empty input is a no-op.
    pub async fn upsert_usage(&self, uow: &mut UnitOfWork, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let sql = "INSERT INTO tags (name, usage_count, last_used_at) \
                   SELECT t, 1, $2 FROM unnest($1::text[]) AS t \
                   ON CONFLICT (name) DO UPDATE SET \
                       usage_count = tags.usage_count + 1, \
                       last_used_at = EXCLUDED.last_used_at, \
                       row_version = tags.row_version + 1";

        let mut db = uow.acquire().await?;
        sqlx::query(sql)
            .bind(tags.to_vec())
            .bind(Utc::now())
            .execute(db.conn())
            .await?;
        Ok(())
    }

    /// Releases one use of each tag, clamping at zero. Empty input is a
    /// no-op.
    pub async fn decrement_usage(&self, uow: &mut UnitOfWork, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let sql = "UPDATE tags SET \
                       usage_count = GREATEST(0, usage_count - 1), \
                       row_version = row_version + 1 \
                   WHERE name = ANY($1)";

        let mut db = uow.acquire().await?;
        sqlx::query(sql)
            .bind(tags.to_vec())
            .execute(db.conn())
            .await?;
        Ok(())
    }

    pub async fn get_by_name(&self, uow: &mut UnitOfWork, name: &str) -> Result<Option<Tag>> {
        let schema = Tag::schema();
        let sql = format!(
            "SELECT {} FROM tags WHERE name = $1 LIMIT 1",
            schema.select_list
        );

        let mut db = uow.acquire().await?;
        let tag = sqlx::query_as::<_, Tag>(&sql)
            .bind(name)
            .fetch_optional(db.conn())
            .await?;
        Ok(tag)
    }
}
