use std::sync::Arc;
use std::sync::OnceLock;

use quill_model::{Audit, PostMedia};
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::repository::Repository;
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for PostMedia {
    const TABLE: &'static str = "post_media";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("post_id", "post_id"),
        ColumnDef::new("key", "key"),
        ColumnDef::new("sort_order", "sort_order"),
    ];
    const AUDITABLE: bool = true;

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<PostMedia>)
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
            .bind(self.post_id)
            .bind(self.key.clone())
            .bind(self.sort_order)
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.post_id)
            .bind(self.key.clone())
            .bind(self.sort_order)
    }
}

/// Ordered media children of a post.
#[derive(Debug)]
pub struct PostMediaRepository {
    base: Repository<PostMedia>,
}

impl PostMediaRepository {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            base: Repository::new(actor),
        }
    }

    pub async fn add_many(&self, uow: &mut UnitOfWork, media: &mut [PostMedia]) -> Result<()> {
        self.base.add_many(uow, media).await
    }

    pub async fn update(&self, uow: &mut UnitOfWork, media: &mut PostMedia) -> Result<()> {
        self.base.update(uow, media).await
    }

    pub async fn delete_many(&self, uow: &mut UnitOfWork, ids: &[Uuid]) -> Result<()> {
        self.base.delete_many(uow, ids).await
    }

    pub async fn list_by_post(
        &self,
        uow: &mut UnitOfWork,
        post_id: Uuid,
    ) -> Result<Vec<PostMedia>> {
        let schema = PostMedia::schema();
        let sql = format!(
            "SELECT {} FROM post_media WHERE post_id = $1 ORDER BY sort_order",
            schema.select_list
        );

        let mut db = uow.acquire().await?;
        let media = sqlx::query_as::<_, PostMedia>(&sql)
            .bind(post_id)
            .fetch_all(db.conn())
            .await?;
        Ok(media)
    }
}
