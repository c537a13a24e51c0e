use std::sync::Arc;
use std::sync::OnceLock;

use quill_model::PostLike;
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::repository::Repository;
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for PostLike {
    const TABLE: &'static str = "post_likes";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("post_id", "post_id"),
        ColumnDef::new("user_id", "user_id"),
        ColumnDef::new("liked_at", "liked_at"),
    ];

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<PostLike>)
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
            .bind(self.post_id)
            .bind(self.user_id)
            .bind(self.liked_at)
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.post_id)
            .bind(self.user_id)
            .bind(self.liked_at)
    }
}

#[derive(Debug)]
pub struct PostLikesRepository {
    base: Repository<PostLike>,
}

impl PostLikesRepository {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            base: Repository::new(actor),
        }
    }

    pub async fn add(&self, uow: &mut UnitOfWork, like: &mut PostLike) -> Result<()> {
        self.base.add(uow, like).await
    }

    pub async fn delete(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<()> {
        self.base.delete(uow, id).await
    }

    pub async fn find(
        &self,
        uow: &mut UnitOfWork,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PostLike>> {
        let schema = PostLike::schema();
        let sql = format!(
            "SELECT {} FROM post_likes WHERE post_id = $1 AND user_id = $2 LIMIT 1",
            schema.select_list
        );

        let mut db = uow.acquire().await?;
        let like = sqlx::query_as::<_, PostLike>(&sql)
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(db.conn())
            .await?;
        Ok(like)
    }
}
