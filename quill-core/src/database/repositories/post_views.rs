use std::sync::Arc;
use std::sync::OnceLock;

use quill_model::PostView;
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::repository::Repository;
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for PostView {
    const TABLE: &'static str = "post_views";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("post_id", "post_id"),
        ColumnDef::new("user_id", "user_id"),
        ColumnDef::new("first_viewed_at", "first_viewed_at"),
        ColumnDef::new("last_viewed_at", "last_viewed_at"),
    ];

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<PostView>)
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
            .bind(self.first_viewed_at)
            .bind(self.last_viewed_at)
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.post_id)
            .bind(self.user_id)
            .bind(self.first_viewed_at)
            .bind(self.last_viewed_at)
    }
}

#[derive(Debug)]
pub struct PostViewsRepository {
    base: Repository<PostView>,
}

impl PostViewsRepository {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            base: Repository::new(actor),
        }
    }

    pub async fn add(&self, uow: &mut UnitOfWork, view: &mut PostView) -> Result<()> {
        self.base.add(uow, view).await
    }

    pub async fn update(&self, uow: &mut UnitOfWork, view: &mut PostView) -> Result<()> {
        self.base.update(uow, view).await
    }

    pub async fn find(
        &self,
        uow: &mut UnitOfWork,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PostView>> {
        let schema = PostView::schema();
        let sql = format!(
            "SELECT {} FROM post_views WHERE post_id = $1 AND user_id = $2 LIMIT 1",
            schema.select_list
        );

        let mut db = uow.acquire().await?;
        let view = sqlx::query_as::<_, PostView>(&sql)
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(db.conn())
            .await?;
        Ok(view)
    }
}
