use std::sync::Arc;
use std::sync::OnceLock;

use quill_model::{Audit, User};
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::repository::Repository;
use crate::database::schema::{ColumnDef, TableSchema};
use crate::database::uow::UnitOfWork;
use crate::error::Result;

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("username", "username"),
        ColumnDef::new("email", "email"),
        ColumnDef::new("first_name", "first_name"),
        ColumnDef::new("last_name", "last_name"),
        ColumnDef::new("description", "description"),
        ColumnDef::new("profile_image_key", "profile_image_key"),
        ColumnDef::new("profile_banner_key", "profile_banner_key"),
    ];
    const AUDITABLE: bool = true;

    fn schema() -> &'static TableSchema {
        static SCHEMA: OnceLock<TableSchema> = OnceLock::new();
        SCHEMA.get_or_init(TableSchema::build::<User>)
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
            .bind(self.username.clone())
            .bind(self.email.clone())
            .bind(self.first_name.clone())
            .bind(self.last_name.clone())
            .bind(self.description.clone())
            .bind(self.profile_image_key.clone())
            .bind(self.profile_banner_key.clone())
    }

    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.username.clone())
            .bind(self.email.clone())
            .bind(self.first_name.clone())
            .bind(self.last_name.clone())
            .bind(self.description.clone())
            .bind(self.profile_image_key.clone())
            .bind(self.profile_banner_key.clone())
    }
}

/// Profile rows consumed by the post read-model join. Credentials and
/// session handling live with the auth service.
#[derive(Debug)]
pub struct UsersRepository {
    base: Repository<User>,
}

impl UsersRepository {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            base: Repository::new(actor),
        }
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<Option<User>> {
        self.base.get(uow, id).await
    }

    pub async fn add(&self, uow: &mut UnitOfWork, user: &mut User) -> Result<()> {
        self.base.add(uow, user).await
    }

    pub async fn update(&self, uow: &mut UnitOfWork, user: &mut User) -> Result<()> {
        self.base.update(uow, user).await
    }

    pub async fn delete(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<()> {
        self.base.delete(uow, id).await
    }
}
