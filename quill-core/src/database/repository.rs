//! Generic CRUD engine over any mapped [`Entity`].

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::database::entity::{Entity, PgQuery};
use crate::database::uow::UnitOfWork;
use crate::error::{QuillError, Result};

/// Repository over one entity type, executing through an explicitly passed
/// [`UnitOfWork`]. The repository never opens or commits a transaction
/// itself and holds no connection state, so one instance is safe to reuse
/// across sequential operations.
pub struct Repository<E: Entity> {
    actor: Arc<dyn CurrentActor>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("table", &E::TABLE).finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(actor: Arc<dyn CurrentActor>) -> Self {
        Self {
            actor,
            _entity: PhantomData,
        }
    }

    /// Fetches by identity. Absence is `Ok(None)`, never an error.
    pub async fn get(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<Option<E>> {
        let schema = E::schema();
        let mut db = uow.acquire().await?;
        let entity = sqlx::query_as::<_, E>(&schema.select_by_id)
            .bind(id)
            .fetch_optional(db.conn())
            .await?;
        Ok(entity)
    }

    /// Inserts one entity, assigning identity if absent and stamping the
    /// creation audit fields when the type is auditable.
    pub async fn add(&self, uow: &mut UnitOfWork, entity: &mut E) -> Result<()> {
        let schema = E::schema();
        self.normalize_for_add(entity);

        let query = Self::bind_row(entity, sqlx::query(&schema.insert));
        let mut db = uow.acquire().await?;
        query.execute(db.conn()).await?;

        debug!(table = E::TABLE, id = %entity.id(), "inserted row");
        Ok(())
    }

    /// Inserts many entities with one multi-row statement, one parameter
    /// set per row. Empty input is a no-op.
    pub async fn add_many(&self, uow: &mut UnitOfWork, entities: &mut [E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let schema = E::schema();
        for entity in entities.iter_mut() {
            self.normalize_for_add(entity);
        }

        let sql = schema.insert_many_sql(entities.len());
        let mut query = sqlx::query(&sql);
        for entity in entities.iter() {
            query = Self::bind_row(entity, query);
        }

        let mut db = uow.acquire().await?;
        query.execute(db.conn()).await?;

        debug!(table = E::TABLE, rows = entities.len(), "bulk inserted rows");
        Ok(())
    }

    /// Updates one entity guarded by its row version.
    ///
    /// A version mismatch (or a concurrently deleted row) affects zero rows
    /// and fails with [`QuillError::Concurrency`], leaving the in-memory
    /// entity untouched. On success the entity mirrors the store: version
    /// incremented by one and, when auditable, the update stamps applied.
    pub async fn update(&self, uow: &mut UnitOfWork, entity: &mut E) -> Result<()> {
        let schema = E::schema();

        let stamp = entity
            .audit()
            .map(|audit| (audit.created_at, audit.created_by))
            .map(|(created_at, created_by)| {
                (
                    created_at,
                    created_by,
                    Utc::now(),
                    self.actor.current_user_id(),
                )
            });

        let mut query = entity.bind_update(sqlx::query(&schema.update));
        if let Some((created_at, created_by, updated_at, updated_by)) = stamp {
            query = query
                .bind(created_at)
                .bind(created_by)
                .bind(Some(updated_at))
                .bind(updated_by);
        }

        let expected = entity.row_version();
        query = query.bind(entity.id()).bind(expected);

        let mut db = uow.acquire().await?;
        let result = query.execute(db.conn()).await?;

        if result.rows_affected() == 0 {
            return Err(QuillError::Concurrency(format!(
                "{} {} was modified by another request",
                E::TABLE,
                entity.id()
            )));
        }

        entity.set_row_version(expected + 1);
        if let Some((_, _, updated_at, updated_by)) = stamp {
            if let Some(audit) = entity.audit_mut() {
                audit.updated_at = Some(updated_at);
                audit.updated_by = updated_by;
            }
        }

        debug!(table = E::TABLE, id = %entity.id(), version = expected + 1, "updated row");
        Ok(())
    }

    /// Removes by identity, unconditionally. Deletes intentionally carry no
    /// optimistic-concurrency check: a delete always wins if the row exists.
    pub async fn delete(&self, uow: &mut UnitOfWork, id: Uuid) -> Result<()> {
        let schema = E::schema();
        let mut db = uow.acquire().await?;
        sqlx::query(&schema.delete)
            .bind(id)
            .execute(db.conn())
            .await?;

        debug!(table = E::TABLE, %id, "deleted row");
        Ok(())
    }

    /// Removes all rows whose identity is in `ids`; same no-version-check
    /// semantics as [`delete`](Self::delete). Empty input is a no-op.
    pub async fn delete_many(&self, uow: &mut UnitOfWork, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let schema = E::schema();
        let mut db = uow.acquire().await?;
        sqlx::query(&schema.delete_many)
            .bind(ids.to_vec())
            .execute(db.conn())
            .await?;

        debug!(table = E::TABLE, rows = ids.len(), "bulk deleted rows");
        Ok(())
    }

    fn normalize_for_add(&self, entity: &mut E) {
        if entity.id().is_nil() {
            entity.set_id(Uuid::now_v7());
        }
        if let Some(audit) = entity.audit_mut() {
            audit.created_at = Some(Utc::now());
            audit.created_by = self.actor.current_user_id();
        }
    }

    /// Binds one full parameter set in declared column order: identity,
    /// version, type-specific columns, audit columns when present.
    fn bind_row<'q>(entity: &E, query: PgQuery<'q>) -> PgQuery<'q> {
        let mut query = query.bind(entity.id()).bind(entity.row_version());
        query = entity.bind_insert(query);
        if let Some(audit) = entity.audit() {
            query = query
                .bind(audit.created_at)
                .bind(audit.created_by)
                .bind(audit.updated_at)
                .bind(audit.updated_by);
        }
        query
    }
}
