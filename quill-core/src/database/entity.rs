//! The mapping contract between an entity type and its table.

use quill_model::Audit;
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgRow};
use uuid::Uuid;

use crate::database::schema::{ColumnDef, TableSchema};

/// A single-statement Postgres query with positional arguments.
pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A persisted entity with identity and optimistic-concurrency version.
///
/// Implementations declare their table mapping once, as constants; the
/// repository engine renders and caches all statements from it. The two
/// `bind_*` methods must bind values in exactly the declared [`COLUMNS`]
/// order (`bind_update` skipping the columns flagged skip-on-update); the
/// rendered parameter lists rely on it.
///
/// [`COLUMNS`]: Entity::COLUMNS
pub trait Entity: Send + Sync + Unpin + for<'r> sqlx::FromRow<'r, PgRow> {
    const TABLE: &'static str;
    const COLUMNS: &'static [ColumnDef];
    const AUDITABLE: bool = false;

    /// The cached schema for this type. Implementations hold it in a
    /// `OnceLock` so the fragments are rendered exactly once.
    fn schema() -> &'static TableSchema;

    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn row_version(&self) -> i64;
    fn set_row_version(&mut self, version: i64);

    /// Audit stamps, present only on types declaring `AUDITABLE = true`.
    fn audit(&self) -> Option<&Audit> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut Audit> {
        None
    }

    /// Binds the type-specific column values for an insert.
    fn bind_insert<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q>;

    /// Binds the type-specific column values for the generic update,
    /// skipping columns owned by dedicated statements.
    fn bind_update<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q>;
}
