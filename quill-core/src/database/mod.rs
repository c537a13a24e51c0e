//! Database layer: declarative column metadata, the generic repository
//! engine, the unit-of-work coordinator, and per-entity repositories.

pub mod entity;
pub mod repositories;
pub mod repository;
pub mod schema;
pub mod uow;

pub use entity::{Entity, PgQuery};
pub use repository::Repository;
pub use schema::{ColumnDef, TableSchema};
pub use uow::{DbHandle, UnitOfWork};
