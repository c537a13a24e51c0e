//! # Quill Core
//!
//! Core library for the Quill posting backend, providing the transactional
//! write pipeline: a generic relational-mapping repository engine with
//! optimistic concurrency, an explicit unit of work scoping repository calls
//! into one Postgres transaction, and write orchestration that keeps a post
//! aggregate consistent with an external, non-transactional object store.
//!
//! ## Overview
//!
//! - **Column metadata**: declarative per-entity schemas with cached SQL
//!   fragments, built once per type ([`database::schema`])
//! - **Generic repository**: CRUD and bulk operations over any mapped entity
//!   with row-version concurrency control ([`database::repository`])
//! - **Unit of work**: one coordinator per logical operation, threaded
//!   explicitly through every repository call ([`database::uow`])
//! - **Write orchestration**: post create/update/delete with media diffing,
//!   tag usage accounting, and awaited best-effort blob compensation
//!   ([`services::posts`])
//! - **Object store port**: staging/persist/delete seam to blob storage,
//!   with an in-memory adapter for tests ([`storage`])
//!
//! The HTTP surface, auth, and image optimization live with their own
//! services and consume this crate through [`services::posts::PostsService`].

/// Acting-identity port used for audit stamping
pub mod actor;

/// Typed configuration loaded from files and environment
pub mod config;

/// Database abstraction layer: schemas, repositories, unit of work
pub mod database;

/// Error types and error handling utilities
pub mod error;

/// Write orchestration services
pub mod services;

/// Object store port and adapters
pub mod storage;

pub use error::{QuillError, Result};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
