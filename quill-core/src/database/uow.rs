//! The unit-of-work coordinator owning one transaction's lifecycle.

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::{QuillError, Result};

/// Connection handle for a single repository call: either the coordinator's
/// ambient transaction connection, or a short-lived pooled connection that
/// is returned to the pool when the handle drops.
#[derive(Debug)]
pub enum DbHandle<'a> {
    Ambient(&'a mut PgConnection),
    Owned(PoolConnection<Postgres>),
}

impl DbHandle<'_> {
    pub fn conn(&mut self) -> &mut PgConnection {
        match self {
            DbHandle::Ambient(conn) => conn,
            DbHandle::Owned(conn) => &mut **conn,
        }
    }
}

/// Coordinates at most one database transaction across any number of
/// repository calls.
///
/// Create one coordinator per logical operation and thread it through every
/// repository call; never share one across concurrent operations. Between
/// `begin` and `commit`/`rollback`, every call executes on the ambient
/// transaction; outside that window each call runs on its own short-lived
/// pooled connection, so repositories behave identically either way.
///
/// Dropping a coordinator mid-transaction rolls the transaction back.
#[derive(Debug)]
pub struct UnitOfWork {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl UnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Opens the ambient transaction. Calling while one is already active is
    /// a usage error.
    pub async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(QuillError::Invariant(
                "begin() called while a transaction is already active".into(),
            ));
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    /// Acquires the connection for one repository call.
    pub async fn acquire(&mut self) -> Result<DbHandle<'_>> {
        match self.tx.as_mut() {
            Some(tx) => Ok(DbHandle::Ambient(&mut **tx)),
            None => Ok(DbHandle::Owned(self.pool.acquire().await?)),
        }
    }

    /// Commits the ambient transaction and returns to idle. On failure the
    /// transaction is disposed (rolled back by the driver) and the error
    /// propagates unchanged.
    pub async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(QuillError::Invariant(
                "commit() called without an active transaction".into(),
            )),
        }
    }

    /// Rolls back the ambient transaction if one is open; otherwise a no-op.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
