//! Object-store port. Blob storage lives outside the relational
//! transaction; the write orchestrator compensates for it explicitly.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryObjectStore;

/// Key prefix for freshly staged uploads. Staged blobs are expired by the
/// store's lifecycle rules; only persisted keys may be referenced from the
/// database.
pub const TEMP_PREFIX: &str = "temp/";

/// Key prefix for blobs served without signing.
pub const PUBLIC_PREFIX: &str = "public/";

/// Key prefix for blobs served through presigned URLs.
pub const PRIVATE_PREFIX: &str = "private/";

/// Client port for the external object store.
///
/// Implementations are stateless with respect to logical operations and
/// safe for concurrent use. None of these calls participate in a database
/// transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stages bytes under the temporary prefix and returns the staged key.
    async fn upload_temporary(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;

    /// Moves a staged blob into permanent storage under `target_folder` and
    /// returns its new key. Keys not under the temporary prefix pass
    /// through unchanged, so the call is safe to make at most once per
    /// upload.
    async fn persist(&self, key: &str, target_folder: &str, make_public: bool) -> Result<String>;

    /// Removes a blob. Unknown keys are ignored.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Stable URL for a public blob.
    fn public_url(&self, key: &str) -> String;

    /// Short-lived URL for a private blob.
    fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String>;
}
