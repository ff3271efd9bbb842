//! Latest-version record repository.

use crate::error::MetadataResult;
use crate::models::RepositoryMetaRow;
use async_trait::async_trait;

/// Repository for latest-version records.
#[async_trait]
pub trait RepositoryMetaRepo: Send + Sync {
    /// Get the record for a package. `namespace` is empty for packages without one.
    async fn get_repository_meta(
        &self,
        repository_type: &str,
        namespace: &str,
        name: &str,
    ) -> MetadataResult<Option<RepositoryMetaRow>>;

    /// Insert a new record.
    ///
    /// Fails with `UniqueViolation` if a record for the package already exists.
    async fn create_repository_meta(&self, row: &RepositoryMetaRow) -> MetadataResult<()>;

    /// Overwrite the stored record only if its `last_check` is older than
    /// `row.last_check`. Returns whether a row was written.
    async fn update_repository_meta_if_newer(&self, row: &RepositoryMetaRow)
    -> MetadataResult<bool>;
}
