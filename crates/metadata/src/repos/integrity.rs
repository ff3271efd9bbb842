//! Integrity record repository.

use crate::error::MetadataResult;
use crate::models::IntegrityMetaRow;
use crate::repos::RecordWrite;
use async_trait::async_trait;

/// Repository for integrity records.
#[async_trait]
pub trait IntegrityMetaRepo: Send + Sync {
    /// Get the integrity record for a key.
    async fn get_integrity_meta(&self, purl: &str) -> MetadataResult<Option<IntegrityMetaRow>>;

    /// Insert a new integrity record.
    ///
    /// Fails with `UniqueViolation` if a record for the key already exists.
    async fn create_integrity_meta(&self, row: &IntegrityMetaRow) -> MetadataResult<()>;

    /// Overwrite an existing integrity record.
    ///
    /// Fails with `NotFound` if no record exists for the key.
    async fn update_integrity_meta(&self, row: &IntegrityMetaRow) -> MetadataResult<()>;

    /// Read the integrity record for a key and replace it with `edit`'s result,
    /// atomically with respect to other writers of the same key.
    ///
    /// `edit` sees the current row (or `None`) and returns the row to store,
    /// or `None` to leave the record untouched. A racing first insert fails
    /// with `UniqueViolation`; the caller retries and `edit` runs again.
    async fn modify_integrity_meta(
        &self,
        purl: &str,
        edit: &mut (dyn for<'a> FnMut(Option<&'a IntegrityMetaRow>) -> Option<IntegrityMetaRow> + Send),
    ) -> MetadataResult<RecordWrite>;
}
