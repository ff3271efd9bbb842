//! Health record repository.

use crate::error::MetadataResult;
use crate::models::HealthMetaRow;
use crate::repos::RecordWrite;
use async_trait::async_trait;

/// Repository for health records.
#[async_trait]
pub trait HealthMetaRepo: Send + Sync {
    /// Get the health record for a key.
    async fn get_health_meta(&self, purl: &str) -> MetadataResult<Option<HealthMetaRow>>;

    /// Insert a new health record.
    ///
    /// Fails with `UniqueViolation` if a record for the key already exists.
    async fn create_health_meta(&self, row: &HealthMetaRow) -> MetadataResult<()>;

    /// Overwrite an existing health record.
    ///
    /// Fails with `NotFound` if no record exists for the key.
    async fn update_health_meta(&self, row: &HealthMetaRow) -> MetadataResult<()>;

    /// Read the health record for a key and replace it with `edit`'s result,
    /// atomically with respect to other writers of the same key.
    ///
    /// `edit` sees the current row (or `None`) and returns the row to store,
    /// or `None` to leave the record untouched. A racing first insert fails
    /// with `UniqueViolation`; the caller retries and `edit` runs again.
    async fn modify_health_meta(
        &self,
        purl: &str,
        edit: &mut (dyn for<'a> FnMut(Option<&'a HealthMetaRow>) -> Option<HealthMetaRow> + Send),
    ) -> MetadataResult<RecordWrite>;
}
