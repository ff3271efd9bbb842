//! Orphaned record cleanup.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Deletes metadata records no tracked component refers to.
#[async_trait]
pub trait MaintenanceRepo: Send + Sync {
    /// Delete health records whose key matches no component's coordinates.
    async fn delete_orphaned_health_meta(&self) -> MetadataResult<u64>;

    /// Delete integrity records whose key matches no component's purl.
    async fn delete_orphaned_integrity_meta(&self) -> MetadataResult<u64>;

    /// Delete latest-version records matching no component's
    /// (ecosystem, namespace, name).
    async fn delete_orphaned_repository_meta(&self) -> MetadataResult<u64>;
}
