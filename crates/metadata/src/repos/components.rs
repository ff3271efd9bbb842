//! Tracked component repository.

use crate::error::MetadataResult;
use crate::models::ComponentRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for tracked components.
#[async_trait]
pub trait ComponentRepo: Send + Sync {
    /// Insert a component or replace the one with the same UUID.
    async fn upsert_component(&self, component: &ComponentRow) -> MetadataResult<()>;

    /// Get a component by UUID.
    async fn get_component(&self, uuid: Uuid) -> MetadataResult<Option<ComponentRow>>;

    /// List components whose coordinates (canonical, without qualifiers) match.
    async fn list_components_by_coordinates(
        &self,
        purl_coordinates: &str,
    ) -> MetadataResult<Vec<ComponentRow>>;

    /// Stop tracking a component.
    async fn delete_component(&self, uuid: Uuid) -> MetadataResult<()>;
}
