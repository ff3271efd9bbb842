//! Integrity analysis repository.

use crate::error::MetadataResult;
use crate::models::IntegrityAnalysisRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for per-component integrity analysis results.
#[async_trait]
pub trait IntegrityAnalysisRepo: Send + Sync {
    /// Insert or replace the analysis for a component.
    async fn upsert_integrity_analysis(&self, row: &IntegrityAnalysisRow) -> MetadataResult<()>;

    /// Get the analysis for a component.
    async fn get_integrity_analysis(
        &self,
        component_uuid: Uuid,
    ) -> MetadataResult<Option<IntegrityAnalysisRow>>;
}
