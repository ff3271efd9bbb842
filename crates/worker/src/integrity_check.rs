//! Integrity match between tracked components and fetched hashes.

use crate::error::WorkerResult;
use crate::state::AppState;
use pkgmeta_core::compute_integrity_match;
use pkgmeta_metadata::models::{ComponentRow, IntegrityAnalysisRow, IntegrityMetaRow};
use time::OffsetDateTime;

/// Match each component's hashes against the integrity record and store
/// the analysis per component.
pub async fn check_components(
    state: &AppState,
    components: &[ComponentRow],
    record: &IntegrityMetaRow,
    now: OffsetDateTime,
) -> WorkerResult<Vec<IntegrityAnalysisRow>> {
    let fetched = record.hashes();
    let mut analyses = Vec::with_capacity(components.len());

    for component in components {
        let result = compute_integrity_match(&component.hashes(), &fetched);
        let analysis = IntegrityAnalysisRow::from_match(component.uuid, &result, now);
        state.metadata.upsert_integrity_analysis(&analysis).await?;

        tracing::debug!(
            component_uuid = %component.uuid,
            purl = %record.purl,
            status = %result.overall,
            "Integrity analysis stored"
        );
        analyses.push(analysis);
    }

    Ok(analyses)
}
