//! Health section merge.

use super::PayloadOutcome;
use crate::error::WorkerResult;
use crate::merge::{merge_health, scorecard_checks_json};
use crate::state::AppState;
use pkgmeta_core::{HealthMeta, PackageCoordinate};
use pkgmeta_metadata::RecordWrite;
use pkgmeta_metadata::models::HealthMetaRow;
use time::OffsetDateTime;

pub(super) async fn merge(
    state: &AppState,
    coordinate: &PackageCoordinate,
    meta: &HealthMeta,
    now: OffsetDateTime,
) -> WorkerResult<PayloadOutcome> {
    let store = state.metadata.as_ref();
    let coordinates = coordinate.coordinates();
    let key = coordinates.as_str();
    let serialized_checks = scorecard_checks_json(meta)?;
    let checks_json = serialized_checks.as_deref();

    // The merge runs against the row as locked by the store, so concurrent
    // sparse messages for the same key each see the other's fields.
    let (write, applied) = state
        .run_with_retry(|_| async move {
            let mut applied = Vec::new();
            let mut edit = |current: Option<&HealthMetaRow>| {
                let mut row = current
                    .cloned()
                    .unwrap_or_else(|| HealthMetaRow::new(key));
                applied = merge_health(&mut row, meta, checks_json, now);
                Some(row)
            };
            let write = store.modify_health_meta(key, &mut edit).await?;
            Ok((write, applied))
        })
        .await?;

    tracing::debug!(purl = %key, fields = ?applied, "Health record merged");
    Ok(match write {
        RecordWrite::Created => PayloadOutcome::Created,
        RecordWrite::Updated | RecordWrite::Unchanged => PayloadOutcome::Updated,
    })
}
