//! Integrity section merge.

use super::{DiscardReason, PayloadOutcome, record_discard};
use crate::error::WorkerResult;
use crate::merge::merge_integrity;
use crate::state::AppState;
use pkgmeta_core::{FetchStatus, IntegrityMeta, PackageCoordinate};
use pkgmeta_metadata::models::IntegrityMetaRow;
use pkgmeta_metadata::{MetadataError, RecordWrite};
use time::OffsetDateTime;

const SECTION: &str = "integrity";

/// Merge the section and return the record as it stands afterwards, so the
/// integrity match can run against it even when the section was discarded.
pub(super) async fn merge(
    state: &AppState,
    coordinate: &PackageCoordinate,
    meta: &IntegrityMeta,
    now: OffsetDateTime,
) -> WorkerResult<(PayloadOutcome, IntegrityMetaRow)> {
    let store = state.metadata.as_ref();
    let canonical = coordinate.canonical();
    let key = canonical.as_str();

    let (write, row) = state
        .run_with_retry(|_| async move {
            let mut stored: Option<IntegrityMetaRow> = None;
            let mut edit = |current: Option<&IntegrityMetaRow>| {
                if let Some(row) =
                    current.filter(|row| row.fetch_status() == Some(FetchStatus::Processed))
                {
                    stored = Some(row.clone());
                    return None;
                }
                let mut row = current
                    .cloned()
                    .unwrap_or_else(|| IntegrityMetaRow::new(key));
                merge_integrity(&mut row, meta, now);
                stored = Some(row.clone());
                Some(row)
            };
            let write = store.modify_integrity_meta(key, &mut edit).await?;
            let row = stored.ok_or_else(|| {
                MetadataError::Internal(format!("integrity_meta {key} was not read"))
            })?;
            Ok((write, row))
        })
        .await?;

    let outcome = match write {
        RecordWrite::Created => PayloadOutcome::Created,
        RecordWrite::Updated => PayloadOutcome::Updated,
        RecordWrite::Unchanged => PayloadOutcome::Discarded(DiscardReason::AlreadyProcessed),
    };
    match outcome {
        PayloadOutcome::Discarded(reason) => record_discard(SECTION, key, reason),
        _ => tracing::debug!(
            purl = %key,
            status = row.status.as_deref().unwrap_or_default(),
            "Integrity record merged"
        ),
    }
    Ok((outcome, row))
}
