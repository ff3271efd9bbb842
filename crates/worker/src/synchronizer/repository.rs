//! Latest-version section merge.
//!
//! The record only moves forward in producer time: a result produced at or
//! before the stored `last_check` is dropped whole. The guarded update in
//! the store closes the window between the read and the write.

use super::{DiscardReason, PayloadOutcome, record_discard};
use crate::error::WorkerResult;
use crate::merge::apply_if_present;
use crate::state::AppState;
use pkgmeta_core::{AnalysisResult, PackageCoordinate, RepositoryType};
use pkgmeta_metadata::models::RepositoryMetaRow;
use time::OffsetDateTime;

const SECTION: &str = "repository";

pub(super) async fn merge(
    state: &AppState,
    coordinate: &PackageCoordinate,
    result: &AnalysisResult,
    produced_at: OffsetDateTime,
) -> WorkerResult<PayloadOutcome> {
    let repository_type = RepositoryType::resolve(coordinate);
    if repository_type == RepositoryType::Unsupported {
        record_discard(
            SECTION,
            &coordinate.coordinates(),
            DiscardReason::UnsupportedRepository,
        );
        return Ok(PayloadOutcome::Discarded(
            DiscardReason::UnsupportedRepository,
        ));
    }

    let store = state.metadata.as_ref();
    let namespace = coordinate.namespace().unwrap_or_default();
    let name = coordinate.name();

    let outcome = state
        .run_with_retry(|_| async move {
            let existing = store
                .get_repository_meta(repository_type.as_str(), namespace, name)
                .await?;
            match existing {
                None => {
                    let row = RepositoryMetaRow {
                        repository_type: repository_type.as_str().to_string(),
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                        latest_version: result.latest_version.clone(),
                        published: result.published,
                        last_check: produced_at,
                    };
                    store.create_repository_meta(&row).await?;
                    Ok(PayloadOutcome::Created)
                }
                Some(row) if row.last_check >= produced_at => {
                    Ok(PayloadOutcome::Discarded(DiscardReason::OutOfOrder))
                }
                Some(mut row) => {
                    apply_if_present(&mut row.latest_version, &result.latest_version);
                    apply_if_present(&mut row.published, &result.published);
                    row.last_check = produced_at;
                    if store.update_repository_meta_if_newer(&row).await? {
                        Ok(PayloadOutcome::Updated)
                    } else {
                        // A newer result committed between the read and the write.
                        Ok(PayloadOutcome::Discarded(DiscardReason::OutOfOrder))
                    }
                }
            }
        })
        .await?;

    if let PayloadOutcome::Discarded(reason) = outcome {
        record_discard(SECTION, &coordinate.coordinates(), reason);
    }
    Ok(outcome)
}
