//! Field-level merging of result sections into stored records.
//!
//! Every incoming field is optional. A present field overwrites the stored
//! one; an absent field leaves it untouched. The only wholesale change is
//! marking an integrity record as not available, which clears its hashes.

use crate::error::WorkerResult;
use pkgmeta_core::{FetchStatus, HealthMeta, IntegrityMeta};
use pkgmeta_metadata::models::{HealthMetaRow, IntegrityMetaRow};
use time::OffsetDateTime;

/// Overwrite `target` when `source` is present. Returns whether it was.
pub fn apply_if_present<T: Clone>(target: &mut Option<T>, source: &Option<T>) -> bool {
    match source {
        Some(value) => {
            *target = Some(value.clone());
            true
        }
        None => false,
    }
}

/// Like [`apply_if_present`], treating blank text as absent.
pub fn apply_text_if_present(target: &mut Option<String>, source: &Option<String>) -> bool {
    match source.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => {
            *target = Some(value.to_string());
            true
        }
        _ => false,
    }
}

/// Copies one health field from a result section onto a record.
type HealthField = fn(&mut HealthMetaRow, &HealthMeta) -> bool;

macro_rules! health_field {
    ($name:literal, $row:ident <- $meta:ident) => {
        ($name, |row: &mut HealthMetaRow, meta: &HealthMeta| {
            apply_if_present(&mut row.$row, &meta.$meta)
        })
    };
}

/// Scalar health fields, merged one by one. Scorecard checks are merged
/// separately from their serialized form.
pub const HEALTH_FIELDS: &[(&str, HealthField)] = &[
    health_field!("stars", stars <- stars),
    health_field!("forks", forks <- forks),
    health_field!("contributors", contributors <- contributors),
    health_field!(
        "commitFrequencyWeekly",
        commit_frequency_weekly <- commit_frequency_weekly
    ),
    health_field!("openIssues", open_issues <- open_issues),
    health_field!("openPRs", open_prs <- open_prs),
    health_field!("lastCommitDate", last_commit_date <- last_commit_date),
    health_field!("busFactor", bus_factor <- bus_factor),
    health_field!("hasReadme", has_readme <- has_readme),
    health_field!("hasCodeOfConduct", has_code_of_conduct <- has_code_of_conduct),
    health_field!("hasSecurityPolicy", has_security_policy <- has_security_policy),
    health_field!("dependents", dependents <- dependents),
    health_field!("files", files <- files),
    health_field!("isRepoArchived", is_repo_archived <- is_repo_archived),
    health_field!("scoreCardScore", scorecard_score <- score_card_score),
    health_field!(
        "scoreCardReferenceVersion",
        scorecard_reference_version <- score_card_reference_version
    ),
    health_field!("scoreCardTimestamp", scorecard_timestamp <- score_card_timestamp),
    health_field!("avgIssueAgeDays", avg_issue_age_days <- avg_issue_age_days),
];

/// Serialize scorecard checks to the stored JSON array, or `None` when the
/// section carries no checks.
pub fn scorecard_checks_json(meta: &HealthMeta) -> WorkerResult<Option<String>> {
    if meta.score_card_checks.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&meta.score_card_checks)?))
}

/// Merge a health section into a record and mark it processed.
///
/// `checks_json` is the output of [`scorecard_checks_json`]; `None` leaves
/// the stored checks untouched. Returns the names of the fields that were
/// present.
pub fn merge_health(
    row: &mut HealthMetaRow,
    meta: &HealthMeta,
    checks_json: Option<&str>,
    now: OffsetDateTime,
) -> Vec<&'static str> {
    let mut applied: Vec<&'static str> = HEALTH_FIELDS
        .iter()
        .filter_map(|(name, apply)| apply(row, meta).then_some(*name))
        .collect();
    if let Some(checks) = checks_json {
        row.scorecard_checks_json = Some(checks.to_string());
        applied.push("scoreCardChecks");
    }
    row.set_fetch_status(FetchStatus::Processed);
    row.last_fetch = Some(now);
    applied
}

/// Merge an integrity section into a record that is not yet processed.
///
/// A section with data marks the record processed. A section without any
/// hash or modification time marks it not available and clears every hash.
pub fn merge_integrity(row: &mut IntegrityMetaRow, meta: &IntegrityMeta, now: OffsetDateTime) {
    if meta.has_data() {
        apply_text_if_present(&mut row.md5, &meta.md5);
        apply_text_if_present(&mut row.sha1, &meta.sha1);
        apply_text_if_present(&mut row.sha256, &meta.sha256);
        apply_text_if_present(&mut row.sha512, &meta.sha512);
        apply_if_present(&mut row.published_at, &meta.current_version_last_modified);
        apply_text_if_present(&mut row.repository_url, &meta.meta_source_url);
        row.set_fetch_status(FetchStatus::Processed);
    } else {
        row.md5 = None;
        row.sha1 = None;
        row.sha256 = None;
        row.sha512 = None;
        apply_text_if_present(&mut row.repository_url, &meta.meta_source_url);
        row.set_fetch_status(FetchStatus::NotAvailable);
    }
    row.last_fetch = Some(now);
}

/// Whether `row` is exactly what merging `meta` into it would leave behind,
/// ignoring the fetch time. A redelivered message that already settled the
/// record matches; a later, different result does not.
pub fn integrity_settled_by(row: &IntegrityMetaRow, meta: &IntegrityMeta) -> bool {
    let mut replayed = row.clone();
    merge_integrity(&mut replayed, meta, OffsetDateTime::UNIX_EPOCH);
    replayed.last_fetch = row.last_fetch;
    replayed == *row
}
