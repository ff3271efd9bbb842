//! Database models mapping to the metadata schema.

use pkgmeta_core::{FetchStatus, IntegrityMatch, RecordState};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Health records
// =============================================================================

/// Repository health signals for one package, keyed by its coordinates.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct HealthMetaRow {
    pub purl: String,
    pub stars: Option<i32>,
    pub forks: Option<i32>,
    pub contributors: Option<i32>,
    pub commit_frequency_weekly: Option<f32>,
    pub open_issues: Option<i32>,
    pub open_prs: Option<i32>,
    pub last_commit_date: Option<OffsetDateTime>,
    pub bus_factor: Option<i32>,
    pub has_readme: Option<bool>,
    pub has_code_of_conduct: Option<bool>,
    pub has_security_policy: Option<bool>,
    pub dependents: Option<i32>,
    pub files: Option<i32>,
    pub is_repo_archived: Option<bool>,
    pub scorecard_score: Option<f32>,
    pub scorecard_reference_version: Option<String>,
    pub scorecard_timestamp: Option<OffsetDateTime>,
    pub avg_issue_age_days: Option<f32>,
    /// JSON array of scorecard checks.
    pub scorecard_checks_json: Option<String>,
    pub last_fetch: Option<OffsetDateTime>,
    /// `FetchStatus` text form; NULL when unknown.
    pub status: Option<String>,
}

impl HealthMetaRow {
    /// An empty record for a key.
    pub fn new(purl: impl Into<String>) -> Self {
        Self {
            purl: purl.into(),
            ..Default::default()
        }
    }

    pub fn fetch_status(&self) -> Option<FetchStatus> {
        parse_status(self.status.as_deref())
    }

    pub fn set_fetch_status(&mut self, status: FetchStatus) {
        self.status = Some(status.as_str().to_string());
    }

    pub fn record_state(&self) -> RecordState {
        RecordState {
            status: self.fetch_status(),
            last_fetch: self.last_fetch,
        }
    }
}

// =============================================================================
// Integrity records
// =============================================================================

/// Fetched content hashes for one package version.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct IntegrityMetaRow {
    pub purl: String,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
    pub published_at: Option<OffsetDateTime>,
    pub repository_url: Option<String>,
    pub last_fetch: Option<OffsetDateTime>,
    /// `FetchStatus` text form; NULL when unknown.
    pub status: Option<String>,
}

impl IntegrityMetaRow {
    /// An empty record for a key.
    pub fn new(purl: impl Into<String>) -> Self {
        Self {
            purl: purl.into(),
            ..Default::default()
        }
    }

    pub fn fetch_status(&self) -> Option<FetchStatus> {
        parse_status(self.status.as_deref())
    }

    pub fn set_fetch_status(&mut self, status: FetchStatus) {
        self.status = Some(status.as_str().to_string());
    }

    pub fn record_state(&self) -> RecordState {
        RecordState {
            status: self.fetch_status(),
            last_fetch: self.last_fetch,
        }
    }

    pub fn hashes(&self) -> pkgmeta_core::Hashes {
        pkgmeta_core::Hashes {
            md5: self.md5.clone(),
            sha1: self.sha1.clone(),
            sha256: self.sha256.clone(),
            sha512: self.sha512.clone(),
        }
    }
}

// =============================================================================
// Repository (latest version) records
// =============================================================================

/// Latest-version information, keyed by (ecosystem, namespace, name).
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RepositoryMetaRow {
    /// `RepositoryType` text form.
    pub repository_type: String,
    /// Empty when the package has no namespace.
    pub namespace: String,
    pub name: String,
    pub latest_version: Option<String>,
    pub published: Option<OffsetDateTime>,
    /// Producer timestamp of the result last merged.
    pub last_check: OffsetDateTime,
}

// =============================================================================
// Tracked components
// =============================================================================

/// A component whose metadata is tracked.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ComponentRow {
    pub uuid: Uuid,
    /// Canonical coordinate.
    pub purl: String,
    /// Canonical coordinate without qualifiers and subpath.
    pub purl_coordinates: String,
    pub repository_type: String,
    /// Empty when the package has no namespace.
    pub namespace: String,
    pub name: String,
    pub internal: bool,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
    pub created_at: OffsetDateTime,
}

impl ComponentRow {
    pub fn hashes(&self) -> pkgmeta_core::Hashes {
        pkgmeta_core::Hashes {
            md5: self.md5.clone(),
            sha1: self.sha1.clone(),
            sha256: self.sha256.clone(),
            sha512: self.sha512.clone(),
        }
    }
}

// =============================================================================
// Integrity analysis
// =============================================================================

/// Result of the last integrity match for a component.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IntegrityAnalysisRow {
    pub component_uuid: Uuid,
    pub integrity_check_status: String,
    pub md5_status: String,
    pub sha1_status: String,
    pub sha256_status: String,
    pub sha512_status: String,
    pub updated_at: OffsetDateTime,
}

impl IntegrityAnalysisRow {
    pub fn from_match(component_uuid: Uuid, m: &IntegrityMatch, now: OffsetDateTime) -> Self {
        Self {
            component_uuid,
            integrity_check_status: m.overall.as_str().to_string(),
            md5_status: m.md5.as_str().to_string(),
            sha1_status: m.sha1.as_str().to_string(),
            sha256_status: m.sha256.as_str().to_string(),
            sha512_status: m.sha512.as_str().to_string(),
            updated_at: now,
        }
    }
}

fn parse_status(status: Option<&str>) -> Option<FetchStatus> {
    let raw = status?;
    match FetchStatus::parse(raw) {
        Ok(status) => Some(status),
        Err(_) => {
            tracing::warn!(status = raw, "Unknown fetch status in store; treating as missing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_reads_as_missing() {
        let mut row = HealthMetaRow::new("pkg:npm/left-pad");
        assert_eq!(row.fetch_status(), None);

        row.status = Some("BOGUS".to_string());
        assert_eq!(row.fetch_status(), None);

        row.set_fetch_status(FetchStatus::Processed);
        assert_eq!(row.status.as_deref(), Some("PROCESSED"));
        assert_eq!(row.record_state().status, Some(FetchStatus::Processed));
    }
}
