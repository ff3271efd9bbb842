//! Fetch-result and fetch-trigger messages exchanged with the fetch workers.
//!
//! Every payload field is optional: an absent field means "not reported",
//! never zero or false. The merge logic depends on that distinction.

use crate::coordinate::PackageCoordinate;
use crate::kind::RequestedMetadata;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A fetch result as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    /// When the fetch worker produced this result.
    #[serde(with = "time::serde::rfc3339")]
    pub produced_at: OffsetDateTime,
    pub result: AnalysisResult,
}

impl ResultMessage {
    /// Parse a message from JSON.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Serialize the message to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

/// The sections of a fetch result. Any subset may be present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub published: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_meta: Option<IntegrityMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_meta: Option<HealthMeta>,
}

impl AnalysisResult {
    /// Resolve the package identity of this result.
    pub fn coordinate(&self) -> crate::Result<PackageCoordinate> {
        let component = self.component.as_ref().ok_or_else(|| {
            crate::Error::InvalidCoordinate("result carries no component".to_string())
        })?;
        let purl = component.purl.as_deref().ok_or_else(|| {
            crate::Error::InvalidCoordinate("component carries no purl".to_string())
        })?;
        PackageCoordinate::parse(purl)
    }

    /// UUID of the component the fetch was triggered for, if known.
    pub fn component_uuid(&self) -> Option<Uuid> {
        self.component.as_ref().and_then(|c| c.uuid)
    }

    /// Whether the version section is present.
    ///
    /// The section is keyed on the latest version; a lone publish date is
    /// not merged.
    pub fn has_version(&self) -> bool {
        self.latest_version.is_some()
    }
}

/// Identity of the component a result belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

/// Integrity section of a fetch result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_source_url: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_version_last_modified: Option<OffsetDateTime>,
}

impl IntegrityMeta {
    /// Whether the section reports any data at all.
    pub fn has_data(&self) -> bool {
        self.md5.is_some()
            || self.sha1.is_some()
            || self.sha256.is_some()
            || self.sha512.is_some()
            || self.current_version_last_modified.is_some()
    }
}

/// Health section of a fetch result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_frequency_weekly: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_issues: Option<i32>,
    #[serde(default, rename = "openPRs", skip_serializing_if = "Option::is_none")]
    pub open_prs: Option<i32>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_commit_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_factor: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_readme: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_code_of_conduct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_security_policy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependents: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_repo_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_card_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_card_reference_version: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub score_card_timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_issue_age_days: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub score_card_checks: Vec<ScoreCardCheck>,
}

/// One named OpenSSF Scorecard check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCardCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
}

/// A request for the fetch workers to fetch metadata for a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_uuid: Option<Uuid>,
    pub purl: String,
    /// Internal components are resolved against internal repositories only.
    pub internal: bool,
    pub requested: Vec<RequestedMetadata>,
    #[serde(with = "time::serde::rfc3339")]
    pub triggered_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_parse_sparse_message() {
        let raw = r#"{
            "producedAt": "2024-05-01T10:00:00Z",
            "result": {
                "component": { "purl": "pkg:npm/left-pad@1.3.0" },
                "healthMeta": { "stars": 10, "openPRs": 2, "hasReadme": false }
            }
        }"#;
        let msg = ResultMessage::from_json(raw).unwrap();
        assert_eq!(msg.produced_at, datetime!(2024-05-01 10:00 UTC));
        let health = msg.result.health_meta.as_ref().unwrap();
        assert_eq!(health.stars, Some(10));
        assert_eq!(health.open_prs, Some(2));
        assert_eq!(health.has_readme, Some(false));
        assert_eq!(health.forks, None);
        assert!(health.score_card_checks.is_empty());
        assert!(msg.result.integrity_meta.is_none());
        assert!(!msg.result.has_version());
    }

    #[test]
    fn test_coordinate_requires_component_and_purl() {
        let mut result = AnalysisResult::default();
        assert!(result.coordinate().is_err());

        result.component = Some(ComponentRef::default());
        assert!(result.coordinate().is_err());

        result.component = Some(ComponentRef {
            purl: Some("not a purl".to_string()),
            uuid: None,
        });
        assert!(result.coordinate().is_err());

        result.component = Some(ComponentRef {
            purl: Some("pkg:maven/foo/bar@1.0".to_string()),
            uuid: None,
        });
        assert_eq!(result.coordinate().unwrap().name(), "bar");
    }

    #[test]
    fn test_integrity_has_data() {
        let mut meta = IntegrityMeta {
            meta_source_url: Some("https://repo.example".to_string()),
            ..Default::default()
        };
        assert!(!meta.has_data());
        meta.current_version_last_modified = Some(datetime!(2024-01-01 0:00 UTC));
        assert!(meta.has_data());
    }

    #[test]
    fn test_fetch_trigger_wire_form() {
        let trigger = FetchTrigger {
            component_uuid: None,
            purl: "pkg:npm/left-pad@1.3.0".to_string(),
            internal: false,
            requested: vec![RequestedMetadata::Health],
            triggered_at: datetime!(2024-05-01 10:00 UTC),
        };
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["requested"][0], "HEALTH");
        assert_eq!(json["triggeredAt"], "2024-05-01T10:00:00Z");
        assert!(json.get("componentUuid").is_none());
    }
}
