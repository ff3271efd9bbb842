//! Integrity matching between a tracked component and its fetched hashes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing one hash algorithm, or of the whole comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityMatchStatus {
    HashMatchPassed,
    HashMatchFailed,
    HashMatchUnknown,
    ComponentMissingHash,
    ComponentMissingHashAndMatchUnknown,
}

impl IntegrityMatchStatus {
    /// Get the stored text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashMatchPassed => "HASH_MATCH_PASSED",
            Self::HashMatchFailed => "HASH_MATCH_FAILED",
            Self::HashMatchUnknown => "HASH_MATCH_UNKNOWN",
            Self::ComponentMissingHash => "COMPONENT_MISSING_HASH",
            Self::ComponentMissingHashAndMatchUnknown => {
                "COMPONENT_MISSING_HASH_AND_MATCH_UNKNOWN"
            }
        }
    }

    /// Parse from the stored text form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "HASH_MATCH_PASSED" => Ok(Self::HashMatchPassed),
            "HASH_MATCH_FAILED" => Ok(Self::HashMatchFailed),
            "HASH_MATCH_UNKNOWN" => Ok(Self::HashMatchUnknown),
            "COMPONENT_MISSING_HASH" => Ok(Self::ComponentMissingHash),
            "COMPONENT_MISSING_HASH_AND_MATCH_UNKNOWN" => {
                Ok(Self::ComponentMissingHashAndMatchUnknown)
            }
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }

    /// Lower rank wins when folding per-algorithm results.
    fn rank(&self) -> u8 {
        match self {
            Self::HashMatchFailed => 0,
            Self::HashMatchPassed => 1,
            Self::HashMatchUnknown => 2,
            Self::ComponentMissingHash => 3,
            Self::ComponentMissingHashAndMatchUnknown => 4,
        }
    }
}

impl fmt::Display for IntegrityMatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The hash set of one side of the comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hashes {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
}

/// Per-algorithm and overall match outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrityMatch {
    pub md5: IntegrityMatchStatus,
    pub sha1: IntegrityMatchStatus,
    pub sha256: IntegrityMatchStatus,
    pub sha512: IntegrityMatchStatus,
    pub overall: IntegrityMatchStatus,
}

/// Compare the hashes a component declares against the fetched ones.
pub fn compute_integrity_match(component: &Hashes, fetched: &Hashes) -> IntegrityMatch {
    let md5 = match_hash(component.md5.as_deref(), fetched.md5.as_deref());
    let sha1 = match_hash(component.sha1.as_deref(), fetched.sha1.as_deref());
    let sha256 = match_hash(component.sha256.as_deref(), fetched.sha256.as_deref());
    let sha512 = match_hash(component.sha512.as_deref(), fetched.sha512.as_deref());

    let overall = [md5, sha1, sha256, sha512]
        .into_iter()
        .min_by_key(IntegrityMatchStatus::rank)
        .unwrap_or(IntegrityMatchStatus::ComponentMissingHashAndMatchUnknown);

    IntegrityMatch {
        md5,
        sha1,
        sha256,
        sha512,
        overall,
    }
}

fn match_hash(component: Option<&str>, fetched: Option<&str>) -> IntegrityMatchStatus {
    let component = component.map(str::trim).filter(|h| !h.is_empty());
    let fetched = fetched.map(str::trim).filter(|h| !h.is_empty());
    match (component, fetched) {
        (Some(c), Some(f)) if c.eq_ignore_ascii_case(f) => IntegrityMatchStatus::HashMatchPassed,
        (Some(_), Some(_)) => IntegrityMatchStatus::HashMatchFailed,
        (Some(_), None) => IntegrityMatchStatus::HashMatchUnknown,
        (None, Some(_)) => IntegrityMatchStatus::ComponentMissingHash,
        (None, None) => IntegrityMatchStatus::ComponentMissingHashAndMatchUnknown,
    }
}
