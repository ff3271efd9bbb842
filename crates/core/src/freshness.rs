//! Staleness policy for coordinated metadata fetches.

use crate::coordinate::PackageCoordinate;
use crate::kind::{FetchStatus, MetadataKind};
use std::collections::BTreeSet;
use std::fmt;
use time::{Duration, OffsetDateTime};

/// Default staleness window for integrity records.
pub const DEFAULT_INTEGRITY_WINDOW: Duration = Duration::hours(1);

/// Default staleness window for health records.
pub const DEFAULT_HEALTH_WINDOW: Duration = Duration::days(10);

/// Package types integrity metadata can be fetched for by default.
pub const DEFAULT_INTEGRITY_TYPES: &[&str] = &["maven", "npm", "pypi"];

/// Package types health metadata can be fetched for by default.
pub const DEFAULT_HEALTH_TYPES: &[&str] =
    &["npm", "golang", "maven", "pypi", "nuget", "cargo", "gem"];

/// The parts of a stored record the policy looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordState {
    pub status: Option<FetchStatus>,
    pub last_fetch: Option<OffsetDateTime>,
}

/// Why a fetch is (re)triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerReason {
    /// No record exists yet.
    FirstFetch,
    /// The record was settled longer ago than the window.
    Stale,
    /// The record has no status.
    NoStatus,
    /// A fetch was started but no result arrived within the window.
    StalledFetch,
    /// The record has no last-fetch timestamp.
    UnknownAge,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFetch => "first_fetch",
            Self::Stale => "stale",
            Self::NoStatus => "no_status",
            Self::StalledFetch => "stalled_fetch",
            Self::UnknownAge => "unknown_age",
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a freshness decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreshnessDecision {
    Trigger(TriggerReason),
    NoOp,
}

impl FreshnessDecision {
    pub fn should_trigger(&self) -> bool {
        matches!(self, Self::Trigger(_))
    }
}

/// Immutable per-kind staleness windows and supported package types.
#[derive(Clone, Debug)]
pub struct FreshnessPolicy {
    integrity_window: Duration,
    health_window: Duration,
    integrity_types: BTreeSet<String>,
    health_types: BTreeSet<String>,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INTEGRITY_WINDOW, DEFAULT_HEALTH_WINDOW)
    }
}

impl FreshnessPolicy {
    /// Create a policy with the given windows and the default allow-lists.
    pub fn new(integrity_window: Duration, health_window: Duration) -> Self {
        Self {
            integrity_window,
            health_window,
            integrity_types: to_set(DEFAULT_INTEGRITY_TYPES.iter().copied()),
            health_types: to_set(DEFAULT_HEALTH_TYPES.iter().copied()),
        }
    }

    /// Replace the supported package types of a kind.
    pub fn with_supported_types<I, S>(mut self, kind: MetadataKind, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = types
            .into_iter()
            .map(|t| t.as_ref().to_ascii_lowercase())
            .collect();
        match kind {
            MetadataKind::Integrity => self.integrity_types = set,
            MetadataKind::Health => self.health_types = set,
        }
        self
    }

    /// Staleness window of a kind.
    pub fn window(&self, kind: MetadataKind) -> Duration {
        match kind {
            MetadataKind::Integrity => self.integrity_window,
            MetadataKind::Health => self.health_window,
        }
    }

    /// Whether metadata of `kind` can be fetched for this coordinate.
    pub fn supports(&self, kind: MetadataKind, coordinate: &PackageCoordinate) -> bool {
        let types = match kind {
            MetadataKind::Integrity => &self.integrity_types,
            MetadataKind::Health => &self.health_types,
        };
        types.contains(coordinate.ty())
    }

    /// Decide whether a fetch should be triggered for a record.
    pub fn decide(
        &self,
        kind: MetadataKind,
        record: Option<RecordState>,
        now: OffsetDateTime,
    ) -> FreshnessDecision {
        let Some(record) = record else {
            return FreshnessDecision::Trigger(TriggerReason::FirstFetch);
        };
        let Some(status) = record.status else {
            return FreshnessDecision::Trigger(TriggerReason::NoStatus);
        };
        let Some(last_fetch) = record.last_fetch else {
            return FreshnessDecision::Trigger(TriggerReason::UnknownAge);
        };

        if now - last_fetch <= self.window(kind) {
            return FreshnessDecision::NoOp;
        }
        match status {
            FetchStatus::Processed | FetchStatus::NotAvailable => {
                FreshnessDecision::Trigger(TriggerReason::Stale)
            }
            FetchStatus::InProgress => FreshnessDecision::Trigger(TriggerReason::StalledFetch),
        }
    }
}

fn to_set<'a>(types: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    types.map(str::to_string).collect()
}
