//! Result synchronizer.
//!
//! Merges fetch result messages into the store. A message carries up to
//! three independent sections (latest version, integrity, health); each is
//! merged into its own record under the bounded retry combinator, so a
//! redelivered message converges to the same stored state.
//!
//! Downstream signals are emitted after the merges committed, when a health
//! or integrity record changed or when the stored integrity record is the one
//! this message settled earlier. A failing notifier fails the message, and
//! the redelivered message signals again.

mod health;
mod integrity;
mod repository;

use crate::error::{WorkerError, WorkerResult};
use crate::integrity_check;
use crate::merge::integrity_settled_by;
use crate::metrics;
use crate::notify::ComponentSignal;
use crate::state::AppState;
use pkgmeta_core::{PackageCoordinate, ResultMessage};
use pkgmeta_metadata::models::ComponentRow;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Fatal synchronization error. The message should be redelivered.
pub type SyncError = WorkerError;

/// Why a section was dropped without touching the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// The stored record was checked at or after the producer timestamp.
    OutOfOrder,
    /// The integrity record has already been processed.
    AlreadyProcessed,
    /// The package type maps to no known repository ecosystem.
    UnsupportedRepository,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfOrder => "out_of_order",
            Self::AlreadyProcessed => "already_processed",
            Self::UnsupportedRepository => "unsupported_repository",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to one section of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// The message did not carry the section.
    Absent,
    Created,
    Updated,
    Discarded(DiscardReason),
}

impl PayloadOutcome {
    /// Whether the section was written to the store.
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }
}

/// Result of synchronizing one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncReport {
    /// The message carried no usable package identity and was dropped.
    Rejected(String),
    Applied {
        repository: PayloadOutcome,
        integrity: PayloadOutcome,
        health: PayloadOutcome,
        /// Number of downstream signals emitted.
        signalled: usize,
    },
}

/// Merges result messages into the store.
pub struct ResultSynchronizer<'a> {
    state: &'a AppState,
}

impl<'a> ResultSynchronizer<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Synchronize one message.
    pub async fn synchronize(&self, message: &ResultMessage) -> Result<SyncReport, SyncError> {
        self.synchronize_at(message, OffsetDateTime::now_utc()).await
    }

    /// Synchronize one message, stamping records with `now`.
    pub async fn synchronize_at(
        &self,
        message: &ResultMessage,
        now: OffsetDateTime,
    ) -> Result<SyncReport, SyncError> {
        let coordinate = match message.result.coordinate() {
            Ok(coordinate) => coordinate,
            Err(e) => {
                metrics::RESULTS_REJECTED.inc();
                tracing::warn!(error = %e, "Discarding result without a valid package identity");
                return Ok(SyncReport::Rejected(e.to_string()));
            }
        };

        match self.apply(message, &coordinate, now).await {
            Ok(report) => {
                metrics::RESULTS_PROCESSED.inc();
                Ok(report)
            }
            Err(e) => {
                metrics::RESULTS_FAILED.inc();
                tracing::error!(purl = %coordinate, error = %e, "Failed to synchronize result");
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        message: &ResultMessage,
        coordinate: &PackageCoordinate,
        now: OffsetDateTime,
    ) -> WorkerResult<SyncReport> {
        let result = &message.result;
        let component_uuid = result.component_uuid();

        let repository = if result.has_version() {
            repository::merge(self.state, coordinate, result, message.produced_at).await?
        } else {
            PayloadOutcome::Absent
        };

        // A redelivery finds its own integrity result already processed; it
        // still owes the signals the failed delivery never sent.
        let (integrity, integrity_settled) = match &result.integrity_meta {
            Some(meta) => {
                let (outcome, record) = integrity::merge(self.state, coordinate, meta, now).await?;
                if self.state.config.sync.integrity_check_enabled {
                    let components =
                        integrity_components(self.state, coordinate, component_uuid).await?;
                    integrity_check::check_components(self.state, &components, &record, now)
                        .await?;
                }
                let settled = outcome.is_merged() || integrity_settled_by(&record, meta);
                (outcome, settled)
            }
            None => (PayloadOutcome::Absent, false),
        };

        let health = match &result.health_meta {
            Some(meta) => health::merge(self.state, coordinate, meta, now).await?,
            None => PayloadOutcome::Absent,
        };

        let signalled = if integrity_settled || health.is_merged() {
            let owners = owning_components(self.state, coordinate, component_uuid).await?;
            self.signal(&owners).await?
        } else {
            0
        };

        tracing::info!(
            purl = %coordinate,
            repository = ?repository,
            integrity = ?integrity,
            health = ?health,
            signalled = signalled,
            "Result synchronized"
        );

        Ok(SyncReport::Applied {
            repository,
            integrity,
            health,
            signalled,
        })
    }

    async fn signal(&self, owners: &[Uuid]) -> WorkerResult<usize> {
        let mut emitted = 0;
        for &component_uuid in owners {
            for signal in [
                ComponentSignal::PolicyEvaluationRequested { component_uuid },
                ComponentSignal::MetricsUpdateRequested { component_uuid },
            ] {
                if let Err(e) = self.state.notifier.notify(signal).await {
                    tracing::warn!(
                        component_uuid = %component_uuid,
                        signal = signal.as_str(),
                        error = %e,
                        "Failed to emit downstream signal"
                    );
                    return Err(e);
                }
                metrics::record_signal(signal.as_str());
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}

/// Components to signal: the one named by the message, else every tracked
/// component sharing the coordinates.
async fn owning_components(
    state: &AppState,
    coordinate: &PackageCoordinate,
    component_uuid: Option<Uuid>,
) -> WorkerResult<Vec<Uuid>> {
    if let Some(uuid) = component_uuid {
        return Ok(vec![uuid]);
    }
    let components = state
        .metadata
        .list_components_by_coordinates(&coordinate.coordinates())
        .await?;
    Ok(components.into_iter().map(|c| c.uuid).collect())
}

/// Tracked components whose hashes are matched against an integrity record:
/// the one named by the message, else those with the same canonical purl.
async fn integrity_components(
    state: &AppState,
    coordinate: &PackageCoordinate,
    component_uuid: Option<Uuid>,
) -> WorkerResult<Vec<ComponentRow>> {
    if let Some(uuid) = component_uuid {
        return Ok(state.metadata.get_component(uuid).await?.into_iter().collect());
    }
    let canonical = coordinate.canonical();
    let components = state
        .metadata
        .list_components_by_coordinates(&coordinate.coordinates())
        .await?;
    Ok(components
        .into_iter()
        .filter(|c| c.purl == canonical)
        .collect())
}

fn record_discard(section: &str, purl: &str, reason: DiscardReason) {
    metrics::record_discard(section, reason.as_str());
    tracing::debug!(section = section, purl = %purl, reason = %reason, "Result section discarded");
}
