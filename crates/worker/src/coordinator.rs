//! Fetch coordinator.
//!
//! Decides per package and metadata kind whether a fetch must be
//! (re)triggered, persists the in-progress marker and hands the trigger
//! to the dispatcher. One variant exists per coordinated kind, plus an
//! unsupported variant for package types outside a kind's allow-list that
//! never touches the store or the dispatcher.

use crate::error::WorkerResult;
use crate::metrics;
use crate::state::AppState;
use async_trait::async_trait;
use pkgmeta_core::{
    FetchStatus, FetchTrigger, FreshnessDecision, FreshnessPolicy, MetadataKind,
    PackageCoordinate, RecordState, TriggerReason,
};
use pkgmeta_metadata::models::{ComponentRow, HealthMetaRow, IntegrityMetaRow};
use pkgmeta_metadata::{MetadataError, MetadataResult, MetadataStore, RecordWrite};
use time::OffsetDateTime;
use uuid::Uuid;

/// The view of a component the coordinator needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentProjection {
    pub uuid: Option<Uuid>,
    pub coordinate: PackageCoordinate,
    pub internal: bool,
}

impl ComponentProjection {
    pub fn new(coordinate: PackageCoordinate) -> Self {
        Self {
            uuid: None,
            coordinate,
            internal: false,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Project a tracked component.
    pub fn from_component(component: &ComponentRow) -> WorkerResult<Self> {
        let coordinate = PackageCoordinate::parse(&component.purl)?;
        Ok(Self::new(coordinate)
            .with_uuid(component.uuid)
            .with_internal(component.internal))
    }
}

/// What an evaluation returned.
#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationOutcome {
    /// The health record after evaluation (new, updated or unchanged).
    Health(HealthMetaRow),
    /// The integrity record after evaluation (new, updated or unchanged).
    Integrity(IntegrityMetaRow),
    /// The package type is not fetchable for this kind.
    Unsupported(MetadataKind),
}

impl EvaluationOutcome {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Status and age of the returned record, if any.
    pub fn record_state(&self) -> Option<RecordState> {
        match self {
            Self::Health(row) => Some(row.record_state()),
            Self::Integrity(row) => Some(row.record_state()),
            Self::Unsupported(_) => None,
        }
    }
}

/// Coordinator variant for one (kind, package type) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchCoordinator {
    Health,
    Integrity,
    Unsupported(MetadataKind),
}

impl FetchCoordinator {
    /// Select the variant for a kind from the policy's allow-list.
    pub fn select(
        kind: MetadataKind,
        coordinate: &PackageCoordinate,
        policy: &FreshnessPolicy,
    ) -> Self {
        if !policy.supports(kind, coordinate) {
            return Self::Unsupported(kind);
        }
        match kind {
            MetadataKind::Health => Self::Health,
            MetadataKind::Integrity => Self::Integrity,
        }
    }

    pub fn kind(&self) -> MetadataKind {
        match self {
            Self::Health => MetadataKind::Health,
            Self::Integrity => MetadataKind::Integrity,
            Self::Unsupported(kind) => *kind,
        }
    }

    /// Evaluate a component and trigger a fetch if the policy asks for one.
    ///
    /// A dispatch failure after the marker was persisted is logged and
    /// swallowed; the record stays in progress and is re-triggered as a
    /// stalled fetch once the staleness window elapses.
    pub async fn evaluate(
        &self,
        state: &AppState,
        component: &ComponentProjection,
        now: OffsetDateTime,
    ) -> WorkerResult<EvaluationOutcome> {
        match self {
            Self::Health => {
                let key = component.coordinate.coordinates();
                let row =
                    evaluate_record::<HealthMetaRow>(state, component, &key, self.kind(), now)
                        .await?;
                Ok(EvaluationOutcome::Health(row))
            }
            Self::Integrity => {
                let key = component.coordinate.canonical();
                let row =
                    evaluate_record::<IntegrityMetaRow>(state, component, &key, self.kind(), now)
                        .await?;
                Ok(EvaluationOutcome::Integrity(row))
            }
            Self::Unsupported(kind) => {
                metrics::EVALUATIONS_UNSUPPORTED
                    .with_label_values(&[kind.as_str()])
                    .inc();
                tracing::debug!(
                    purl = %component.coordinate,
                    kind = %kind,
                    "Package type not supported for this metadata kind"
                );
                Ok(EvaluationOutcome::Unsupported(*kind))
            }
        }
    }
}

/// A record carrying a fetch status and a last-fetch time.
#[async_trait]
trait CoordinatedRecord: Clone + Send + Sync + Sized {
    fn empty(key: &str) -> Self;
    fn state(&self) -> RecordState;
    fn mark_in_progress(&mut self, now: OffsetDateTime);
    async fn modify(
        store: &dyn MetadataStore,
        key: &str,
        edit: &mut (dyn for<'a> FnMut(Option<&'a Self>) -> Option<Self> + Send),
    ) -> MetadataResult<RecordWrite>;
}

#[async_trait]
impl CoordinatedRecord for HealthMetaRow {
    fn empty(key: &str) -> Self {
        Self::new(key)
    }

    fn state(&self) -> RecordState {
        self.record_state()
    }

    fn mark_in_progress(&mut self, now: OffsetDateTime) {
        self.set_fetch_status(FetchStatus::InProgress);
        self.last_fetch = Some(now);
    }

    async fn modify(
        store: &dyn MetadataStore,
        key: &str,
        edit: &mut (dyn for<'a> FnMut(Option<&'a Self>) -> Option<Self> + Send),
    ) -> MetadataResult<RecordWrite> {
        store.modify_health_meta(key, edit).await
    }
}

#[async_trait]
impl CoordinatedRecord for IntegrityMetaRow {
    fn empty(key: &str) -> Self {
        Self::new(key)
    }

    fn state(&self) -> RecordState {
        self.record_state()
    }

    fn mark_in_progress(&mut self, now: OffsetDateTime) {
        self.set_fetch_status(FetchStatus::InProgress);
        self.last_fetch = Some(now);
    }

    async fn modify(
        store: &dyn MetadataStore,
        key: &str,
        edit: &mut (dyn for<'a> FnMut(Option<&'a Self>) -> Option<Self> + Send),
    ) -> MetadataResult<RecordWrite> {
        store.modify_integrity_meta(key, edit).await
    }
}

async fn evaluate_record<R: CoordinatedRecord>(
    state: &AppState,
    component: &ComponentProjection,
    key: &str,
    kind: MetadataKind,
    now: OffsetDateTime,
) -> WorkerResult<R> {
    let store = state.metadata.as_ref();
    let policy = state.policy.as_ref();

    // Decide and mark under the record lock: of several concurrent evaluations
    // of a stale record, only the first sees it stale. A lost first-insert race
    // re-reads the winner's marker and decides again.
    let (row, reason) = state
        .run_with_retry(|_| async move {
            let mut decided: Option<(R, Option<TriggerReason>)> = None;
            let mut edit = |current: Option<&R>| {
                let decision = policy.decide(kind, current.map(R::state), now);
                let (mut row, reason) = match (current, decision) {
                    (Some(row), FreshnessDecision::NoOp) => {
                        decided = Some((row.clone(), None));
                        return None;
                    }
                    (Some(row), FreshnessDecision::Trigger(reason)) => (row.clone(), reason),
                    (None, FreshnessDecision::Trigger(reason)) => (R::empty(key), reason),
                    (None, FreshnessDecision::NoOp) => (R::empty(key), TriggerReason::FirstFetch),
                };
                row.mark_in_progress(now);
                decided = Some((row.clone(), Some(reason)));
                Some(row)
            };
            R::modify(store, key, &mut edit).await?;
            decided.ok_or_else(|| {
                MetadataError::Internal(format!("no freshness decision recorded for {key}"))
            })
        })
        .await?;

    let Some(reason) = reason else {
        tracing::debug!(purl = %key, kind = %kind, "Metadata is fresh, no fetch needed");
        return Ok(row);
    };

    let trigger = FetchTrigger {
        component_uuid: component.uuid,
        purl: component.coordinate.canonical(),
        internal: component.internal,
        requested: kind.requested(),
        triggered_at: now,
    };
    match state.dispatcher.dispatch(trigger).await {
        Ok(()) => {
            metrics::TRIGGERS_DISPATCHED
                .with_label_values(&[kind.as_str(), reason.as_str()])
                .inc();
            tracing::info!(purl = %key, kind = %kind, reason = %reason, "Fetch triggered");
        }
        Err(e) => {
            metrics::DISPATCH_FAILURES
                .with_label_values(&[kind.as_str()])
                .inc();
            tracing::warn!(
                purl = %key,
                kind = %kind,
                reason = %reason,
                error = %e,
                "Fetch trigger not dispatched; record stays in progress until it goes stale"
            );
        }
    }

    Ok(row)
}
