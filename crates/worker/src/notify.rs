//! Downstream component signals.
//!
//! After a health or integrity merge the synchronizer asks dependent
//! computations to re-run for the owning component. Signals are emitted
//! after the store write committed, at least once; receivers must treat a
//! repeated signal as a no-op.

use crate::dispatch::JsonlOutbox;
use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use pkgmeta_core::config::OutboundConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Signal sent to a downstream collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentSignal {
    /// Re-evaluate policies for the component.
    PolicyEvaluationRequested {
        #[serde(rename = "componentUuid")]
        component_uuid: Uuid,
    },
    /// Recompute risk metrics for the component.
    MetricsUpdateRequested {
        #[serde(rename = "componentUuid")]
        component_uuid: Uuid,
    },
}

impl ComponentSignal {
    pub fn component_uuid(&self) -> Uuid {
        match self {
            Self::PolicyEvaluationRequested { component_uuid }
            | Self::MetricsUpdateRequested { component_uuid } => *component_uuid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyEvaluationRequested { .. } => "policy_evaluation_requested",
            Self::MetricsUpdateRequested { .. } => "metrics_update_requested",
        }
    }
}

impl fmt::Display for ComponentSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.component_uuid())
    }
}

/// Sink for downstream component signals.
#[async_trait]
pub trait DownstreamNotifier: Send + Sync {
    async fn notify(&self, signal: ComponentSignal) -> WorkerResult<()>;
}

/// Notifier that only logs signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl DownstreamNotifier for LogNotifier {
    async fn notify(&self, signal: ComponentSignal) -> WorkerResult<()> {
        tracing::info!(
            signal = signal.as_str(),
            component_uuid = %signal.component_uuid(),
            "Downstream signal"
        );
        Ok(())
    }
}

/// Notifier writing each signal to an outbox file.
#[derive(Debug)]
pub struct OutboxNotifier {
    outbox: JsonlOutbox,
}

impl OutboxNotifier {
    pub async fn open(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let outbox = JsonlOutbox::open(path).await?;
        tracing::info!(path = %outbox.path().display(), "Downstream signal outbox opened");
        Ok(Self { outbox })
    }
}

#[async_trait]
impl DownstreamNotifier for OutboxNotifier {
    async fn notify(&self, signal: ComponentSignal) -> WorkerResult<()> {
        self.outbox.append(&signal).await
    }
}

/// In-memory notifier for tests.
///
/// Like the in-memory dispatcher it can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    signals: RwLock<Vec<ComponentSignal>>,
    fail: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following signal fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Signals received so far, oldest first.
    pub fn signals(&self) -> Vec<ComponentSignal> {
        self.signals.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Signals received so far for one component.
    pub fn signals_for(&self, component_uuid: Uuid) -> Vec<ComponentSignal> {
        self.signals()
            .into_iter()
            .filter(|s| s.component_uuid() == component_uuid)
            .collect()
    }
}

#[async_trait]
impl DownstreamNotifier for InMemoryNotifier {
    async fn notify(&self, signal: ComponentSignal) -> WorkerResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkerError::Notify(format!("notifier unavailable for {signal}")));
        }
        self.signals
            .write()
            .map_err(|_: PoisonError<_>| WorkerError::Notify("notifier lock poisoned".to_string()))?
            .push(signal);
        Ok(())
    }
}

/// Create a notifier from configuration.
pub async fn from_config(config: &OutboundConfig) -> WorkerResult<Arc<dyn DownstreamNotifier>> {
    match config {
        OutboundConfig::Log => Ok(Arc::new(LogNotifier) as Arc<dyn DownstreamNotifier>),
        OutboundConfig::Outbox { path } => {
            let notifier = OutboxNotifier::open(path).await?;
            Ok(Arc::new(notifier) as Arc<dyn DownstreamNotifier>)
        }
    }
}
