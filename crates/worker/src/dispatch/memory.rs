//! In-memory dispatcher for testing.
//!
//! Records every trigger it accepts. It can be switched into a failing mode
//! to exercise the path where the in-progress marker is persisted but the
//! trigger never leaves the process.

use super::FetchDispatcher;
use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use pkgmeta_core::FetchTrigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// In-memory fetch dispatcher.
#[derive(Debug, Default)]
pub struct InMemoryDispatcher {
    triggers: RwLock<Vec<FetchTrigger>>,
    fail: AtomicBool,
}

fn poison_err<T>(_: PoisonError<T>) -> WorkerError {
    WorkerError::Dispatch("dispatcher lock poisoned".to_string())
}

impl InMemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following dispatch fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Triggers accepted so far, oldest first.
    pub fn triggers(&self) -> Vec<FetchTrigger> {
        self.triggers
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Number of triggers accepted so far.
    pub fn len(&self) -> usize {
        self.triggers.read().map(|t| t.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FetchDispatcher for InMemoryDispatcher {
    async fn dispatch(&self, trigger: FetchTrigger) -> WorkerResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkerError::Dispatch(format!(
                "dispatcher unavailable for {}",
                trigger.purl
            )));
        }
        self.triggers.write().map_err(poison_err)?.push(trigger);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgmeta_core::MetadataKind;
    use time::OffsetDateTime;

    fn trigger(purl: &str) -> FetchTrigger {
        FetchTrigger {
            component_uuid: None,
            purl: purl.to_string(),
            internal: false,
            requested: MetadataKind::Health.requested(),
            triggered_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_records_triggers_in_order() {
        let dispatcher = InMemoryDispatcher::new();
        dispatcher.dispatch(trigger("pkg:npm/a")).await.unwrap();
        dispatcher.dispatch(trigger("pkg:npm/b")).await.unwrap();

        let purls: Vec<_> = dispatcher.triggers().into_iter().map(|t| t.purl).collect();
        assert_eq!(purls, vec!["pkg:npm/a", "pkg:npm/b"]);
    }

    #[tokio::test]
    async fn test_failing_mode_rejects_without_recording() {
        let dispatcher = InMemoryDispatcher::new();
        dispatcher.set_failing(true);
        assert!(dispatcher.dispatch(trigger("pkg:npm/a")).await.is_err());
        assert!(dispatcher.is_empty());

        dispatcher.set_failing(false);
        dispatcher.dispatch(trigger("pkg:npm/a")).await.unwrap();
        assert_eq!(dispatcher.len(), 1);
    }
}
