//! Worker state shared by the coordinator, the synchronizer and the
//! operational endpoints.

use crate::dispatch::FetchDispatcher;
use crate::error::WorkerResult;
use crate::notify::DownstreamNotifier;
use pkgmeta_core::FreshnessPolicy;
use pkgmeta_core::config::AppConfig;
use pkgmeta_metadata::{MetadataError, MetadataResult, MetadataStore};
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Fetch trigger sink.
    pub dispatcher: Arc<dyn FetchDispatcher>,
    /// Downstream signal sink.
    pub notifier: Arc<dyn DownstreamNotifier>,
    /// Staleness policy, built once from `config.freshness`.
    pub policy: Arc<FreshnessPolicy>,
}

impl AppState {
    /// Create a new worker state.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        dispatcher: Arc<dyn FetchDispatcher>,
        notifier: Arc<dyn DownstreamNotifier>,
    ) -> WorkerResult<Self> {
        config.validate()?;
        let policy = config.freshness.into_policy();

        Ok(Self {
            config: Arc::new(config),
            metadata,
            dispatcher,
            notifier,
            policy: Arc::new(policy),
        })
    }

    /// Run a store read-modify-write under the configured retry budget.
    ///
    /// Only lost first-insert races are retried.
    pub async fn run_with_retry<T, F, Fut>(&self, op: F) -> MetadataResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = MetadataResult<T>>,
    {
        pkgmeta_metadata::run_with_retry(self.config.sync.max_attempts, is_write_conflict, op)
            .await
    }
}

fn is_write_conflict(err: &MetadataError) -> bool {
    let conflict = err.is_unique_violation();
    if conflict {
        crate::metrics::STORE_RETRIES.inc();
    }
    conflict
}
