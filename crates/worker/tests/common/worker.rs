//! Worker test utilities.

use pkgmeta_core::config::AppConfig;
use pkgmeta_metadata::{MetadataStore, SqliteStore};
use pkgmeta_worker::{AppState, InMemoryDispatcher, InMemoryNotifier, create_router};
use std::sync::Arc;
use tempfile::TempDir;

/// A worker wired to a temporary SQLite store and in-memory sinks.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestWorker {
    pub state: AppState,
    pub dispatcher: Arc<InMemoryDispatcher>,
    pub notifier: Arc<InMemoryNotifier>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestWorker {
    /// Create a worker with default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a worker with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig::for_testing(db_path);
        modifier(&mut config);

        let dispatcher = Arc::new(InMemoryDispatcher::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let state = AppState::new(config, metadata, dispatcher.clone(), notifier.clone())
            .expect("Failed to create worker state");

        Self {
            state,
            dispatcher,
            notifier,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Build the operational router.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}
