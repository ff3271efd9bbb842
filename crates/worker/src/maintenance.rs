//! Orphaned record sweep.
//!
//! Records are keyed by package, not by component. Once no tracked
//! component refers to a key any more, its records are deleted.

use crate::error::WorkerResult;
use crate::metrics;
use pkgmeta_metadata::MetadataStore;
use serde::Serialize;

/// Records deleted by one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceStats {
    pub health: u64,
    pub integrity: u64,
    pub repository: u64,
}

impl MaintenanceStats {
    pub fn total(&self) -> u64 {
        self.health + self.integrity + self.repository
    }
}

/// Delete health, integrity and latest-version records no tracked
/// component refers to.
pub async fn run_maintenance(store: &dyn MetadataStore) -> WorkerResult<MaintenanceStats> {
    let stats = MaintenanceStats {
        health: store.delete_orphaned_health_meta().await?,
        integrity: store.delete_orphaned_integrity_meta().await?,
        repository: store.delete_orphaned_repository_meta().await?,
    };

    for (record, count) in [
        ("health", stats.health),
        ("integrity", stats.integrity),
        ("repository", stats.repository),
    ] {
        metrics::ORPHANS_DELETED
            .with_label_values(&[record])
            .inc_by(count);
    }

    tracing::info!(
        health = stats.health,
        integrity = stats.integrity,
        repository = stats.repository,
        "Orphaned metadata records deleted"
    );
    Ok(stats)
}
