//! Fetch coordination and result synchronization for package metadata.
//!
//! This crate provides the moving parts around the metadata store:
//! - Fetch coordinator (freshness decisions, in-progress markers, triggers)
//! - Result synchronizer (per-section merges of fetch results)
//! - Fetch trigger dispatch and downstream component signals
//! - Integrity analysis of tracked components
//! - Orphaned record sweep
//! - Metrics and operational endpoints

pub mod consume;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod integrity_check;
pub mod maintenance;
pub mod merge;
pub mod metrics;
pub mod notify;
pub mod routes;
pub mod state;
pub mod synchronizer;
pub mod track;

pub use consume::{ConsumeStats, consume_lines};
pub use coordinator::{ComponentProjection, EvaluationOutcome, FetchCoordinator};
pub use dispatch::{FetchDispatcher, InMemoryDispatcher, LogDispatcher, OutboxDispatcher};
pub use error::{WorkerError, WorkerResult};
pub use maintenance::{MaintenanceStats, run_maintenance};
pub use notify::{ComponentSignal, DownstreamNotifier, InMemoryNotifier, LogNotifier};
pub use routes::create_router;
pub use state::AppState;
pub use synchronizer::{
    DiscardReason, PayloadOutcome, ResultSynchronizer, SyncError, SyncReport,
};
pub use track::{TrackRequest, track_component};
