//! Fetch trigger dispatch.
//!
//! This module provides:
//!
//! - [`FetchDispatcher`]: Trait for handing fetch triggers to the external fetch workers
//! - [`LogDispatcher`]: Logs each trigger and drops it
//! - [`OutboxDispatcher`]: Appends each trigger to a JSON Lines outbox file
//! - [`InMemoryDispatcher`]: Records triggers for tests
//!
//! Dispatch is fire-and-forget. Delivery is at-least-once; a trigger lost
//! after its in-progress marker was persisted is recovered by the stalled
//! fetch rule of the freshness policy.

pub mod memory;
pub mod outbox;

pub use memory::InMemoryDispatcher;
pub use outbox::{JsonlOutbox, OutboxDispatcher};

use crate::error::WorkerResult;
use async_trait::async_trait;
use pkgmeta_core::FetchTrigger;
use pkgmeta_core::config::OutboundConfig;
use std::sync::Arc;

/// Sink for fetch triggers.
#[async_trait]
pub trait FetchDispatcher: Send + Sync {
    /// Hand a trigger to the fetch workers without waiting for the fetch.
    async fn dispatch(&self, trigger: FetchTrigger) -> WorkerResult<()>;
}

/// Dispatcher that only logs triggers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl FetchDispatcher for LogDispatcher {
    async fn dispatch(&self, trigger: FetchTrigger) -> WorkerResult<()> {
        tracing::info!(
            purl = %trigger.purl,
            component_uuid = ?trigger.component_uuid,
            internal = trigger.internal,
            requested = ?trigger.requested,
            "Fetch trigger"
        );
        Ok(())
    }
}

/// Create a dispatcher from configuration.
pub async fn from_config(config: &OutboundConfig) -> WorkerResult<Arc<dyn FetchDispatcher>> {
    match config {
        OutboundConfig::Log => Ok(Arc::new(LogDispatcher) as Arc<dyn FetchDispatcher>),
        OutboundConfig::Outbox { path } => {
            let dispatcher = OutboxDispatcher::open(path).await?;
            Ok(Arc::new(dispatcher) as Arc<dyn FetchDispatcher>)
        }
    }
}
