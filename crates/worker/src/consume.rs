//! JSON Lines result consumer.
//!
//! Reads one result message per line and synchronizes each in turn. A bad
//! line never stops the stream: undecodable or identity-less messages are
//! counted as rejected, fatal store or notifier errors as failed.

use crate::error::WorkerResult;
use crate::metrics;
use crate::state::AppState;
use crate::synchronizer::{ResultSynchronizer, SyncReport};
use pkgmeta_core::ResultMessage;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Per-stream totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsumeStats {
    pub processed: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Synchronize every message read from `reader` until end of input.
///
/// Only read errors on the input itself are returned.
pub async fn consume_lines<R>(state: &AppState, reader: R) -> WorkerResult<ConsumeStats>
where
    R: AsyncBufRead + Unpin,
{
    let synchronizer = ResultSynchronizer::new(state);
    let mut stats = ConsumeStats::default();
    let mut lines = reader.lines();
    let mut line_no: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match ResultMessage::from_json(line) {
            Ok(message) => message,
            Err(e) => {
                metrics::RESULTS_REJECTED.inc();
                tracing::warn!(line = line_no, error = %e, "Discarding undecodable result message");
                stats.rejected += 1;
                continue;
            }
        };

        match synchronizer.synchronize(&message).await {
            Ok(SyncReport::Applied { .. }) => stats.processed += 1,
            Ok(SyncReport::Rejected(_)) => stats.rejected += 1,
            Err(e) => {
                tracing::error!(line = line_no, error = %e, "Result message failed");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = stats.processed,
        rejected = stats.rejected,
        failed = stats.failed,
        "Result stream drained"
    );
    Ok(stats)
}
