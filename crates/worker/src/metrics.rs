//! Prometheus metrics for the metadata worker.
//!
//! Counts fetch triggers, result synchronization outcomes and store
//! write conflicts. Labels carry metadata kinds, trigger reasons and
//! discard reasons only; package coordinates are never used as labels.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Coordinator metrics
pub static TRIGGERS_DISPATCHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_triggers_dispatched_total",
            "Total fetch triggers dispatched by metadata kind and trigger reason",
        ),
        &["kind", "reason"],
    )
    .expect("metric creation failed")
});

pub static DISPATCH_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_dispatch_failures_total",
            "Total fetch triggers that could not be dispatched, by metadata kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static EVALUATIONS_UNSUPPORTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_evaluations_unsupported_total",
            "Total evaluations short-circuited for unsupported package types",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

// Synchronizer metrics
pub static RESULTS_PROCESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pkgmeta_results_processed_total",
        "Total result messages merged into the store",
    )
    .expect("metric creation failed")
});

pub static RESULTS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pkgmeta_results_rejected_total",
        "Total result messages discarded for missing or malformed package identity",
    )
    .expect("metric creation failed")
});

pub static RESULTS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pkgmeta_results_failed_total",
        "Total result messages that failed with a fatal processing error",
    )
    .expect("metric creation failed")
});

pub static PAYLOADS_DISCARDED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_payloads_discarded_total",
            "Total result sections discarded as stale or superseded",
        ),
        &["section", "reason"],
    )
    .expect("metric creation failed")
});

pub static STORE_RETRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pkgmeta_store_retries_total",
        "Total uniqueness conflicts hit by record writes",
    )
    .expect("metric creation failed")
});

pub static SIGNALS_EMITTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_signals_emitted_total",
            "Total downstream component signals emitted by signal type",
        ),
        &["signal"],
    )
    .expect("metric creation failed")
});

// Maintenance metrics
pub static ORPHANS_DELETED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pkgmeta_orphans_deleted_total",
            "Total orphaned metadata records deleted by record type",
        ),
        &["record"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(TRIGGERS_DISPATCHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DISPATCH_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EVALUATIONS_UNSUPPORTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RESULTS_PROCESSED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RESULTS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RESULTS_FAILED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PAYLOADS_DISCARDED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORE_RETRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SIGNALS_EMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ORPHANS_DELETED.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the /metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a discarded result section.
pub fn record_discard(section: &str, reason: &str) {
    PAYLOADS_DISCARDED
        .with_label_values(&[section, reason])
        .inc();
}

/// Record an emitted downstream signal.
pub fn record_signal(signal: &str) {
    SIGNALS_EMITTED.with_label_values(&[signal]).inc();
}
