//! Message and record builders shared by the worker tests.

use pkgmeta_core::{
    AnalysisResult, ComponentRef, HealthMeta, IntegrityMeta, PackageCoordinate, ResultMessage,
};
use pkgmeta_worker::ComponentProjection;
use time::OffsetDateTime;
use uuid::Uuid;

/// Parse a test coordinate.
#[allow(dead_code)]
pub fn coordinate(purl: &str) -> PackageCoordinate {
    PackageCoordinate::parse(purl).expect("valid test purl")
}

/// Project a coordinate with a fresh component UUID.
#[allow(dead_code)]
pub fn projection(purl: &str) -> ComponentProjection {
    ComponentProjection::new(coordinate(purl)).with_uuid(Uuid::new_v4())
}

/// A result message for a purl, produced at `produced_at`, with no sections.
#[allow(dead_code)]
pub fn result_message(purl: &str, produced_at: OffsetDateTime) -> ResultMessage {
    ResultMessage {
        produced_at,
        result: AnalysisResult {
            component: Some(ComponentRef {
                purl: Some(purl.to_string()),
                uuid: None,
            }),
            ..Default::default()
        },
    }
}

/// A result message carrying only a latest-version section.
#[allow(dead_code)]
pub fn version_message(
    purl: &str,
    latest_version: &str,
    produced_at: OffsetDateTime,
) -> ResultMessage {
    let mut message = result_message(purl, produced_at);
    message.result.latest_version = Some(latest_version.to_string());
    message.result.published = Some(produced_at - time::Duration::days(1));
    message
}

/// A result message carrying only a health section.
#[allow(dead_code)]
pub fn health_message(purl: &str, meta: HealthMeta) -> ResultMessage {
    let mut message = result_message(purl, now());
    message.result.health_meta = Some(meta);
    message
}

/// A result message carrying only an integrity section.
#[allow(dead_code)]
pub fn integrity_message(purl: &str, meta: IntegrityMeta) -> ResultMessage {
    let mut message = result_message(purl, now());
    message.result.integrity_meta = Some(meta);
    message
}

/// Current time truncated to whole seconds, so values survive a store round trip.
#[allow(dead_code)]
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
