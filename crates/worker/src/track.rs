//! Tracked component registration.
//!
//! Tracked components own metadata records: they receive downstream
//! signals, get integrity analyses, and keep their records alive through
//! the orphan sweep.

use crate::error::WorkerResult;
use crate::state::AppState;
use pkgmeta_core::{Hashes, PackageCoordinate, RepositoryType};
use pkgmeta_metadata::models::ComponentRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A component to start (or keep) tracking.
#[derive(Clone, Debug)]
pub struct TrackRequest {
    pub coordinate: PackageCoordinate,
    /// Generated when absent.
    pub uuid: Option<Uuid>,
    pub internal: bool,
    /// Hashes of the component as observed by the caller.
    pub hashes: Hashes,
}

/// Insert or replace a tracked component. Re-tracking an existing UUID
/// keeps its creation time.
pub async fn track_component(
    state: &AppState,
    request: TrackRequest,
    now: OffsetDateTime,
) -> WorkerResult<ComponentRow> {
    let uuid = request.uuid.unwrap_or_else(Uuid::new_v4);
    let created_at = match state.metadata.get_component(uuid).await? {
        Some(existing) => existing.created_at,
        None => now,
    };

    let coordinate = &request.coordinate;
    let component = ComponentRow {
        uuid,
        purl: coordinate.canonical(),
        purl_coordinates: coordinate.coordinates(),
        repository_type: RepositoryType::resolve(coordinate).as_str().to_string(),
        namespace: coordinate.namespace().unwrap_or_default().to_string(),
        name: coordinate.name().to_string(),
        internal: request.internal,
        md5: normalize_hash(request.hashes.md5),
        sha1: normalize_hash(request.hashes.sha1),
        sha256: normalize_hash(request.hashes.sha256),
        sha512: normalize_hash(request.hashes.sha512),
        created_at,
    };
    state.metadata.upsert_component(&component).await?;

    tracing::info!(
        component_uuid = %component.uuid,
        purl = %component.purl,
        internal = component.internal,
        "Component tracked"
    );
    Ok(component)
}

fn normalize_hash(hash: Option<String>) -> Option<String> {
    hash.map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
}
