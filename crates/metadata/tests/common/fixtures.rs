//! Row builders shared by the metadata tests.

use pkgmeta_core::{PackageCoordinate, RepositoryType};
use pkgmeta_metadata::models::{ComponentRow, RepositoryMetaRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build a tracked component row for a coordinate string.
#[allow(dead_code)]
pub fn component(purl: &str) -> ComponentRow {
    let coordinate = PackageCoordinate::parse(purl).expect("valid test purl");
    ComponentRow {
        uuid: Uuid::new_v4(),
        purl: coordinate.canonical(),
        purl_coordinates: coordinate.coordinates(),
        repository_type: RepositoryType::resolve(&coordinate).as_str().to_string(),
        namespace: coordinate.namespace().unwrap_or_default().to_string(),
        name: coordinate.name().to_string(),
        internal: false,
        md5: None,
        sha1: None,
        sha256: None,
        sha512: None,
        created_at: now(),
    }
}

/// Build a latest-version row.
#[allow(dead_code)]
pub fn repository_meta(
    namespace: &str,
    name: &str,
    latest_version: &str,
    last_check: OffsetDateTime,
) -> RepositoryMetaRow {
    RepositoryMetaRow {
        repository_type: RepositoryType::Maven.as_str().to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        latest_version: Some(latest_version.to_string()),
        published: None,
        last_check,
    }
}

/// Current time truncated to whole seconds, so values survive a store round trip.
#[allow(dead_code)]
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
