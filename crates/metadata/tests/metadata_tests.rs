//! Integration tests for MetadataStore implementations.

mod common;

use common::{TestMetadata, component, now, repository_meta, run_metadata_test_both};
use pkgmeta_core::FetchStatus;
use pkgmeta_metadata::models::*;
use pkgmeta_metadata::{MetadataError, RecordWrite, run_with_retry};
use time::Duration;

#[tokio::test]
async fn test_health_meta_lifecycle() {
    run_metadata_test_both(|store| async move {
        let purl = "pkg:npm/left-pad@1.3.0";
        assert!(store.get_health_meta(purl).await.unwrap().is_none());

        let mut row = HealthMetaRow::new(purl);
        row.stars = Some(42);
        row.commit_frequency_weekly = Some(1.5);
        row.has_readme = Some(true);
        row.last_fetch = Some(now());
        row.set_fetch_status(FetchStatus::InProgress);
        store.create_health_meta(&row).await.unwrap();

        let stored = store.get_health_meta(purl).await.unwrap().unwrap();
        assert_eq!(stored, row);

        row.forks = Some(7);
        row.set_fetch_status(FetchStatus::Processed);
        store.update_health_meta(&row).await.unwrap();

        let stored = store.get_health_meta(purl).await.unwrap().unwrap();
        assert_eq!(stored.forks, Some(7));
        assert_eq!(stored.stars, Some(42));
        assert_eq!(stored.fetch_status(), Some(FetchStatus::Processed));
    })
    .await;
}

#[tokio::test]
async fn test_health_meta_duplicate_insert_is_unique_violation() {
    run_metadata_test_both(|store| async move {
        let row = HealthMetaRow::new("pkg:cargo/serde");
        store.create_health_meta(&row).await.unwrap();

        let err = store.create_health_meta(&row).await.unwrap_err();
        assert!(err.is_unique_violation(), "unexpected error: {err}");
    })
    .await;
}

#[tokio::test]
async fn test_update_missing_record_is_not_found() {
    run_metadata_test_both(|store| async move {
        let err = store
            .update_health_meta(&HealthMetaRow::new("pkg:npm/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));

        let err = store
            .update_integrity_meta(&IntegrityMetaRow::new("pkg:npm/missing@1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    })
    .await;
}

#[tokio::test]
async fn test_integrity_meta_lifecycle() {
    run_metadata_test_both(|store| async move {
        let purl = "pkg:maven/com.acme/acme-lib@1.0.0";
        let mut row = IntegrityMetaRow::new(purl);
        row.last_fetch = Some(now());
        row.set_fetch_status(FetchStatus::InProgress);
        store.create_integrity_meta(&row).await.unwrap();

        let err = store.create_integrity_meta(&row).await.unwrap_err();
        assert!(err.is_unique_violation());

        row.sha256 = Some("abc".to_string());
        row.repository_url = Some("https://repo1.maven.org/maven2".to_string());
        row.published_at = Some(now() - Duration::days(3));
        row.set_fetch_status(FetchStatus::Processed);
        store.update_integrity_meta(&row).await.unwrap();

        let stored = store.get_integrity_meta(purl).await.unwrap().unwrap();
        assert_eq!(stored, row);
    })
    .await;
}

#[tokio::test]
async fn test_repository_meta_only_moves_forward() {
    run_metadata_test_both(|store| async move {
        let t1 = now() - Duration::hours(2);
        let t2 = now() - Duration::hours(1);
        let t3 = now();

        store
            .create_repository_meta(&repository_meta("com.acme", "acme-lib", "2.0.0", t2))
            .await
            .unwrap();

        let older = repository_meta("com.acme", "acme-lib", "1.0.0", t1);
        assert!(!store.update_repository_meta_if_newer(&older).await.unwrap());

        let same = repository_meta("com.acme", "acme-lib", "1.5.0", t2);
        assert!(!store.update_repository_meta_if_newer(&same).await.unwrap());

        let stored = store
            .get_repository_meta("MAVEN", "com.acme", "acme-lib")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.latest_version.as_deref(), Some("2.0.0"));

        let newer = repository_meta("com.acme", "acme-lib", "3.0.0", t3);
        assert!(store.update_repository_meta_if_newer(&newer).await.unwrap());

        let stored = store
            .get_repository_meta("MAVEN", "com.acme", "acme-lib")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.latest_version.as_deref(), Some("3.0.0"));
        assert_eq!(stored.last_check, t3);
    })
    .await;
}

#[tokio::test]
async fn test_repository_meta_duplicate_insert_is_unique_violation() {
    run_metadata_test_both(|store| async move {
        let row = repository_meta("", "guava", "33.0.0", now());
        store.create_repository_meta(&row).await.unwrap();
        let err = store.create_repository_meta(&row).await.unwrap_err();
        assert!(err.is_unique_violation());
    })
    .await;
}

#[tokio::test]
async fn test_components_by_coordinates() {
    run_metadata_test_both(|store| async move {
        let a = component("pkg:maven/com.acme/acme-lib@1.0.0?type=jar");
        let b = component("pkg:maven/com.acme/acme-lib@1.0.0");
        let other = component("pkg:maven/com.acme/acme-lib@2.0.0");
        for c in [&a, &b, &other] {
            store.upsert_component(c).await.unwrap();
        }

        let found = store
            .list_components_by_coordinates("pkg:maven/com.acme/acme-lib@1.0.0")
            .await
            .unwrap();
        let mut uuids: Vec<_> = found.iter().map(|c| c.uuid).collect();
        uuids.sort();
        let mut expected = vec![a.uuid, b.uuid];
        expected.sort();
        assert_eq!(uuids, expected);

        let mut updated = a.clone();
        updated.sha1 = Some("deadbeef".to_string());
        store.upsert_component(&updated).await.unwrap();
        let stored = store.get_component(a.uuid).await.unwrap().unwrap();
        assert_eq!(stored.sha1.as_deref(), Some("deadbeef"));

        store.delete_component(a.uuid).await.unwrap();
        assert!(store.get_component(a.uuid).await.unwrap().is_none());
        assert!(matches!(
            store.delete_component(a.uuid).await,
            Err(MetadataError::NotFound(_))
        ));
    })
    .await;
}

#[tokio::test]
async fn test_integrity_analysis_upsert_and_cascade() {
    run_metadata_test_both(|store| async move {
        let c = component("pkg:npm/lodash@4.17.21");
        store.upsert_component(&c).await.unwrap();

        let m = pkgmeta_core::compute_integrity_match(
            &pkgmeta_core::Hashes {
                sha1: Some("aaa".to_string()),
                ..Default::default()
            },
            &pkgmeta_core::Hashes {
                sha1: Some("aaa".to_string()),
                ..Default::default()
            },
        );
        let row = IntegrityAnalysisRow::from_match(c.uuid, &m, now());
        store.upsert_integrity_analysis(&row).await.unwrap();
        store.upsert_integrity_analysis(&row).await.unwrap();

        let stored = store.get_integrity_analysis(c.uuid).await.unwrap().unwrap();
        assert_eq!(stored.integrity_check_status, "HASH_MATCH_PASSED");
        assert_eq!(stored.sha1_status, "HASH_MATCH_PASSED");
        assert_eq!(
            stored.md5_status,
            "COMPONENT_MISSING_HASH_AND_MATCH_UNKNOWN"
        );

        store.delete_component(c.uuid).await.unwrap();
        assert!(store.get_integrity_analysis(c.uuid).await.unwrap().is_none());
    })
    .await;
}

#[tokio::test]
async fn test_orphaned_records_are_deleted() {
    run_metadata_test_both(|store| async move {
        let existing = component("pkg:maven/com.acme/acme-lib@1.0.0");
        store.upsert_component(&existing).await.unwrap();

        let orphan_purl = "pkg:maven/foo/bar@1.2.3";

        for purl in [existing.purl.as_str(), orphan_purl] {
            store
                .create_integrity_meta(&IntegrityMetaRow::new(purl))
                .await
                .unwrap();
            store
                .create_health_meta(&HealthMetaRow::new(purl))
                .await
                .unwrap();
        }
        store
            .create_repository_meta(&repository_meta("com.acme", "acme-lib", "2.0.0", now()))
            .await
            .unwrap();
        store
            .create_repository_meta(&repository_meta("foo", "bar", "3.2.1", now()))
            .await
            .unwrap();

        assert_eq!(store.delete_orphaned_integrity_meta().await.unwrap(), 1);
        assert_eq!(store.delete_orphaned_health_meta().await.unwrap(), 1);
        assert_eq!(store.delete_orphaned_repository_meta().await.unwrap(), 1);

        assert!(store.get_integrity_meta(&existing.purl).await.unwrap().is_some());
        assert!(store.get_integrity_meta(orphan_purl).await.unwrap().is_none());
        assert!(store.get_health_meta(&existing.purl).await.unwrap().is_some());
        assert!(store.get_health_meta(orphan_purl).await.unwrap().is_none());
        assert!(
            store
                .get_repository_meta("MAVEN", "com.acme", "acme-lib")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get_repository_meta("MAVEN", "foo", "bar")
                .await
                .unwrap()
                .is_none()
        );
    })
    .await;
}

#[tokio::test]
async fn test_retry_recovers_from_lost_insert_race() {
    let metadata = TestMetadata::new()
        .await
        .expect("Failed to create metadata");
    let store = metadata.store();
    let purl = "pkg:npm/racy@1.0.0";

    // Another writer wins the first insert.
    let mut winner = HealthMetaRow::new(purl);
    winner.forks = Some(3);
    store.create_health_meta(&winner).await.unwrap();

    let attempts = run_with_retry(3, MetadataError::is_unique_violation, |attempt| {
        let store = store.clone();
        async move {
            let existing = if attempt == 1 {
                // Stale read from before the winner committed.
                None
            } else {
                store.get_health_meta(purl).await?
            };
            match existing {
                None => {
                    let mut row = HealthMetaRow::new(purl);
                    row.stars = Some(10);
                    store.create_health_meta(&row).await?;
                }
                Some(mut row) => {
                    row.stars = Some(10);
                    store.update_health_meta(&row).await?;
                }
            }
            Ok(attempt)
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts, 2);
    let stored = store.get_health_meta(purl).await.unwrap().unwrap();
    assert_eq!(stored.stars, Some(10));
    assert_eq!(stored.forks, Some(3));
}

#[tokio::test]
async fn test_modify_health_meta_creates_updates_and_skips() {
    run_metadata_test_both(|store| async move {
        let purl = "pkg:npm/left-pad@1.3.0";

        let mut seen = Vec::new();
        let mut edit = |current: Option<&HealthMetaRow>| {
            seen.push(current.is_some());
            let mut row = current
                .cloned()
                .unwrap_or_else(|| HealthMetaRow::new(purl));
            row.stars = Some(row.stars.unwrap_or(0) + 1);
            Some(row)
        };
        assert_eq!(
            store.modify_health_meta(purl, &mut edit).await.unwrap(),
            RecordWrite::Created
        );
        assert_eq!(
            store.modify_health_meta(purl, &mut edit).await.unwrap(),
            RecordWrite::Updated
        );
        assert_eq!(seen, vec![false, true]);

        let mut skip = |_: Option<&HealthMetaRow>| -> Option<HealthMetaRow> { None };
        let write = store.modify_health_meta(purl, &mut skip).await.unwrap();
        assert_eq!(write, RecordWrite::Unchanged);
        assert!(!write.is_written());

        let stored = store.get_health_meta(purl).await.unwrap().unwrap();
        assert_eq!(stored.stars, Some(2));
    })
    .await;
}

#[tokio::test]
async fn test_concurrent_modifications_of_one_record_serialize() {
    run_metadata_test_both(|store| async move {
        let purl = "pkg:maven/com.acme/acme-lib@1.0.0";
        let mut seeded = IntegrityMetaRow::new(purl);
        seeded.set_fetch_status(FetchStatus::InProgress);
        store.create_integrity_meta(&seeded).await.unwrap();

        // Each edit appends its mark to what it read; a lost update drops one.
        let append = |mark: &'static str| {
            let store = store.clone();
            async move {
                let mut edit = |current: Option<&IntegrityMetaRow>| {
                    let mut row = current.cloned()?;
                    let joined = match row.repository_url.take() {
                        Some(seen) => format!("{seen},{mark}"),
                        None => mark.to_string(),
                    };
                    row.repository_url = Some(joined);
                    Some(row)
                };
                store.modify_integrity_meta(purl, &mut edit).await.unwrap()
            }
        };
        let (a, b, c) = tokio::join!(append("a"), append("b"), append("c"));
        assert_eq!([a, b, c], [RecordWrite::Updated; 3]);

        let stored = store.get_integrity_meta(purl).await.unwrap().unwrap();
        let mut marks: Vec<_> = stored
            .repository_url
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .collect();
        marks.sort_unstable();
        assert_eq!(marks, vec!["a", "b", "c"]);
    })
    .await;
}

#[tokio::test]
async fn test_racing_first_modifications_converge_under_retry() {
    run_metadata_test_both(|store| async move {
        let purl = "pkg:pypi/requests@2.31.0";

        let insert = |stars: i32| {
            let store = store.clone();
            async move {
                run_with_retry(3, MetadataError::is_unique_violation, |_| {
                    let store = store.clone();
                    async move {
                        let mut edit = |current: Option<&HealthMetaRow>| {
                            let mut row = current
                                .cloned()
                                .unwrap_or_else(|| HealthMetaRow::new(purl));
                            if stars > 5 {
                                row.forks = Some(stars);
                            } else {
                                row.stars = Some(stars);
                            }
                            Some(row)
                        };
                        store.modify_health_meta(purl, &mut edit).await
                    }
                })
                .await
                .unwrap()
            }
        };
        let (first, second) = tokio::join!(insert(5), insert(9));
        let mut writes = [first, second];
        writes.sort_by_key(|w| *w == RecordWrite::Updated);
        assert_eq!(writes, [RecordWrite::Created, RecordWrite::Updated]);

        let stored = store.get_health_meta(purl).await.unwrap().unwrap();
        assert_eq!(stored.stars, Some(5));
        assert_eq!(stored.forks, Some(9));
    })
    .await;
}
