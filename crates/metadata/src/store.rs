//! Metadata store trait and implementations.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    ComponentRepo, HealthMetaRepo, IntegrityAnalysisRepo, IntegrityMetaRepo, MaintenanceRepo,
    RecordWrite, RepositoryMetaRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    HealthMetaRepo
    + IntegrityMetaRepo
    + RepositoryMetaRepo
    + ComponentRepo
    + IntegrityAnalysisRepo
    + MaintenanceRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    ///
    /// `query_timeout_secs` bounds how long a statement waits for a locked
    /// database before failing.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(30);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(query_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers, so racing merges surface as
            // unique violations instead of "database is locked".
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "SQLite metadata store ready");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map an insert failure, turning SQLite unique violations into `UniqueViolation`.
fn map_insert_error(e: sqlx::Error, what: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.message().contains("UNIQUE constraint")
    {
        return MetadataError::UniqueViolation(what.to_string());
    }
    e.into()
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::{OffsetDateTime, UtcOffset};
    use uuid::Uuid;

    fn utc(ts: OffsetDateTime) -> OffsetDateTime {
        ts.to_offset(UtcOffset::UTC)
    }

    fn utc_opt(ts: Option<OffsetDateTime>) -> Option<OffsetDateTime> {
        ts.map(utc)
    }

    async fn insert_health<'e, E>(executor: E, row: &HealthMetaRow) -> MetadataResult<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO health_meta (
                purl, stars, forks, contributors, commit_frequency_weekly,
                open_issues, open_prs, last_commit_date, bus_factor, has_readme,
                has_code_of_conduct, has_security_policy, dependents, files,
                is_repo_archived, scorecard_score, scorecard_reference_version,
                scorecard_timestamp, avg_issue_age_days, scorecard_checks_json,
                last_fetch, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.purl)
        .bind(row.stars)
        .bind(row.forks)
        .bind(row.contributors)
        .bind(row.commit_frequency_weekly)
        .bind(row.open_issues)
        .bind(row.open_prs)
        .bind(utc_opt(row.last_commit_date))
        .bind(row.bus_factor)
        .bind(row.has_readme)
        .bind(row.has_code_of_conduct)
        .bind(row.has_security_policy)
        .bind(row.dependents)
        .bind(row.files)
        .bind(row.is_repo_archived)
        .bind(row.scorecard_score)
        .bind(&row.scorecard_reference_version)
        .bind(utc_opt(row.scorecard_timestamp))
        .bind(row.avg_issue_age_days)
        .bind(&row.scorecard_checks_json)
        .bind(utc_opt(row.last_fetch))
        .bind(&row.status)
        .execute(executor)
        .await
        .map_err(|e| map_insert_error(e, &format!("health_meta {}", row.purl)))?;
        Ok(())
    }

    async fn overwrite_health<'e, E>(executor: E, row: &HealthMetaRow) -> MetadataResult<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE health_meta SET
                stars = ?, forks = ?, contributors = ?, commit_frequency_weekly = ?,
                open_issues = ?, open_prs = ?, last_commit_date = ?, bus_factor = ?,
                has_readme = ?, has_code_of_conduct = ?, has_security_policy = ?,
                dependents = ?, files = ?, is_repo_archived = ?, scorecard_score = ?,
                scorecard_reference_version = ?, scorecard_timestamp = ?,
                avg_issue_age_days = ?, scorecard_checks_json = ?, last_fetch = ?,
                status = ?
            WHERE purl = ?
            "#,
        )
        .bind(row.stars)
        .bind(row.forks)
        .bind(row.contributors)
        .bind(row.commit_frequency_weekly)
        .bind(row.open_issues)
        .bind(row.open_prs)
        .bind(utc_opt(row.last_commit_date))
        .bind(row.bus_factor)
        .bind(row.has_readme)
        .bind(row.has_code_of_conduct)
        .bind(row.has_security_policy)
        .bind(row.dependents)
        .bind(row.files)
        .bind(row.is_repo_archived)
        .bind(row.scorecard_score)
        .bind(&row.scorecard_reference_version)
        .bind(utc_opt(row.scorecard_timestamp))
        .bind(row.avg_issue_age_days)
        .bind(&row.scorecard_checks_json)
        .bind(utc_opt(row.last_fetch))
        .bind(&row.status)
        .bind(&row.purl)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!(
                "health_meta {} not found",
                row.purl
            )));
        }
        Ok(())
    }

    async fn insert_integrity<'e, E>(executor: E, row: &IntegrityMetaRow) -> MetadataResult<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO integrity_meta (
                purl, md5, sha1, sha256, sha512, published_at,
                repository_url, last_fetch, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.purl)
        .bind(&row.md5)
        .bind(&row.sha1)
        .bind(&row.sha256)
        .bind(&row.sha512)
        .bind(utc_opt(row.published_at))
        .bind(&row.repository_url)
        .bind(utc_opt(row.last_fetch))
        .bind(&row.status)
        .execute(executor)
        .await
        .map_err(|e| map_insert_error(e, &format!("integrity_meta {}", row.purl)))?;
        Ok(())
    }

    async fn overwrite_integrity<'e, E>(executor: E, row: &IntegrityMetaRow) -> MetadataResult<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE integrity_meta SET
                md5 = ?, sha1 = ?, sha256 = ?, sha512 = ?, published_at = ?,
                repository_url = ?, last_fetch = ?, status = ?
            WHERE purl = ?
            "#,
        )
        .bind(&row.md5)
        .bind(&row.sha1)
        .bind(&row.sha256)
        .bind(&row.sha512)
        .bind(utc_opt(row.published_at))
        .bind(&row.repository_url)
        .bind(utc_opt(row.last_fetch))
        .bind(&row.status)
        .bind(&row.purl)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!(
                "integrity_meta {} not found",
                row.purl
            )));
        }
        Ok(())
    }

    #[async_trait]
    impl HealthMetaRepo for SqliteStore {
        async fn get_health_meta(&self, purl: &str) -> MetadataResult<Option<HealthMetaRow>> {
            let row = sqlx::query_as::<_, HealthMetaRow>("SELECT * FROM health_meta WHERE purl = ?")
                .bind(purl)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn create_health_meta(&self, row: &HealthMetaRow) -> MetadataResult<()> {
            insert_health(&self.pool, row).await
        }

        async fn update_health_meta(&self, row: &HealthMetaRow) -> MetadataResult<()> {
            overwrite_health(&self.pool, row).await
        }

        async fn modify_health_meta(
            &self,
            purl: &str,
            edit: &mut (dyn for<'a> FnMut(Option<&'a HealthMetaRow>) -> Option<HealthMetaRow> + Send),
        ) -> MetadataResult<RecordWrite> {
            // The pool's single connection is held by the transaction until commit,
            // so no other writer can interleave between the read and the write.
            let mut tx = self.pool.begin().await?;

            let current =
                sqlx::query_as::<_, HealthMetaRow>("SELECT * FROM health_meta WHERE purl = ?")
                    .bind(purl)
                    .fetch_optional(&mut *tx)
                    .await?;

            let Some(next) = edit(current.as_ref()) else {
                tx.rollback().await?;
                return Ok(RecordWrite::Unchanged);
            };

            let write = if current.is_some() {
                overwrite_health(&mut *tx, &next).await?;
                RecordWrite::Updated
            } else {
                insert_health(&mut *tx, &next).await?;
                RecordWrite::Created
            };

            tx.commit().await?;
            Ok(write)
        }
    }

    #[async_trait]
    impl IntegrityMetaRepo for SqliteStore {
        async fn get_integrity_meta(
            &self,
            purl: &str,
        ) -> MetadataResult<Option<IntegrityMetaRow>> {
            let row = sqlx::query_as::<_, IntegrityMetaRow>(
                "SELECT * FROM integrity_meta WHERE purl = ?",
            )
            .bind(purl)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn create_integrity_meta(&self, row: &IntegrityMetaRow) -> MetadataResult<()> {
            insert_integrity(&self.pool, row).await
        }

        async fn update_integrity_meta(&self, row: &IntegrityMetaRow) -> MetadataResult<()> {
            overwrite_integrity(&self.pool, row).await
        }

        async fn modify_integrity_meta(
            &self,
            purl: &str,
            edit: &mut (dyn for<'a> FnMut(Option<&'a IntegrityMetaRow>) -> Option<IntegrityMetaRow> + Send),
        ) -> MetadataResult<RecordWrite> {
            let mut tx = self.pool.begin().await?;

            let current = sqlx::query_as::<_, IntegrityMetaRow>(
                "SELECT * FROM integrity_meta WHERE purl = ?",
            )
            .bind(purl)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(next) = edit(current.as_ref()) else {
                tx.rollback().await?;
                return Ok(RecordWrite::Unchanged);
            };

            let write = if current.is_some() {
                overwrite_integrity(&mut *tx, &next).await?;
                RecordWrite::Updated
            } else {
                insert_integrity(&mut *tx, &next).await?;
                RecordWrite::Created
            };

            tx.commit().await?;
            Ok(write)
        }
    }

    #[async_trait]
    impl RepositoryMetaRepo for SqliteStore {
        async fn get_repository_meta(
            &self,
            repository_type: &str,
            namespace: &str,
            name: &str,
        ) -> MetadataResult<Option<RepositoryMetaRow>> {
            let row = sqlx::query_as::<_, RepositoryMetaRow>(
                "SELECT * FROM repository_meta WHERE repository_type = ? AND namespace = ? AND name = ?",
            )
            .bind(repository_type)
            .bind(namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn create_repository_meta(&self, row: &RepositoryMetaRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO repository_meta (
                    repository_type, namespace, name, latest_version, published, last_check
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.repository_type)
            .bind(&row.namespace)
            .bind(&row.name)
            .bind(&row.latest_version)
            .bind(utc_opt(row.published))
            .bind(utc(row.last_check))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_insert_error(
                    e,
                    &format!(
                        "repository_meta {}/{}/{}",
                        row.repository_type, row.namespace, row.name
                    ),
                )
            })?;
            Ok(())
        }

        async fn update_repository_meta_if_newer(
            &self,
            row: &RepositoryMetaRow,
        ) -> MetadataResult<bool> {
            // Timestamps are stored as text; compare them as instants.
            let result = sqlx::query(
                r#"
                UPDATE repository_meta SET
                    latest_version = ?, published = ?, last_check = ?
                WHERE repository_type = ? AND namespace = ? AND name = ?
                  AND julianday(last_check) < julianday(?)
                "#,
            )
            .bind(&row.latest_version)
            .bind(utc_opt(row.published))
            .bind(utc(row.last_check))
            .bind(&row.repository_type)
            .bind(&row.namespace)
            .bind(&row.name)
            .bind(utc(row.last_check))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl ComponentRepo for SqliteStore {
        async fn upsert_component(&self, component: &ComponentRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO components (
                    uuid, purl, purl_coordinates, repository_type, namespace, name,
                    internal, md5, sha1, sha256, sha512, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(uuid) DO UPDATE SET
                    purl = excluded.purl,
                    purl_coordinates = excluded.purl_coordinates,
                    repository_type = excluded.repository_type,
                    namespace = excluded.namespace,
                    name = excluded.name,
                    internal = excluded.internal,
                    md5 = excluded.md5,
                    sha1 = excluded.sha1,
                    sha256 = excluded.sha256,
                    sha512 = excluded.sha512
                "#,
            )
            .bind(component.uuid)
            .bind(&component.purl)
            .bind(&component.purl_coordinates)
            .bind(&component.repository_type)
            .bind(&component.namespace)
            .bind(&component.name)
            .bind(component.internal)
            .bind(&component.md5)
            .bind(&component.sha1)
            .bind(&component.sha256)
            .bind(&component.sha512)
            .bind(utc(component.created_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_component(&self, uuid: Uuid) -> MetadataResult<Option<ComponentRow>> {
            let row = sqlx::query_as::<_, ComponentRow>("SELECT * FROM components WHERE uuid = ?")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_components_by_coordinates(
            &self,
            purl_coordinates: &str,
        ) -> MetadataResult<Vec<ComponentRow>> {
            let rows = sqlx::query_as::<_, ComponentRow>(
                "SELECT * FROM components WHERE purl_coordinates = ? ORDER BY created_at, uuid",
            )
            .bind(purl_coordinates)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_component(&self, uuid: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM components WHERE uuid = ?")
                .bind(uuid)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "component {} not found",
                    uuid
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IntegrityAnalysisRepo for SqliteStore {
        async fn upsert_integrity_analysis(
            &self,
            row: &IntegrityAnalysisRow,
        ) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO integrity_analysis (
                    component_uuid, integrity_check_status, md5_status, sha1_status,
                    sha256_status, sha512_status, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(component_uuid) DO UPDATE SET
                    integrity_check_status = excluded.integrity_check_status,
                    md5_status = excluded.md5_status,
                    sha1_status = excluded.sha1_status,
                    sha256_status = excluded.sha256_status,
                    sha512_status = excluded.sha512_status,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(row.component_uuid)
            .bind(&row.integrity_check_status)
            .bind(&row.md5_status)
            .bind(&row.sha1_status)
            .bind(&row.sha256_status)
            .bind(&row.sha512_status)
            .bind(utc(row.updated_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_integrity_analysis(
            &self,
            component_uuid: Uuid,
        ) -> MetadataResult<Option<IntegrityAnalysisRow>> {
            let row = sqlx::query_as::<_, IntegrityAnalysisRow>(
                "SELECT * FROM integrity_analysis WHERE component_uuid = ?",
            )
            .bind(component_uuid)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl MaintenanceRepo for SqliteStore {
        async fn delete_orphaned_health_meta(&self) -> MetadataResult<u64> {
            let result = sqlx::query(
                r#"
                DELETE FROM health_meta
                WHERE NOT EXISTS (
                    SELECT 1 FROM components c WHERE c.purl_coordinates = health_meta.purl
                )
                "#,
            )
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }

        async fn delete_orphaned_integrity_meta(&self) -> MetadataResult<u64> {
            let result = sqlx::query(
                r#"
                DELETE FROM integrity_meta
                WHERE NOT EXISTS (
                    SELECT 1 FROM components c WHERE c.purl = integrity_meta.purl
                )
                "#,
            )
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }

        async fn delete_orphaned_repository_meta(&self) -> MetadataResult<u64> {
            let result = sqlx::query(
                r#"
                DELETE FROM repository_meta
                WHERE NOT EXISTS (
                    SELECT 1 FROM components c
                    WHERE c.repository_type = repository_meta.repository_type
                      AND c.namespace = repository_meta.namespace
                      AND c.name = repository_meta.name
                )
                "#,
            )
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Repository health signals, keyed by coordinates
CREATE TABLE IF NOT EXISTS health_meta (
    purl TEXT PRIMARY KEY,
    stars INTEGER,
    forks INTEGER,
    contributors INTEGER,
    commit_frequency_weekly REAL,
    open_issues INTEGER,
    open_prs INTEGER,
    last_commit_date TEXT,
    bus_factor INTEGER,
    has_readme INTEGER,
    has_code_of_conduct INTEGER,
    has_security_policy INTEGER,
    dependents INTEGER,
    files INTEGER,
    is_repo_archived INTEGER,
    scorecard_score REAL,
    scorecard_reference_version TEXT,
    scorecard_timestamp TEXT,
    avg_issue_age_days REAL,
    scorecard_checks_json TEXT,
    last_fetch TEXT,
    status TEXT
);

-- Content hashes, keyed by canonical coordinate
CREATE TABLE IF NOT EXISTS integrity_meta (
    purl TEXT PRIMARY KEY,
    md5 TEXT,
    sha1 TEXT,
    sha256 TEXT,
    sha512 TEXT,
    published_at TEXT,
    repository_url TEXT,
    last_fetch TEXT,
    status TEXT
);

-- Latest version per package
CREATE TABLE IF NOT EXISTS repository_meta (
    repository_type TEXT NOT NULL,
    namespace TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    latest_version TEXT,
    published TEXT,
    last_check TEXT NOT NULL,
    PRIMARY KEY (repository_type, namespace, name)
);

-- Tracked components
CREATE TABLE IF NOT EXISTS components (
    uuid BLOB PRIMARY KEY,
    purl TEXT NOT NULL,
    purl_coordinates TEXT NOT NULL,
    repository_type TEXT NOT NULL,
    namespace TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    internal INTEGER NOT NULL DEFAULT 0,
    md5 TEXT,
    sha1 TEXT,
    sha256 TEXT,
    sha512 TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_components_purl ON components(purl);
CREATE INDEX IF NOT EXISTS idx_components_coordinates ON components(purl_coordinates);
CREATE INDEX IF NOT EXISTS idx_components_package ON components(repository_type, namespace, name);

-- Integrity match per component
CREATE TABLE IF NOT EXISTS integrity_analysis (
    component_uuid BLOB PRIMARY KEY REFERENCES components(uuid) ON DELETE CASCADE,
    integrity_check_status TEXT NOT NULL,
    md5_status TEXT NOT NULL,
    sha1_status TEXT NOT NULL,
    sha256_status TEXT NOT NULL,
    sha512_status TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
