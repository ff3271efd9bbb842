//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{
    ComponentRepo, HealthMetaRepo, IntegrityAnalysisRepo, IntegrityMetaRepo, MaintenanceRepo,
    RecordWrite, RepositoryMetaRepo,
};
use crate::store::MetadataStore;
use async_trait::async_trait;
use pkgmeta_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Map an insert failure, turning SQLSTATE 23505 into `UniqueViolation`.
fn map_insert_error(e: sqlx::Error, what: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.code().as_deref() == Some("23505")
    {
        return MetadataError::UniqueViolation(what.to_string());
    }
    e.into()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, e.g. the password
    /// through an environment variable.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Shorthand for `from_url`.
    pub async fn new(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        Self::from_url(url, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn insert_health<'e, E>(executor: E, row: &HealthMetaRow) -> MetadataResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
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
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
            $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
        )
        "#,
    )
    .bind(&row.purl)
    .bind(row.stars)
    .bind(row.forks)
    .bind(row.contributors)
    .bind(row.commit_frequency_weekly)
    .bind(row.open_issues)
    .bind(row.open_prs)
    .bind(row.last_commit_date)
    .bind(row.bus_factor)
    .bind(row.has_readme)
    .bind(row.has_code_of_conduct)
    .bind(row.has_security_policy)
    .bind(row.dependents)
    .bind(row.files)
    .bind(row.is_repo_archived)
    .bind(row.scorecard_score)
    .bind(&row.scorecard_reference_version)
    .bind(row.scorecard_timestamp)
    .bind(row.avg_issue_age_days)
    .bind(&row.scorecard_checks_json)
    .bind(row.last_fetch)
    .bind(&row.status)
    .execute(executor)
    .await
    .map_err(|e| map_insert_error(e, &format!("health_meta {}", row.purl)))?;
    Ok(())
}

async fn overwrite_health<'e, E>(executor: E, row: &HealthMetaRow) -> MetadataResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE health_meta SET
            stars = $1, forks = $2, contributors = $3, commit_frequency_weekly = $4,
            open_issues = $5, open_prs = $6, last_commit_date = $7, bus_factor = $8,
            has_readme = $9, has_code_of_conduct = $10, has_security_policy = $11,
            dependents = $12, files = $13, is_repo_archived = $14, scorecard_score = $15,
            scorecard_reference_version = $16, scorecard_timestamp = $17,
            avg_issue_age_days = $18, scorecard_checks_json = $19, last_fetch = $20,
            status = $21
        WHERE purl = $22
        "#,
    )
    .bind(row.stars)
    .bind(row.forks)
    .bind(row.contributors)
    .bind(row.commit_frequency_weekly)
    .bind(row.open_issues)
    .bind(row.open_prs)
    .bind(row.last_commit_date)
    .bind(row.bus_factor)
    .bind(row.has_readme)
    .bind(row.has_code_of_conduct)
    .bind(row.has_security_policy)
    .bind(row.dependents)
    .bind(row.files)
    .bind(row.is_repo_archived)
    .bind(row.scorecard_score)
    .bind(&row.scorecard_reference_version)
    .bind(row.scorecard_timestamp)
    .bind(row.avg_issue_age_days)
    .bind(&row.scorecard_checks_json)
    .bind(row.last_fetch)
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
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO integrity_meta (
            purl, md5, sha1, sha256, sha512, published_at,
            repository_url, last_fetch, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&row.purl)
    .bind(&row.md5)
    .bind(&row.sha1)
    .bind(&row.sha256)
    .bind(&row.sha512)
    .bind(row.published_at)
    .bind(&row.repository_url)
    .bind(row.last_fetch)
    .bind(&row.status)
    .execute(executor)
    .await
    .map_err(|e| map_insert_error(e, &format!("integrity_meta {}", row.purl)))?;
    Ok(())
}

async fn overwrite_integrity<'e, E>(executor: E, row: &IntegrityMetaRow) -> MetadataResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE integrity_meta SET
            md5 = $1, sha1 = $2, sha256 = $3, sha512 = $4, published_at = $5,
            repository_url = $6, last_fetch = $7, status = $8
        WHERE purl = $9
        "#,
    )
    .bind(&row.md5)
    .bind(&row.sha1)
    .bind(&row.sha256)
    .bind(&row.sha512)
    .bind(row.published_at)
    .bind(&row.repository_url)
    .bind(row.last_fetch)
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
impl HealthMetaRepo for PostgresStore {
    async fn get_health_meta(&self, purl: &str) -> MetadataResult<Option<HealthMetaRow>> {
        let row = sqlx::query_as::<_, HealthMetaRow>("SELECT * FROM health_meta WHERE purl = $1")
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
        // The row lock is held until commit, so a concurrent edit of the same key
        // waits here and then sees this edit's result.
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, HealthMetaRow>(
            "SELECT * FROM health_meta WHERE purl = $1 FOR UPDATE",
        )
        .bind(purl)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(next) = edit(current.as_ref()) else {
            tx.rollback().await?;
            return Ok(RecordWrite::Unchanged);
        };

        // A missing row cannot be locked; a racing insert surfaces as UniqueViolation.
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
impl IntegrityMetaRepo for PostgresStore {
    async fn get_integrity_meta(&self, purl: &str) -> MetadataResult<Option<IntegrityMetaRow>> {
        let row =
            sqlx::query_as::<_, IntegrityMetaRow>("SELECT * FROM integrity_meta WHERE purl = $1")
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
            "SELECT * FROM integrity_meta WHERE purl = $1 FOR UPDATE",
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
impl RepositoryMetaRepo for PostgresStore {
    async fn get_repository_meta(
        &self,
        repository_type: &str,
        namespace: &str,
        name: &str,
    ) -> MetadataResult<Option<RepositoryMetaRow>> {
        let row = sqlx::query_as::<_, RepositoryMetaRow>(
            "SELECT * FROM repository_meta WHERE repository_type = $1 AND namespace = $2 AND name = $3",
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
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&row.repository_type)
        .bind(&row.namespace)
        .bind(&row.name)
        .bind(&row.latest_version)
        .bind(row.published)
        .bind(row.last_check)
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
        let result = sqlx::query(
            r#"
            UPDATE repository_meta SET
                latest_version = $1, published = $2, last_check = $3
            WHERE repository_type = $4 AND namespace = $5 AND name = $6
              AND last_check < $3
            "#,
        )
        .bind(&row.latest_version)
        .bind(row.published)
        .bind(row.last_check)
        .bind(&row.repository_type)
        .bind(&row.namespace)
        .bind(&row.name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ComponentRepo for PostgresStore {
    async fn upsert_component(&self, component: &ComponentRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO components (
                uuid, purl, purl_coordinates, repository_type, namespace, name,
                internal, md5, sha1, sha256, sha512, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (uuid) DO UPDATE SET
                purl = EXCLUDED.purl,
                purl_coordinates = EXCLUDED.purl_coordinates,
                repository_type = EXCLUDED.repository_type,
                namespace = EXCLUDED.namespace,
                name = EXCLUDED.name,
                internal = EXCLUDED.internal,
                md5 = EXCLUDED.md5,
                sha1 = EXCLUDED.sha1,
                sha256 = EXCLUDED.sha256,
                sha512 = EXCLUDED.sha512
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
        .bind(component.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_component(&self, uuid: Uuid) -> MetadataResult<Option<ComponentRow>> {
        let row = sqlx::query_as::<_, ComponentRow>("SELECT * FROM components WHERE uuid = $1")
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
            "SELECT * FROM components WHERE purl_coordinates = $1 ORDER BY created_at, uuid",
        )
        .bind(purl_coordinates)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_component(&self, uuid: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM components WHERE uuid = $1")
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
impl IntegrityAnalysisRepo for PostgresStore {
    async fn upsert_integrity_analysis(&self, row: &IntegrityAnalysisRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO integrity_analysis (
                component_uuid, integrity_check_status, md5_status, sha1_status,
                sha256_status, sha512_status, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (component_uuid) DO UPDATE SET
                integrity_check_status = EXCLUDED.integrity_check_status,
                md5_status = EXCLUDED.md5_status,
                sha1_status = EXCLUDED.sha1_status,
                sha256_status = EXCLUDED.sha256_status,
                sha512_status = EXCLUDED.sha512_status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.component_uuid)
        .bind(&row.integrity_check_status)
        .bind(&row.md5_status)
        .bind(&row.sha1_status)
        .bind(&row.sha256_status)
        .bind(&row.sha512_status)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_integrity_analysis(
        &self,
        component_uuid: Uuid,
    ) -> MetadataResult<Option<IntegrityAnalysisRow>> {
        let row = sqlx::query_as::<_, IntegrityAnalysisRow>(
            "SELECT * FROM integrity_analysis WHERE component_uuid = $1",
        )
        .bind(component_uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl MaintenanceRepo for PostgresStore {
    async fn delete_orphaned_health_meta(&self) -> MetadataResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM health_meta h
            WHERE NOT EXISTS (
                SELECT 1 FROM components c WHERE c.purl_coordinates = h.purl
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
            DELETE FROM integrity_meta i
            WHERE NOT EXISTS (
                SELECT 1 FROM components c WHERE c.purl = i.purl
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
            DELETE FROM repository_meta r
            WHERE NOT EXISTS (
                SELECT 1 FROM components c
                WHERE c.repository_type = r.repository_type
                  AND c.namespace = r.namespace
                  AND c.name = r.name
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
