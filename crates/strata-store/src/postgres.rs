use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use strata_domain::{
    Backup, BackupId, Cluster, ClusterId, ClusterInstallation, ClusterInstallationId,
    DatabaseSchema, DatabaseSchemaId, Event, Group,
    GroupId, Installation, InstallationId, Lease, LogicalDatabase,
    LogicalDatabaseId, MultitenantDatabase, MultitenantDatabaseId, Subscription, SubscriptionId,
    Webhook, WebhookId,
};

use crate::error::StoreError;
use crate::filter::{ClusterFilter, ClusterInstallationFilter, EventsFilter, GroupFilter, InstallationFilter};
use crate::store::Store;

const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS clusters (
        id char(26) PRIMARY KEY,
        state varchar NOT NULL,
        allow_installations boolean NOT NULL,
        api_security_lock boolean NOT NULL DEFAULT false,
        annotations jsonb NOT NULL DEFAULT '[]',
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS installations (
        id char(26) PRIMARY KEY,
        state varchar NOT NULL,
        owner_id varchar NOT NULL,
        dns varchar NOT NULL,
        group_id char(26),
        api_security_lock boolean NOT NULL DEFAULT false,
        deletion_lock boolean NOT NULL DEFAULT false,
        annotations jsonb NOT NULL DEFAULT '[]',
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS installations_dns_ci_idx
        ON installations (lower(dns)) WHERE delete_at = 0"#,
    r#"CREATE TABLE IF NOT EXISTS cluster_installations (
        id char(26) PRIMARY KEY,
        cluster_id char(26) NOT NULL,
        installation_id char(26) NOT NULL,
        state varchar NOT NULL,
        is_active boolean NOT NULL DEFAULT false,
        api_security_lock boolean NOT NULL DEFAULT false,
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS groups (
        id char(26) PRIMARY KEY,
        sequence bigint NOT NULL DEFAULT 0,
        api_security_lock boolean NOT NULL DEFAULT false,
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS multitenant_databases (
        id char(26) PRIMARY KEY,
        cluster_id char(26) NOT NULL,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS logical_databases (
        id char(26) PRIMARY KEY,
        multitenant_database_id char(26) NOT NULL,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS database_schemas (
        id char(26) PRIMARY KEY,
        logical_database_id char(26) NOT NULL,
        installation_id char(26) NOT NULL,
        state varchar NOT NULL,
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS backups (
        id char(26) PRIMARY KEY,
        installation_id char(26) NOT NULL,
        state varchar NOT NULL,
        lock_by varchar,
        lock_at bigint NOT NULL DEFAULT 0,
        lock_expires_at bigint NOT NULL DEFAULT 0,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS webhooks (
        id char(26) PRIMARY KEY,
        owner_id varchar NOT NULL,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS subscriptions (
        id char(26) PRIMARY KEY,
        owner_id varchar NOT NULL,
        create_at bigint NOT NULL,
        delete_at bigint NOT NULL DEFAULT 0,
        data jsonb NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS events (
        sequence bigserial PRIMARY KEY,
        id char(26) NOT NULL,
        event_type varchar NOT NULL,
        subject_id varchar NOT NULL,
        timestamp bigint NOT NULL,
        data jsonb NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS events_subject_idx ON events (subject_id, sequence)"#,
    r#"CREATE TABLE IF NOT EXISTS schema_migrations (version int PRIMARY KEY, applied_at bigint NOT NULL)"#,
];

/// Relational Store backed by Postgres. Every `Lock{Kind}` is an atomic
/// conditional `UPDATE ... WHERE lock_by IS NULL OR lock_by = $holder OR
/// lock_expires_at <= $now`, checked via `rows_affected()` — the same
/// idiom used for every lockable kind, never an in-process mutex.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for (i, stmt) in MIGRATIONS.iter().enumerate() {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(format!("migration {i}: {e}")))?;
        }
        Ok(())
    }
}

fn lease_from_row(by: Option<String>, at: i64, expires_at: i64) -> Lease {
    Lease { by, at, expires_at }
}

async fn generic_lock(
    pool: &PgPool,
    table: &str,
    id: &str,
    holder: &str,
    now: i64,
    ttl_nanos: i64,
) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {table} SET lock_by = $1, lock_at = $2, lock_expires_at = $3
         WHERE id = $4 AND (lock_by IS NULL OR lock_by = $1 OR lock_expires_at <= $2)"
    );
    let result = sqlx::query(&sql)
        .bind(holder)
        .bind(now)
        .bind(now + ttl_nanos)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    Ok(result.rows_affected() == 1)
}

async fn generic_unlock(
    pool: &PgPool,
    table: &str,
    id: &str,
    holder: &str,
    force: bool,
) -> Result<bool, StoreError> {
    let sql = if force {
        format!("UPDATE {table} SET lock_by = NULL, lock_at = 0, lock_expires_at = 0 WHERE id = $1")
    } else {
        format!(
            "UPDATE {table} SET lock_by = NULL, lock_at = 0, lock_expires_at = 0
             WHERE id = $1 AND lock_by = $2"
        )
    };
    let mut query = sqlx::query(&sql).bind(id);
    if !force {
        query = query.bind(holder);
    }
    let result = query
        .execute(pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_cluster(&self, id: &ClusterId) -> Result<Option<Cluster>, StoreError> {
        let row = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM clusters WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let mut cluster: Cluster = serde_json::from_value(row.get("data"))?;
        cluster.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
        Ok(Some(cluster))
    }

    async fn get_clusters(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, StoreError> {
        let mut sql = String::from(
            "SELECT data, lock_by, lock_at, lock_expires_at FROM clusters WHERE ($1 OR delete_at = 0)",
        );
        if filter.state.is_some() {
            sql.push_str(" AND state = $2");
        }
        sql.push_str(" ORDER BY create_at ASC, id ASC");
        if let Some(limit) = filter.page.limit() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.page.offset()));
        }
        let mut query = sqlx::query(&sql).bind(filter.page.include_deleted);
        if let Some(state) = filter.state {
            query = query.bind(state.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cluster: Cluster = serde_json::from_value(row.get("data"))?;
            cluster.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            if cluster.annotations_match(&filter.annotations) {
                out.push(cluster);
            }
        }
        Ok(out)
    }

    async fn create_cluster(&self, mut cluster: Cluster) -> Result<Cluster, StoreError> {
        cluster.create_at = strata_domain::time::now();
        let data = serde_json::to_value(&cluster)?;
        sqlx::query(
            "INSERT INTO clusters (id, state, allow_installations, api_security_lock, annotations, create_at, delete_at, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(cluster.id.as_str())
        .bind(cluster.state.as_str())
        .bind(cluster.allow_installations)
        .bind(cluster.api_security_lock)
        .bind(serde_json::to_value(&cluster.annotations)?)
        .bind(cluster.create_at)
        .bind(cluster.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(cluster)
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), StoreError> {
        let data = serde_json::to_value(cluster)?;
        sqlx::query(
            "UPDATE clusters SET state = $2, allow_installations = $3, api_security_lock = $4,
             annotations = $5, delete_at = $6, data = $7 WHERE id = $1",
        )
        .bind(cluster.id.as_str())
        .bind(cluster.state.as_str())
        .bind(cluster.allow_installations)
        .bind(cluster.api_security_lock)
        .bind(serde_json::to_value(&cluster.annotations)?)
        .bind(cluster.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_cluster(&self, id: &ClusterId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE clusters SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_cluster(&self, id: &ClusterId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "clusters", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_cluster(&self, id: &ClusterId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "clusters", id.as_str(), holder, force).await
    }

    async fn cluster_api_lock(&self, id: &ClusterId, locked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE clusters SET api_security_lock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_installation(&self, id: &InstallationId) -> Result<Option<Installation>, StoreError> {
        let row = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM installations WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let mut installation: Installation = serde_json::from_value(row.get("data"))?;
        installation.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
        Ok(Some(installation))
    }

    async fn get_installations(&self, filter: &InstallationFilter) -> Result<Vec<Installation>, StoreError> {
        let mut sql = String::from(
            "SELECT data, lock_by, lock_at, lock_expires_at FROM installations WHERE ($1 OR delete_at = 0)",
        );
        if filter.state.is_some() {
            sql.push_str(" AND state = $2");
        }
        if filter.owner_id.is_some() {
            sql.push_str(" AND owner_id = $3");
        }
        if filter.dns.is_some() {
            sql.push_str(" AND lower(dns) = lower($4)");
        }
        sql.push_str(" ORDER BY create_at ASC, id ASC");
        if let Some(limit) = filter.page.limit() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.page.offset()));
        }
        let mut query = sqlx::query(&sql).bind(filter.page.include_deleted);
        if let Some(state) = filter.state {
            query = query.bind(state.as_str());
        } else {
            query = query.bind(Option::<String>::None);
        }
        query = query.bind(filter.owner_id.clone());
        query = query.bind(filter.dns.clone());
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut installation: Installation = serde_json::from_value(row.get("data"))?;
            installation.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            if filter.group_id.as_ref().map(|g| installation.group_id.as_ref() == Some(g)).unwrap_or(true)
                && installation.annotations_match(&filter.annotations)
            {
                out.push(installation);
            }
        }
        Ok(out)
    }

    async fn create_installation(&self, mut installation: Installation) -> Result<Installation, StoreError> {
        installation.create_at = strata_domain::time::now();
        let data = serde_json::to_value(&installation)?;
        sqlx::query(
            "INSERT INTO installations (id, state, owner_id, dns, group_id, api_security_lock,
             deletion_lock, annotations, create_at, delete_at, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(installation.id.as_str())
        .bind(installation.state.as_str())
        .bind(&installation.owner_id)
        .bind(&installation.dns)
        .bind(installation.group_id.as_ref().map(|g| g.as_str().to_string()))
        .bind(installation.api_security_lock)
        .bind(installation.deletion_lock)
        .bind(serde_json::to_value(&installation.annotations)?)
        .bind(installation.create_at)
        .bind(installation.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("installations_dns_ci_idx") {
                StoreError::DuplicateDns(installation.dns.clone())
            } else {
                StoreError::Internal(e.to_string())
            }
        })?;
        Ok(installation)
    }

    async fn update_installation(&self, installation: &Installation) -> Result<(), StoreError> {
        let data = serde_json::to_value(installation)?;
        sqlx::query(
            "UPDATE installations SET state = $2, owner_id = $3, dns = $4, group_id = $5,
             api_security_lock = $6, deletion_lock = $7, annotations = $8, delete_at = $9, data = $10
             WHERE id = $1",
        )
        .bind(installation.id.as_str())
        .bind(installation.state.as_str())
        .bind(&installation.owner_id)
        .bind(&installation.dns)
        .bind(installation.group_id.as_ref().map(|g| g.as_str().to_string()))
        .bind(installation.api_security_lock)
        .bind(installation.deletion_lock)
        .bind(serde_json::to_value(&installation.annotations)?)
        .bind(installation.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_installation(&self, id: &InstallationId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE installations SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_installation(&self, id: &InstallationId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "installations", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_installation(&self, id: &InstallationId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "installations", id.as_str(), holder, force).await
    }

    async fn installation_api_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE installations SET api_security_lock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn installation_deletion_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE installations SET deletion_lock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_cluster_installation(&self, id: &ClusterInstallationId) -> Result<Option<ClusterInstallation>, StoreError> {
        let row = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM cluster_installations WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let mut ci: ClusterInstallation = serde_json::from_value(row.get("data"))?;
        ci.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
        Ok(Some(ci))
    }

    async fn get_cluster_installations(&self, filter: &ClusterInstallationFilter) -> Result<Vec<ClusterInstallation>, StoreError> {
        let mut sql = String::from(
            "SELECT data, lock_by, lock_at, lock_expires_at FROM cluster_installations WHERE ($1 OR delete_at = 0)",
        );
        if filter.cluster_id.is_some() {
            sql.push_str(" AND cluster_id = $2");
        }
        if filter.installation_id.is_some() {
            sql.push_str(" AND installation_id = $3");
        }
        if filter.is_active.is_some() {
            sql.push_str(" AND is_active = $4");
        }
        sql.push_str(" ORDER BY create_at ASC, id ASC");
        if let Some(limit) = filter.page.limit() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.page.offset()));
        }
        let mut query = sqlx::query(&sql).bind(filter.page.include_deleted);
        query = query.bind(filter.cluster_id.as_ref().map(|c| c.as_str().to_string()));
        query = query.bind(filter.installation_id.as_ref().map(|i| i.as_str().to_string()));
        query = query.bind(filter.is_active);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut ci: ClusterInstallation = serde_json::from_value(row.get("data"))?;
            ci.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            if filter.state.map(|s| s.as_str() == ci.state.as_str()).unwrap_or(true) {
                out.push(ci);
            }
        }
        Ok(out)
    }

    async fn create_cluster_installation(&self, mut ci: ClusterInstallation) -> Result<ClusterInstallation, StoreError> {
        ci.create_at = strata_domain::time::now();
        let data = serde_json::to_value(&ci)?;
        sqlx::query(
            "INSERT INTO cluster_installations (id, cluster_id, installation_id, state, is_active,
             api_security_lock, create_at, delete_at, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(ci.id.as_str())
        .bind(ci.cluster_id.as_str())
        .bind(ci.installation_id.as_str())
        .bind(ci.state.as_str())
        .bind(ci.is_active)
        .bind(ci.api_security_lock)
        .bind(ci.create_at)
        .bind(ci.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(ci)
    }

    async fn update_cluster_installation(&self, ci: &ClusterInstallation) -> Result<(), StoreError> {
        let data = serde_json::to_value(ci)?;
        sqlx::query(
            "UPDATE cluster_installations SET state = $2, is_active = $3, api_security_lock = $4,
             delete_at = $5, data = $6 WHERE id = $1",
        )
        .bind(ci.id.as_str())
        .bind(ci.state.as_str())
        .bind(ci.is_active)
        .bind(ci.api_security_lock)
        .bind(ci.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_cluster_installation(&self, id: &ClusterInstallationId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE cluster_installations SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_cluster_installation(&self, id: &ClusterInstallationId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "cluster_installations", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_cluster_installation(&self, id: &ClusterInstallationId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "cluster_installations", id.as_str(), holder, force).await
    }

    async fn cluster_installation_api_lock(&self, id: &ClusterInstallationId, locked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE cluster_installations SET api_security_lock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn swap_active_cluster_installation(
        &self,
        deactivate: &ClusterInstallationId,
        activate: &ClusterInstallationId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        sqlx::query("UPDATE cluster_installations SET is_active = false WHERE id = $1")
            .bind(deactivate.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        sqlx::query("UPDATE cluster_installations SET is_active = true WHERE id = $1")
            .bind(activate.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM groups WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let mut group: Group = serde_json::from_value(row.get("data"))?;
        group.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
        Ok(Some(group))
    }

    async fn get_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError> {
        let mut sql = String::from("SELECT data, lock_by, lock_at, lock_expires_at FROM groups WHERE ($1 OR delete_at = 0) ORDER BY id ASC");
        if let Some(limit) = filter.page.limit() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.page.offset()));
        }
        let rows = sqlx::query(&sql)
            .bind(filter.page.include_deleted)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut group: Group = serde_json::from_value(row.get("data"))?;
            group.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            out.push(group);
        }
        Ok(out)
    }

    async fn create_group(&self, group: Group) -> Result<Group, StoreError> {
        let data = serde_json::to_value(&group)?;
        sqlx::query(
            "INSERT INTO groups (id, sequence, api_security_lock, delete_at, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(group.id.as_str())
        .bind(group.sequence as i64)
        .bind(group.api_security_lock)
        .bind(group.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(group)
    }

    async fn update_group(&self, group: &Group) -> Result<(), StoreError> {
        let data = serde_json::to_value(group)?;
        sqlx::query(
            "UPDATE groups SET sequence = $2, api_security_lock = $3, delete_at = $4, data = $5 WHERE id = $1",
        )
        .bind(group.id.as_str())
        .bind(group.sequence as i64)
        .bind(group.api_security_lock)
        .bind(group.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_group(&self, id: &GroupId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE groups SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_group(&self, id: &GroupId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "groups", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_group(&self, id: &GroupId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "groups", id.as_str(), holder, force).await
    }

    async fn group_api_lock(&self, id: &GroupId, locked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE groups SET api_security_lock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_multitenant_database(&self, id: &MultitenantDatabaseId) -> Result<Option<MultitenantDatabase>, StoreError> {
        let row = sqlx::query("SELECT data FROM multitenant_databases WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(match row {
            Some(row) => Some(serde_json::from_value(row.get("data"))?),
            None => None,
        })
    }

    async fn get_multitenant_databases(&self) -> Result<Vec<MultitenantDatabase>, StoreError> {
        let rows = sqlx::query("SELECT data FROM multitenant_databases ORDER BY create_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter()
            .map(|r| Ok(serde_json::from_value(r.get("data"))?))
            .collect()
    }

    async fn create_multitenant_database(&self, db: MultitenantDatabase) -> Result<MultitenantDatabase, StoreError> {
        let data = serde_json::to_value(&db)?;
        sqlx::query(
            "INSERT INTO multitenant_databases (id, cluster_id, create_at, delete_at, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(db.id.as_str())
        .bind(db.cluster_id.as_str())
        .bind(db.create_at)
        .bind(db.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(db)
    }

    async fn delete_multitenant_database(&self, id: &MultitenantDatabaseId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE multitenant_databases SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_logical_database(&self, id: &LogicalDatabaseId) -> Result<Option<LogicalDatabase>, StoreError> {
        let row = sqlx::query("SELECT data FROM logical_databases WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(match row {
            Some(row) => Some(serde_json::from_value(row.get("data"))?),
            None => None,
        })
    }

    async fn get_logical_databases(&self, multitenant_database_id: Option<&MultitenantDatabaseId>) -> Result<Vec<LogicalDatabase>, StoreError> {
        let rows = match multitenant_database_id {
            Some(id) => sqlx::query("SELECT data FROM logical_databases WHERE multitenant_database_id = $1")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT data FROM logical_databases").fetch_all(&self.pool).await,
        }
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter()
            .map(|r| Ok(serde_json::from_value(r.get("data"))?))
            .collect()
    }

    async fn create_logical_database(&self, db: LogicalDatabase) -> Result<LogicalDatabase, StoreError> {
        let data = serde_json::to_value(&db)?;
        sqlx::query(
            "INSERT INTO logical_databases (id, multitenant_database_id, create_at, delete_at, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(db.id.as_str())
        .bind(db.multitenant_database_id.as_str())
        .bind(db.create_at)
        .bind(db.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(db)
    }

    async fn delete_logical_database(&self, id: &LogicalDatabaseId, now: i64) -> Result<(), StoreError> {
        let live: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM database_schemas WHERE logical_database_id = $1 AND delete_at = 0",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        if live > 0 {
            return Err(StoreError::ReferentialConstraint("logical database has live schemas".into()));
        }
        sqlx::query("UPDATE logical_databases SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_database_schema(&self, id: &DatabaseSchemaId) -> Result<Option<DatabaseSchema>, StoreError> {
        let row = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM database_schemas WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let mut schema: DatabaseSchema = serde_json::from_value(row.get("data"))?;
        schema.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
        Ok(Some(schema))
    }

    async fn get_database_schemas(&self, logical_database_id: Option<&LogicalDatabaseId>) -> Result<Vec<DatabaseSchema>, StoreError> {
        let rows = match logical_database_id {
            Some(id) => sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM database_schemas WHERE logical_database_id = $1")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM database_schemas")
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut schema: DatabaseSchema = serde_json::from_value(row.get("data"))?;
            schema.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            out.push(schema);
        }
        Ok(out)
    }

    async fn create_database_schema(&self, schema: DatabaseSchema) -> Result<DatabaseSchema, StoreError> {
        let data = serde_json::to_value(&schema)?;
        sqlx::query(
            "INSERT INTO database_schemas (id, logical_database_id, installation_id, state, create_at, delete_at, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(schema.id.as_str())
        .bind(schema.logical_database_id.as_str())
        .bind(schema.installation_id.as_str())
        .bind(schema.state.as_str())
        .bind(schema.create_at)
        .bind(schema.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(schema)
    }

    async fn update_database_schema(&self, schema: &DatabaseSchema) -> Result<(), StoreError> {
        let data = serde_json::to_value(schema)?;
        sqlx::query("UPDATE database_schemas SET state = $2, delete_at = $3, data = $4 WHERE id = $1")
            .bind(schema.id.as_str())
            .bind(schema.state.as_str())
            .bind(schema.delete_at)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_database_schema(&self, id: &DatabaseSchemaId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE database_schemas SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_database_schema(&self, id: &DatabaseSchemaId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "database_schemas", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_database_schema(&self, id: &DatabaseSchemaId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "database_schemas", id.as_str(), holder, force).await
    }

    async fn get_backups_for_installation(&self, installation_id: &InstallationId) -> Result<Vec<Backup>, StoreError> {
        let rows = sqlx::query("SELECT data, lock_by, lock_at, lock_expires_at FROM backups WHERE installation_id = $1")
            .bind(installation_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut backup: Backup = serde_json::from_value(row.get("data"))?;
            backup.lock = lease_from_row(row.get("lock_by"), row.get("lock_at"), row.get("lock_expires_at"));
            out.push(backup);
        }
        Ok(out)
    }

    async fn create_backup(&self, backup: Backup) -> Result<Backup, StoreError> {
        let data = serde_json::to_value(&backup)?;
        sqlx::query(
            "INSERT INTO backups (id, installation_id, state, create_at, delete_at, data) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(backup.id.as_str())
        .bind(backup.installation_id.as_str())
        .bind(backup.state.as_str())
        .bind(backup.create_at)
        .bind(backup.delete_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(backup)
    }

    async fn update_backup(&self, backup: &Backup) -> Result<(), StoreError> {
        let data = serde_json::to_value(backup)?;
        sqlx::query("UPDATE backups SET state = $2, delete_at = $3, data = $4 WHERE id = $1")
            .bind(backup.id.as_str())
            .bind(backup.state.as_str())
            .bind(backup.delete_at)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn lock_backup(&self, id: &BackupId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
        generic_lock(&self.pool, "backups", id.as_str(), holder, strata_domain::time::now(), ttl_nanos).await
    }

    async fn unlock_backup(&self, id: &BackupId, holder: &str, force: bool) -> Result<bool, StoreError> {
        generic_unlock(&self.pool, "backups", id.as_str(), holder, force).await
    }

    async fn get_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, StoreError> {
        let row = sqlx::query("SELECT data FROM webhooks WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(match row {
            Some(row) => Some(serde_json::from_value(row.get("data"))?),
            None => None,
        })
    }

    async fn get_webhooks(&self, owner_id: Option<&str>) -> Result<Vec<Webhook>, StoreError> {
        let rows = match owner_id {
            Some(o) => sqlx::query("SELECT data FROM webhooks WHERE delete_at = 0 AND owner_id = $1")
                .bind(o)
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT data FROM webhooks WHERE delete_at = 0").fetch_all(&self.pool).await,
        }
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter()
            .map(|r| Ok(serde_json::from_value(r.get("data"))?))
            .collect()
    }

    async fn create_webhook(&self, webhook: Webhook) -> Result<Webhook, StoreError> {
        let data = serde_json::to_value(&webhook)?;
        sqlx::query("INSERT INTO webhooks (id, owner_id, create_at, delete_at, data) VALUES ($1, $2, $3, $4, $5)")
            .bind(webhook.id.as_str())
            .bind(&webhook.owner_id)
            .bind(webhook.create_at)
            .bind(webhook.delete_at)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(webhook)
    }

    async fn delete_webhook(&self, id: &WebhookId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE webhooks SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>, StoreError> {
        let row = sqlx::query("SELECT data FROM subscriptions WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(match row {
            Some(row) => Some(serde_json::from_value(row.get("data"))?),
            None => None,
        })
    }

    async fn get_subscriptions(&self, owner_id: Option<&str>) -> Result<Vec<Subscription>, StoreError> {
        let rows = match owner_id {
            Some(o) => sqlx::query("SELECT data FROM subscriptions WHERE delete_at = 0 AND owner_id = $1")
                .bind(o)
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT data FROM subscriptions WHERE delete_at = 0").fetch_all(&self.pool).await,
        }
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter()
            .map(|r| Ok(serde_json::from_value(r.get("data"))?))
            .collect()
    }

    async fn create_subscription(&self, subscription: Subscription) -> Result<Subscription, StoreError> {
        let data = serde_json::to_value(&subscription)?;
        sqlx::query("INSERT INTO subscriptions (id, owner_id, create_at, delete_at, data) VALUES ($1, $2, $3, $4, $5)")
            .bind(subscription.id.as_str())
            .bind(&subscription.owner_id)
            .bind(subscription.create_at)
            .bind(subscription.delete_at)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(subscription)
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let data = serde_json::to_value(subscription)?;
        sqlx::query("UPDATE subscriptions SET delete_at = $2, data = $3 WHERE id = $1")
            .bind(subscription.id.as_str())
            .bind(subscription.delete_at)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_subscription(&self, id: &SubscriptionId, now: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscriptions SET delete_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn append_event(&self, event: Event) -> Result<Event, StoreError> {
        let data = serde_json::to_value(&event)?;
        let sequence: i64 = sqlx::query_scalar(
            "INSERT INTO events (id, event_type, subject_id, timestamp, data) VALUES ($1, $2, $3, $4, $5)
             RETURNING sequence",
        )
        .bind(event.id.as_str())
        .bind(&event.event_type)
        .bind(&event.subject_id)
        .bind(event.timestamp)
        .bind(data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Event { sequence: sequence as u64, ..event })
    }

    async fn get_events(&self, filter: &EventsFilter) -> Result<Vec<Event>, StoreError> {
        let mut sql = String::from("SELECT data, sequence FROM events WHERE true");
        if filter.subject_id.is_some() {
            sql.push_str(" AND subject_id = $1");
        }
        if filter.after_sequence.is_some() {
            sql.push_str(" AND sequence > $2");
        }
        sql.push_str(" ORDER BY sequence ASC");
        if let Some(limit) = filter.page.limit() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.page.offset()));
        }
        let mut query = sqlx::query(&sql);
        query = query.bind(filter.subject_id.clone().unwrap_or_default());
        query = query.bind(filter.after_sequence.map(|s| s as i64).unwrap_or(0));
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut event: Event = serde_json::from_value(row.get("data"))?;
            let sequence: i64 = row.get("sequence");
            event.sequence = sequence as u64;
            if filter.event_type.as_deref().map(|t| t == event.event_type).unwrap_or(true) {
                out.push(event);
            }
        }
        Ok(out)
    }
}
