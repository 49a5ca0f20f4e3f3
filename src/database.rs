// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - PostgreSQL Scan Store
 * Connection-pooled persistence for scans, assets, findings and logs
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::errors::{StoreError, StoreResult};
use crate::store::ScanStore;
use crate::types::{
    DiscoveredAsset, Finding, LogLevel, NewScan, Scan, ScanConfig, ScanLog, ScanStatusUpdate,
};

const SCAN_COLUMNS: &str = "id, project_id, target_url, status, progress, current_action, node, \
     config, created_at, started_at, completed_at, parent_scan_id, last_run_at, next_run_at";

/// PostgreSQL-backed `ScanStore`
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Create the connection pool and verify connectivity
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = Config::new();
        pg_config.url = Some(config.url.clone());
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(config.pool_size));

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create PostgreSQL pool")?;

        let client = pool
            .get()
            .await
            .context("Failed to get connection from pool")?;

        client
            .query("SELECT 1", &[])
            .await
            .context("Failed to test database connection")?;

        info!("[SUCCESS] PostgreSQL connected: pool_size={}", config.pool_size);

        Ok(Self { pool })
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS scans (
                    id UUID PRIMARY KEY,
                    project_id UUID NOT NULL,
                    target_url TEXT NOT NULL,
                    status VARCHAR(32) NOT NULL DEFAULT 'pending',
                    progress SMALLINT NOT NULL DEFAULT 0,
                    current_action TEXT NOT NULL DEFAULT '',
                    node VARCHAR(255),
                    config JSONB NOT NULL,
                    is_scheduled BOOLEAN NOT NULL DEFAULT false,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    started_at TIMESTAMP WITH TIME ZONE,
                    completed_at TIMESTAMP WITH TIME ZONE,
                    parent_scan_id UUID REFERENCES scans(id) ON DELETE SET NULL,
                    last_run_at TIMESTAMP WITH TIME ZONE,
                    next_run_at TIMESTAMP WITH TIME ZONE
                );

                CREATE TABLE IF NOT EXISTS scan_assets (
                    id BIGSERIAL PRIMARY KEY,
                    scan_id UUID NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
                    url TEXT NOT NULL,
                    status_code INT,
                    depth INT NOT NULL DEFAULT 0,
                    discovered_at TIMESTAMP WITH TIME ZONE NOT NULL,
                    UNIQUE (scan_id, url)
                );

                CREATE TABLE IF NOT EXISTS scan_findings (
                    id UUID PRIMARY KEY,
                    scan_id UUID NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
                    analyzer VARCHAR(64) NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    severity VARCHAR(16) NOT NULL,
                    status VARCHAR(32) NOT NULL DEFAULT 'open',
                    cve VARCHAR(32),
                    cwe VARCHAR(32),
                    cvss REAL NOT NULL DEFAULT 0,
                    url TEXT NOT NULL,
                    parameter TEXT,
                    evidence TEXT,
                    remediation TEXT NOT NULL,
                    discovered_at TIMESTAMP WITH TIME ZONE NOT NULL
                );

                CREATE TABLE IF NOT EXISTS scan_logs (
                    id BIGSERIAL PRIMARY KEY,
                    scan_id UUID NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
                    level VARCHAR(8) NOT NULL,
                    message TEXT NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                );

                CREATE INDEX IF NOT EXISTS idx_scans_due
                    ON scans(next_run_at) WHERE is_scheduled;
                CREATE INDEX IF NOT EXISTS idx_scans_parent ON scans(parent_scan_id);
                CREATE INDEX IF NOT EXISTS idx_findings_scan_id ON scan_findings(scan_id);
                CREATE INDEX IF NOT EXISTS idx_findings_severity ON scan_findings(severity);
                CREATE INDEX IF NOT EXISTS idx_logs_scan_id ON scan_logs(scan_id);
                "#,
            )
            .await
            .context("Failed to create scan tables")?;

        info!("[SUCCESS] Database schema initialized");

        Ok(())
    }

    /// Get connection pool stats
    pub fn get_pool_stats(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.size, status.available)
    }
}

fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse::<T>().map_err(StoreError::Corrupt)
}

fn row_to_scan(row: &Row) -> StoreResult<Scan> {
    let status: String = row.try_get("status")?;
    let progress: i16 = row.try_get("progress")?;
    let config: serde_json::Value = row.try_get("config")?;
    let config: ScanConfig =
        serde_json::from_value(config).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Scan {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        target_url: row.try_get("target_url")?,
        status: parse_column(&status)?,
        progress: progress.clamp(0, 100) as u8,
        current_action: row.try_get("current_action")?,
        node: row.try_get("node")?,
        config,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        parent_scan_id: row.try_get("parent_scan_id")?,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
    })
}

fn row_to_finding(row: &Row) -> StoreResult<Finding> {
    let severity: String = row.try_get("severity")?;
    let status: String = row.try_get("status")?;

    Ok(Finding {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        analyzer: row.try_get("analyzer")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        severity: parse_column(&severity)?,
        status: parse_column(&status)?,
        cve: row.try_get("cve")?,
        cwe: row.try_get("cwe")?,
        cvss: row.try_get("cvss")?,
        url: row.try_get("url")?,
        parameter: row.try_get("parameter")?,
        evidence: row.try_get("evidence")?,
        remediation: row.try_get("remediation")?,
        discovered_at: row.try_get("discovered_at")?,
    })
}

#[async_trait]
impl ScanStore for PostgresStore {
    async fn create_scan(&self, new_scan: NewScan) -> StoreResult<Scan> {
        let client = self.pool.get().await?;
        let config = serde_json::to_value(&new_scan.config)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let query = format!(
            "INSERT INTO scans (id, project_id, target_url, status, progress, current_action, \
             config, is_scheduled, parent_scan_id, next_run_at) \
             VALUES ($1, $2, $3, 'pending', 0, 'Pending', $4, $5, $6, $7) \
             RETURNING {}",
            SCAN_COLUMNS
        );

        let row = client
            .query_one(
                query.as_str(),
                &[
                    &Uuid::new_v4(),
                    &new_scan.project_id,
                    &new_scan.target_url,
                    &config,
                    &new_scan.config.is_scheduled,
                    &new_scan.parent_scan_id,
                    &new_scan.next_run_at,
                ],
            )
            .await?;

        row_to_scan(&row)
    }

    async fn get_scan(&self, id: Uuid) -> StoreResult<Option<Scan>> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {} FROM scans WHERE id = $1", SCAN_COLUMNS);

        match client.query_opt(query.as_str(), &[&id]).await? {
            Some(row) => Ok(Some(row_to_scan(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_scan_status(&self, id: Uuid, update: ScanStatusUpdate) -> StoreResult<bool> {
        let client = self.pool.get().await?;
        let status = update.status.map(|s| s.as_str());
        let progress = update.progress.map(|p| p.min(100) as i16);

        // Terminal rows are never touched again; progress only moves forward.
        let rows = client
            .execute(
                r#"
                UPDATE scans SET
                    status = COALESCE($2::text, status),
                    progress = GREATEST(progress, COALESCE($3::smallint, progress)),
                    current_action = COALESCE($4::text, current_action),
                    node = COALESCE($5::text, node),
                    started_at = CASE
                        WHEN $2::text = 'scanning' AND started_at IS NULL THEN NOW()
                        ELSE started_at END,
                    completed_at = CASE
                        WHEN $2::text IN ('completed', 'failed') THEN NOW()
                        ELSE completed_at END
                WHERE id = $1 AND status NOT IN ('completed', 'failed')
                "#,
                &[&id, &status, &progress, &update.current_action, &update.node],
            )
            .await?;

        if rows == 0 {
            debug!("Status update for scan {} ignored (terminal or missing)", id);
        }
        Ok(rows > 0)
    }

    async fn insert_asset(&self, asset: DiscoveredAsset) -> StoreResult<bool> {
        let client = self.pool.get().await?;
        let status_code = asset.status_code.map(i32::from);

        let rows = client
            .execute(
                "INSERT INTO scan_assets (scan_id, url, status_code, depth, discovered_at) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (scan_id, url) DO NOTHING",
                &[
                    &asset.scan_id,
                    &asset.url,
                    &status_code,
                    &(asset.depth as i32),
                    &asset.discovered_at,
                ],
            )
            .await?;

        Ok(rows > 0)
    }

    async fn insert_finding(&self, finding: Finding) -> StoreResult<()> {
        let client = self.pool.get().await?;

        client
            .execute(
                r#"
                INSERT INTO scan_findings (
                    id, scan_id, analyzer, title, description, severity, status, cve, cwe,
                    cvss, url, parameter, evidence, remediation, discovered_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO NOTHING
                "#,
                &[
                    &finding.id,
                    &finding.scan_id,
                    &finding.analyzer,
                    &finding.title,
                    &finding.description,
                    &finding.severity.as_str(),
                    &finding.status.as_str(),
                    &finding.cve,
                    &finding.cwe,
                    &finding.cvss,
                    &finding.url,
                    &finding.parameter,
                    &finding.evidence,
                    &finding.remediation,
                    &finding.discovered_at,
                ],
            )
            .await?;

        Ok(())
    }

    async fn append_log(&self, scan_id: Uuid, level: LogLevel, message: &str) -> StoreResult<()> {
        let client = self.pool.get().await?;

        client
            .execute(
                "INSERT INTO scan_logs (scan_id, level, message) VALUES ($1, $2, $3)",
                &[&scan_id, &level.as_str(), &message],
            )
            .await?;

        Ok(())
    }

    async fn list_due_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Scan>> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {} FROM scans \
             WHERE is_scheduled AND (next_run_at IS NULL OR next_run_at <= $1) \
             ORDER BY next_run_at NULLS FIRST, created_at",
            SCAN_COLUMNS
        );

        let rows = client.query(query.as_str(), &[&now]).await?;
        rows.iter().map(row_to_scan).collect()
    }

    async fn update_template_schedule(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let client = self.pool.get().await?;

        let rows = client
            .execute(
                "UPDATE scans SET last_run_at = $2, next_run_at = $3 \
                 WHERE id = $1 AND is_scheduled",
                &[&id, &last_run_at, &next_run_at],
            )
            .await?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("template {}", id)));
        }
        Ok(())
    }

    async fn list_assets(&self, scan_id: Uuid) -> StoreResult<Vec<DiscoveredAsset>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT scan_id, url, status_code, depth, discovered_at FROM scan_assets \
                 WHERE scan_id = $1 ORDER BY id",
                &[&scan_id],
            )
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<DiscoveredAsset> {
                let status_code: Option<i32> = row.try_get("status_code")?;
                let depth: i32 = row.try_get("depth")?;
                Ok(DiscoveredAsset {
                    scan_id: row.try_get("scan_id")?,
                    url: row.try_get("url")?,
                    status_code: status_code.and_then(|c| u16::try_from(c).ok()),
                    depth: depth.max(0) as u32,
                    discovered_at: row.try_get("discovered_at")?,
                })
            })
            .collect()
    }

    async fn list_findings(&self, scan_id: Uuid) -> StoreResult<Vec<Finding>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT * FROM scan_findings WHERE scan_id = $1 ORDER BY discovered_at",
                &[&scan_id],
            )
            .await?;

        rows.iter().map(row_to_finding).collect()
    }

    async fn list_logs(&self, scan_id: Uuid) -> StoreResult<Vec<ScanLog>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT scan_id, level, message, created_at FROM scan_logs \
                 WHERE scan_id = $1 ORDER BY id",
                &[&scan_id],
            )
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<ScanLog> {
                let level: String = row.try_get("level")?;
                Ok(ScanLog {
                    scan_id: row.try_get("scan_id")?,
                    level: parse_column::<LogLevel>(&level)?,
                    message: row.try_get("message")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanStatus;

    #[test]
    fn test_parse_column_rejects_unknown_status() {
        assert!(matches!(
            parse_column::<ScanStatus>("exploded"),
            Err(StoreError::Corrupt(_))
        ));
        assert_eq!(parse_column::<ScanStatus>("queued").unwrap(), ScanStatus::Queued);
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert!(config.url.starts_with("postgresql://"));
        assert_eq!(config.pool_size, 20);
        assert!(!config.enabled);
    }
}
