//! Source sheet -> table store -> target sheet synchronization
//!
//! One `sync()` reads the source range, filters rows by status, upserts them
//! when their content hash changed, deletes stored rows that left the source,
//! and exports the stored rows to the target worksheet. Failures come back as
//! an error `SyncResult` carrying the counts reached so far.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::FixedOffset;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use super::columns::{normalize_headers, ExportColumnSpec, ExportStrategy};
use super::dashboard::Dashboard;
use super::fingerprint::data_hash;
use super::state_store::StateStore;
use super::DATA_HASH_KEY;
use crate::clock::{now_local, run_log_timestamp};
use crate::config::Settings;
use crate::error::Result;
use crate::integrations::{GridStore, Outcome, Record, TableStore};

/// Column holding the status used for filtering
pub const STATUS_COLUMN: &str = "status_desc";

const SYNC_LOG_HEADER: [&str; 2] = ["Timestamp", "Status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Updated,
    NoUpdate,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Updated => "Updated",
            SyncStatus::NoUpdate => "no update",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SyncStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub message: String,
    pub source_row_count: usize,
    pub upserted_row_count: usize,
    pub exported_row_count: usize,
    pub exported_column_count: usize,
}

impl SyncResult {
    fn empty() -> Self {
        Self {
            status: SyncStatus::Error,
            message: String::new(),
            source_row_count: 0,
            upserted_row_count: 0,
            exported_row_count: 0,
            exported_column_count: 0,
        }
    }

    fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = SyncStatus::Error;
        self.message = message.into();
        warn!("Stuckup sync failed: {}", self.message);
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_spreadsheet_id: String,
    pub source_worksheet: String,
    pub source_range: String,
    pub target_spreadsheet_id: String,
    pub target_worksheet: String,
    pub allowed_statuses: HashSet<String>,
    pub export_strategy: ExportStrategy,
    /// 0 = unlimited
    pub target_max_columns: usize,
    pub conflict_column: String,
    pub delete_batch_size: usize,
    pub sync_log_worksheet: String,
    pub sync_log_max_rows: usize,
    pub backup_path: PathBuf,
    pub timezone: FixedOffset,
}

impl SyncConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            source_spreadsheet_id: settings.stuckup_source_spreadsheet_id.trim().to_string(),
            source_worksheet: settings.stuckup_source_worksheet_name.clone(),
            source_range: settings.stuckup_source_range.clone(),
            target_spreadsheet_id: settings.stuckup_target_spreadsheet_id.trim().to_string(),
            target_worksheet: settings.stuckup_target_worksheet_name.clone(),
            allowed_statuses: settings.filter_status_values().into_iter().collect(),
            export_strategy: ExportStrategy::select(
                settings.export_columns(),
                &settings.stuckup_export_ranges,
            ),
            target_max_columns: settings.stuckup_target_max_columns,
            conflict_column: settings.supabase_stuckup_conflict_column.clone(),
            delete_batch_size: settings.supabase_delete_batch_size.max(1),
            sync_log_worksheet: settings.stuckup_sync_log_worksheet_name.clone(),
            sync_log_max_rows: settings.stuckup_sync_log_max_rows.max(1),
            backup_path: PathBuf::from(&settings.stuckup_raw_backup_path),
            timezone: settings.timezone_offset()?,
        })
    }
}

/// Build normalized records from a source read and keep the allowed statuses
///
/// Missing trailing cells read as empty strings.
pub fn filter_records(values: &[Vec<String>], allowed: &HashSet<String>) -> (Vec<String>, Vec<String>, Vec<Record>) {
    let source_headers: Vec<String> = values
        .first()
        .map(|row| row.iter().map(|h| h.trim().to_string()).collect())
        .unwrap_or_default();
    let normalized = normalize_headers(&source_headers);

    let records = values
        .iter()
        .skip(1)
        .map(|row| {
            normalized
                .iter()
                .enumerate()
                .map(|(idx, key)| (key.clone(), row.get(idx).cloned().unwrap_or_default()))
                .collect::<Record>()
        })
        .filter(|record| {
            record
                .get(STATUS_COLUMN)
                .is_some_and(|status| allowed.contains(status))
        })
        .collect();

    (source_headers, normalized, records)
}

pub struct SyncEngine {
    grid: Arc<dyn GridStore>,
    table: Arc<dyn TableStore>,
    state: Arc<dyn StateStore>,
    dashboard: Arc<Dashboard>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        grid: Arc<dyn GridStore>,
        table: Arc<dyn TableStore>,
        state: Arc<dyn StateStore>,
        dashboard: Arc<Dashboard>,
        config: SyncConfig,
    ) -> Self {
        Self {
            grid,
            table,
            state,
            dashboard,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn sync(&self) -> SyncResult {
        let cfg = &self.config;
        let mut result = SyncResult::empty();

        if cfg.source_spreadsheet_id.is_empty() {
            return result.fail("STUCKUP_SOURCE_SPREADSHEET_ID is not configured");
        }
        if cfg.target_spreadsheet_id.is_empty() {
            return result.fail("STUCKUP_TARGET_SPREADSHEET_ID is not configured");
        }

        let values = match self
            .grid
            .read(&cfg.source_spreadsheet_id, &cfg.source_worksheet, &cfg.source_range)
            .await
        {
            Ok(values) => values,
            Err(e) => return result.fail(format!("source sheet read failed: {}", e)),
        };
        if values.is_empty() {
            return result.fail("source sheet is empty");
        }

        let (source_headers, normalized, records) = filter_records(&values, &cfg.allowed_statuses);
        result.source_row_count = records.len();
        info!(
            "Stuckup source read: {} rows, {} kept after status filter",
            values.len().saturating_sub(1),
            records.len()
        );

        if let Err(e) = self.write_backup(&records).await {
            warn!("Raw backup write failed ({}): {}", cfg.backup_path.display(), e);
        }

        // Upsert only when the filtered content changed
        let hash = data_hash(&records);
        let previous_hash = self.state.get(DATA_HASH_KEY).await.ok().flatten();
        let mut status = if previous_hash.as_deref() == Some(hash.as_str()) {
            info!("Stuckup data unchanged, skipping upsert");
            SyncStatus::NoUpdate
        } else {
            match self.table.upsert(&records, &cfg.conflict_column).await {
                Outcome::Ok(count) => {
                    result.upserted_row_count = count;
                    SyncStatus::Updated
                },
                other => {
                    return result.fail(format!("store upsert {}: {}", other.label(), other.reason()))
                },
            }
        };

        let mut spec = match ExportColumnSpec::resolve(&cfg.export_strategy, &source_headers, &normalized) {
            Ok(spec) => spec,
            Err(e) => return result.fail(e.to_string()),
        };
        let dropped = spec.truncate(cfg.target_max_columns);
        if dropped > 0 {
            warn!(
                "Target accepts at most {} columns, dropped {} export column(s)",
                cfg.target_max_columns, dropped
            );
        }
        result.exported_column_count = spec.len();

        let mut canonical = match self.fetch_canonical().await {
            Ok(rows) => rows,
            Err(e) => return result.fail(e),
        };

        // Rows that left the source are removed before export
        let source_keys: HashSet<&str> = records
            .iter()
            .filter_map(|r| r.get(&cfg.conflict_column).map(String::as_str))
            .collect();
        let stale: Vec<String> = canonical
            .iter()
            .filter_map(|row| row.get(&cfg.conflict_column))
            .filter(|key| !source_keys.contains(key.as_str()))
            .cloned()
            .collect();
        if !stale.is_empty() {
            match self
                .table
                .delete_where_in(&cfg.conflict_column, &stale, cfg.delete_batch_size)
                .await
            {
                Outcome::Ok(count) => info!("Deleted {} stale stuckup row(s)", count),
                other => {
                    return result.fail(format!("store delete {}: {}", other.label(), other.reason()))
                },
            }
            status = SyncStatus::Updated;
            canonical = match self.fetch_canonical().await {
                Ok(rows) => rows,
                Err(e) => return result.fail(e),
            };
        }

        if let Err(e) = self.append_run_log(status).await {
            return result.fail(format!("sync log write failed: {}", e));
        }

        let mut export = Vec::with_capacity(canonical.len() + 1);
        export.push(spec.headers());
        export.extend(canonical.iter().map(|row| spec.project(row)));
        if let Err(e) = self.write_target(&spec, &export).await {
            return result.fail(format!("target sheet write failed: {}", e));
        }
        result.exported_row_count = canonical.len();

        if let Err(e) = self.dashboard.refresh_summary().await {
            return result.fail(format!("dashboard summary refresh failed: {}", e));
        }

        if let Outcome::Failed(reason) = self.state.set(DATA_HASH_KEY, &hash).await {
            warn!("Data hash not persisted: {}", reason);
        }

        result.status = status;
        result.message = match status {
            SyncStatus::NoUpdate => "no data changes; target sheet refreshed from store".to_string(),
            _ => "source sheet synced to store and exported to target sheet".to_string(),
        };
        info!(
            "Stuckup sync {}: source={} upserted={} exported={}x{}",
            result.status,
            result.source_row_count,
            result.upserted_row_count,
            result.exported_row_count,
            result.exported_column_count
        );
        result
    }

    async fn fetch_canonical(&self) -> std::result::Result<Vec<Record>, String> {
        match self.table.select_all(Some(&self.config.conflict_column)).await {
            Outcome::Ok(rows) => Ok(rows),
            other => Err(format!("store fetch {}: {}", other.label(), other.reason())),
        }
    }

    async fn write_backup(&self, records: &[Record]) -> Result<()> {
        let path = &self.config.backup_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = String::new();
        for record in records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        tokio::fs::write(path, out).await?;
        Ok(())
    }

    /// Prepend this run to the log worksheet, keeping at most `sync_log_max_rows` entries
    async fn append_run_log(&self, status: SyncStatus) -> Result<()> {
        let cfg = &self.config;
        let window = format!("A2:B{}", cfg.sync_log_max_rows + 1);
        let mut previous = self
            .grid
            .read(&cfg.target_spreadsheet_id, &cfg.sync_log_worksheet, &window)
            .await?;
        previous.truncate(cfg.sync_log_max_rows.saturating_sub(1));

        let mut rows = Vec::with_capacity(previous.len() + 2);
        rows.push(SYNC_LOG_HEADER.iter().map(|s| s.to_string()).collect());
        rows.push(vec![
            run_log_timestamp(now_local(cfg.timezone)),
            status.as_str().to_string(),
        ]);
        rows.extend(previous.into_iter().map(|mut row| {
            row.resize(2, String::new());
            row
        }));

        self.grid
            .write(&cfg.target_spreadsheet_id, &cfg.sync_log_worksheet, "A1", &rows)
            .await?;
        Ok(())
    }

    async fn write_target(&self, spec: &ExportColumnSpec, export: &[Vec<String>]) -> Result<()> {
        let cfg = &self.config;
        self.grid
            .ensure_min_size(
                &cfg.target_spreadsheet_id,
                &cfg.target_worksheet,
                export.len(),
                spec.len(),
            )
            .await?;
        self.grid
            .clear(
                &cfg.target_spreadsheet_id,
                &cfg.target_worksheet,
                &format!("A:{}", spec.last_column_letter()),
            )
            .await?;
        let summary = self
            .grid
            .write(&cfg.target_spreadsheet_id, &cfg.target_worksheet, "A1", export)
            .await?;
        info!(
            "Target sheet '{}' written: {} rows, {} cells",
            cfg.target_worksheet, summary.updated_rows, summary.updated_cells
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_filter_records_keeps_allowed_status() {
        let values = vec![
            row(&["id", "status_desc"]),
            row(&["1", "SOC_Packed"]),
            row(&["2", "Other"]),
        ];
        let allowed: HashSet<String> = ["SOC_Packed".to_string()].into_iter().collect();
        let (_, _, records) = filter_records(&values, &allowed);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id").map(String::as_str), Some("1"));
        assert_eq!(records[0].get("status_desc").map(String::as_str), Some("SOC_Packed"));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_filter_records_pads_short_rows() {
        let values = vec![
            row(&["ID", "Status Desc", "Hub"]),
            row(&["7", "SOC_Packed"]),
        ];
        let allowed: HashSet<String> = ["SOC_Packed".to_string()].into_iter().collect();
        let (headers, normalized, records) = filter_records(&values, &allowed);
        assert_eq!(headers, row(&["ID", "Status Desc", "Hub"]));
        assert_eq!(normalized, row(&["id", "status_desc", "hub"]));
        assert_eq!(records[0].get("hub").map(String::as_str), Some(""));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(SyncStatus::NoUpdate.to_string(), "no update");
        assert_eq!(
            serde_json::to_value(SyncStatus::Updated).ok(),
            Some(serde_json::json!("Updated"))
        );
    }
}
