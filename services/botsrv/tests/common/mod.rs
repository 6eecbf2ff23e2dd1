//! Shared fixtures for botsrv integration tests

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use botsrv::config::Settings;
use botsrv::integrations::{
    GridStore, MemoryGridStore, MemoryTableStore, RecordingNotifier, WriteSummary,
};
use botsrv::seatalk::MessageSender;
use botsrv::stuckup::monitor::MonitorConfig;
use botsrv::stuckup::{Stuckup, StuckupDeps, StuckupMonitor};
use botsrv::{BotError, Result};

pub const SOURCE_ID: &str = "source-sheet";
pub const TARGET_ID: &str = "target-sheet";
pub const SOURCE_WS: &str = "Source";
pub const TARGET_WS: &str = "Stuckup";
pub const LOG_WS: &str = "Sync Log";
pub const DASHBOARD_WS: &str = "Dashboard";

pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter().map(|r| row(r)).collect()
}

/// Header plus two `SOC_Packed` rows (ids 1 and 3) and one filtered-out row
pub fn source_rows() -> Vec<Vec<String>> {
    grid(&[
        &["ID", "Status Desc", "Hub", "Notes"],
        &["1", "SOC_Packed", "North", "a"],
        &["2", "Other", "South", "b"],
        &["3", "SOC_Packed", "East", ""],
    ])
}

/// Settings pointing every local file into `dir`
pub fn test_settings(dir: &TempDir) -> Settings {
    let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
    let credentials = dir.path().join("service_account.json");
    std::fs::write(&credentials, "{}").unwrap();

    Settings {
        google_service_account_file: credentials.to_string_lossy().into_owned(),
        stuckup_source_spreadsheet_id: SOURCE_ID.to_string(),
        stuckup_source_worksheet_name: SOURCE_WS.to_string(),
        stuckup_source_range: "A1:D".to_string(),
        stuckup_target_spreadsheet_id: TARGET_ID.to_string(),
        stuckup_target_worksheet_name: TARGET_WS.to_string(),
        stuckup_export_ranges: "A1:C".to_string(),
        stuckup_sync_log_worksheet_name: LOG_WS.to_string(),
        supabase_stuckup_conflict_column: "id".to_string(),
        stuckup_dashboard_worksheet_name: DASHBOARD_WS.to_string(),
        stuckup_dashboard_capture_worksheet_name: DASHBOARD_WS.to_string(),
        stuckup_dashboard_alert_worksheet_name: DASHBOARD_WS.to_string(),
        stuckup_dashboard_stabilize_retries: 0,
        stuckup_dashboard_stabilize_delay_ms: 0,
        stuckup_raw_backup_path: path("stuckup/raw_full.jsonl"),
        stuckup_state_path: path("stuckup/reference_row_state.txt"),
        stuckup_data_hash_path: path("stuckup/data_hash.txt"),
        stuckup_schedule_state_path: path("stuckup/last_scheduled_sync.txt"),
        stuckup_dashboard_alert_state_path: path("stuckup/dashboard_alert_state.txt"),
        ..Settings::default()
    }
}

/// In-memory collaborators wired into a full stuckup subsystem
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
    pub grid: Arc<MemoryGridStore>,
    pub table: Arc<MemoryTableStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub stuckup: Stuckup,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    /// Adjust settings before wiring
    pub fn with(adjust: impl FnOnce(&mut Settings)) -> Self {
        Self::build(adjust, MemoryTableStore::new(), RecordingNotifier::new())
    }

    pub fn build(
        adjust: impl FnOnce(&mut Settings),
        table: MemoryTableStore,
        notifier: RecordingNotifier,
    ) -> Self {
        Self::build_with_grid(adjust, table, notifier, |grid| grid)
    }

    /// Like `build`, with the grid seen by the subsystem wrapped by `wrap`
    pub fn build_with_grid(
        adjust: impl FnOnce(&mut Settings),
        table: MemoryTableStore,
        notifier: RecordingNotifier,
        wrap: impl FnOnce(Arc<dyn GridStore>) -> Arc<dyn GridStore>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(&dir);
        adjust(&mut settings);

        let grid = Arc::new(MemoryGridStore::new());
        grid.set_sheet(SOURCE_ID, SOURCE_WS, source_rows());
        let table = Arc::new(table);
        let notifier = Arc::new(notifier);

        let deps = StuckupDeps::new(&settings, wrap(grid.clone()), table.clone(), notifier.clone());
        let stuckup = Stuckup::build(&settings, deps).unwrap();
        Self {
            dir,
            settings,
            grid,
            table,
            notifier,
            stuckup,
        }
    }

    pub fn monitor(&self) -> StuckupMonitor {
        StuckupMonitor::new(
            &self.stuckup,
            MonitorConfig::from_settings(&self.settings).unwrap(),
        )
    }

    /// Target worksheet as the Sheets API would return it
    pub async fn target(&self) -> Vec<Vec<String>> {
        self.grid.read(TARGET_ID, TARGET_WS, "A1:Z").await.unwrap()
    }

    pub async fn sync_log(&self) -> Vec<Vec<String>> {
        self.grid.read(TARGET_ID, LOG_WS, "A1:B").await.unwrap()
    }
}

/// Grid whose reads of one exact range always fail
pub struct FailingRangeGrid {
    inner: Arc<dyn GridStore>,
    range: String,
}

impl FailingRangeGrid {
    pub fn wrap(inner: Arc<dyn GridStore>, range: &str) -> Arc<dyn GridStore> {
        Arc::new(Self {
            inner,
            range: range.to_string(),
        })
    }
}

#[async_trait]
impl GridStore for FailingRangeGrid {
    async fn read(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        cell_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        if cell_range == self.range {
            return Err(BotError::Internal(format!("{} read timed out", cell_range)));
        }
        self.inner.read(spreadsheet_id, worksheet, cell_range).await
    }

    async fn clear(&self, spreadsheet_id: &str, worksheet: &str, cell_range: &str) -> Result<()> {
        self.inner.clear(spreadsheet_id, worksheet, cell_range).await
    }

    async fn write(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        start_cell: &str,
        rows: &[Vec<String>],
    ) -> Result<WriteSummary> {
        self.inner.write(spreadsheet_id, worksheet, start_cell, rows).await
    }

    async fn ensure_min_size(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        min_rows: usize,
        min_columns: usize,
    ) -> Result<()> {
        self.inner
            .ensure_min_size(spreadsheet_id, worksheet, min_rows, min_columns)
            .await
    }
}

/// Message sender that records replies
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String, Option<String>)>>,
}

impl RecordingSender {
    /// `(employee_code, content, thread_id)` triples
    pub fn sent(&self) -> Vec<(String, String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text_message(
        &self,
        employee_code: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push((
            employee_code.to_string(),
            content.to_string(),
            thread_id.map(str::to_string),
        ));
        Ok(())
    }
}
