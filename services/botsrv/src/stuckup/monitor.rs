//! Background stuckup monitor
//!
//! One long-lived task runs a tick, then waits for the poll interval or the
//! stop signal. A tick runs the enabled trigger paths (reference-row change,
//! fixed schedule), refreshes the dashboard summary and evaluates the alert.
//! A failing or panicking tick is recorded in the status and the loop goes on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::alert::{AlertStatus, DashboardAlert};
use super::columns::column_letter;
use super::dashboard::Dashboard;
use super::fingerprint::row_fingerprint;
use super::state_store::StateStore;
use super::sync_engine::{SyncEngine, SyncResult};
use super::{Stuckup, LAST_SCHEDULED_SYNC_KEY, REFERENCE_FINGERPRINT_KEY};
use crate::clock::now_local;
use crate::config::{Settings, SyncMode};
use crate::error::{BotError, Result};
use crate::integrations::{GridStore, Outcome};

const FALLBACK_LAST_COLUMN: &str = "ZZ";

/// Single-row range at `row` spanning the columns of `source_range`
pub fn reference_range(source_range: &str, row: u32) -> String {
    match crate::integrations::grid::A1Range::parse(source_range) {
        Some(range) => {
            let last = range
                .last_column()
                .map(column_letter)
                .unwrap_or_else(|| FALLBACK_LAST_COLUMN.to_string());
            format!("{}{row}:{}{row}", column_letter(range.first_column()), last)
        },
        None => format!("A{row}:{FALLBACK_LAST_COLUMN}{row}"),
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub auto_sync_enabled: bool,
    pub mode: SyncMode,
    pub poll_interval: Duration,
    pub scheduled_interval: Duration,
    pub source_spreadsheet_id: String,
    pub target_spreadsheet_id: String,
    pub source_worksheet: String,
    pub reference_range: String,
    /// Required credentials file; `None` when the grid needs none
    pub credentials_file: Option<PathBuf>,
    pub timezone: FixedOffset,
}

impl MonitorConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            auto_sync_enabled: settings.stuckup_auto_sync_enabled,
            mode: settings.sync_mode()?,
            poll_interval: settings.poll_interval(),
            scheduled_interval: settings.scheduled_interval(),
            source_spreadsheet_id: settings.stuckup_source_spreadsheet_id.trim().to_string(),
            target_spreadsheet_id: settings.stuckup_target_spreadsheet_id.trim().to_string(),
            source_worksheet: settings.stuckup_source_worksheet_name.clone(),
            reference_range: reference_range(
                &settings.stuckup_source_range,
                settings.stuckup_reference_row.max(1),
            ),
            credentials_file: Some(PathBuf::from(settings.google_service_account_file.trim())),
            timezone: settings.timezone_offset()?,
        })
    }

    /// Why the monitor cannot start, if anything
    pub fn precondition_failure(&self) -> Option<String> {
        if !self.auto_sync_enabled {
            return Some("STUCKUP_AUTO_SYNC_ENABLED is off".to_string());
        }
        if self.source_spreadsheet_id.is_empty() {
            return Some("STUCKUP_SOURCE_SPREADSHEET_ID is not configured".to_string());
        }
        if self.target_spreadsheet_id.is_empty() {
            return Some("STUCKUP_TARGET_SPREADSHEET_ID is not configured".to_string());
        }
        if let Some(path) = &self.credentials_file {
            if path.as_os_str().is_empty() {
                return Some("GOOGLE_SERVICE_ACCOUNT_FILE is not configured".to_string());
            }
            if !path.is_file() {
                return Some(format!("credentials file not found: {}", path.display()));
            }
        }
        None
    }
}

/// Flat snapshot of what the monitor last did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorStatus {
    /// `idle`, `not_started`, `running` or `stopped`
    pub state: String,
    pub message: Option<String>,
    pub mode: String,
    pub poll_interval_seconds: u64,
    pub reference_range: String,

    pub last_check_at: Option<String>,
    pub last_change_detected_at: Option<String>,
    pub last_scheduled_run_at: Option<String>,
    pub last_error: Option<String>,

    pub last_summary_refresh_at: Option<String>,
    pub last_summary_status: Option<String>,
    pub last_summary_message: Option<String>,

    pub last_sync_at: Option<String>,
    pub last_sync_status: Option<String>,
    pub last_sync_message: Option<String>,
    pub last_sync_source_rows: Option<usize>,
    pub last_sync_upserted_rows: Option<usize>,
    pub last_sync_exported_rows: Option<usize>,
    pub last_sync_exported_columns: Option<usize>,

    pub last_dashboard_alert_check_at: Option<String>,
    pub last_dashboard_alert_sent_at: Option<String>,
    pub last_dashboard_alert_status: Option<String>,
    pub last_dashboard_alert_message: Option<String>,
}

impl MonitorStatus {
    fn record_sync(&mut self, at: &str, result: &SyncResult) {
        self.last_sync_at = Some(at.to_string());
        self.last_sync_status = Some(result.status.to_string());
        self.last_sync_message = Some(result.message.clone());
        self.last_sync_source_rows = Some(result.source_row_count);
        self.last_sync_upserted_rows = Some(result.upserted_row_count);
        self.last_sync_exported_rows = Some(result.exported_row_count);
        self.last_sync_exported_columns = Some(result.exported_column_count);
    }
}

struct MonitorCore {
    grid: Arc<dyn GridStore>,
    state: Arc<dyn StateStore>,
    engine: Arc<SyncEngine>,
    dashboard: Arc<Dashboard>,
    alert: Arc<DashboardAlert>,
    config: MonitorConfig,
    status: RwLock<MonitorStatus>,
}

impl MonitorCore {
    fn now(&self) -> DateTime<FixedOffset> {
        now_local(self.config.timezone)
    }

    async fn update(&self, f: impl FnOnce(&mut MonitorStatus)) {
        let mut status = self.status.write().await;
        f(&mut status);
    }

    async fn tick(&self) {
        let checked_at = self.now().to_rfc3339();
        self.update(|s| s.last_check_at = Some(checked_at)).await;

        self.run_triggers().await;
        self.refresh_summary().await;
        self.check_alert().await;
    }

    /// Row-change and scheduled paths fail independently
    async fn run_triggers(&self) {
        let mut synced = false;
        if self.config.mode.row_change_enabled() {
            match self.check_reference_row().await {
                Ok(ran) => synced = ran,
                Err(e) => self.record_error("reference row check", e).await,
            }
        }
        if self.config.mode.scheduled_enabled() {
            if let Err(e) = self.check_schedule(synced).await {
                self.record_error("scheduled sync check", e).await;
            }
        }
    }

    async fn record_error(&self, stage: &str, error: BotError) {
        warn!("Stuckup monitor {} failed: {}", stage, error);
        let message = error.to_string();
        self.update(|s| s.last_error = Some(message)).await;
    }

    /// Returns whether a sync ran
    async fn check_reference_row(&self) -> Result<bool> {
        let cfg = &self.config;
        let rows = self
            .grid
            .read(&cfg.source_spreadsheet_id, &cfg.source_worksheet, &cfg.reference_range)
            .await?;
        let cells = rows.into_iter().next().unwrap_or_default();
        let fingerprint = row_fingerprint(&cells);

        match self.state.get(REFERENCE_FINGERPRINT_KEY).await {
            Outcome::Ok(None) => {
                self.persist(REFERENCE_FINGERPRINT_KEY, &fingerprint).await;
                info!("Reference row baseline recorded ({})", cfg.reference_range);
                return Ok(false);
            },
            Outcome::Ok(Some(previous)) if previous == fingerprint => {
                debug!("Reference row unchanged");
                return Ok(false);
            },
            Outcome::Ok(Some(_)) => {},
            other => {
                return Err(BotError::Internal(format!(
                    "reference fingerprint read {}: {}",
                    other.label(),
                    other.reason()
                )))
            },
        }

        info!("Reference row changed, starting sync");
        let detected_at = self.now().to_rfc3339();
        self.update(|s| s.last_change_detected_at = Some(detected_at)).await;
        self.persist(REFERENCE_FINGERPRINT_KEY, &fingerprint).await;
        self.run_sync().await;
        Ok(true)
    }

    /// Fire at most once per scheduled interval; a sync already run this tick counts
    async fn check_schedule(&self, already_synced: bool) -> Result<()> {
        let now = self.now();
        let last = match self.state.get(LAST_SCHEDULED_SYNC_KEY).await {
            Outcome::Ok(value) => value,
            other => {
                return Err(BotError::Internal(format!(
                    "scheduled sync timestamp read {}: {}",
                    other.label(),
                    other.reason()
                )))
            },
        };
        let last = last.and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok());
        // A timestamp in the future (clock skew, edited file) counts as due
        let due = match last {
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map_or(true, |elapsed| elapsed >= self.config.scheduled_interval),
            None => true,
        };
        if !due {
            return Ok(());
        }

        let fired_at = now.to_rfc3339();
        self.persist(LAST_SCHEDULED_SYNC_KEY, &fired_at).await;
        self.update(|s| s.last_scheduled_run_at = Some(fired_at)).await;
        if already_synced {
            debug!("Scheduled sync satisfied by this tick's reference-row sync");
        } else {
            info!("Scheduled sync due, starting sync");
            self.run_sync().await;
        }
        Ok(())
    }

    async fn run_sync(&self) {
        let result = self.engine.sync().await;
        let at = self.now().to_rfc3339();
        self.update(|s| s.record_sync(&at, &result)).await;
    }

    async fn refresh_summary(&self) {
        let outcome = self.dashboard.refresh_summary().await;
        let at = self.now().to_rfc3339();
        let (status, message) = match outcome {
            Ok(_) => ("ok".to_string(), "summary refreshed".to_string()),
            Err(e) => {
                warn!("Dashboard summary refresh failed: {}", e);
                ("error".to_string(), e.to_string())
            },
        };
        self.update(|s| {
            s.last_summary_refresh_at = Some(at);
            s.last_summary_status = Some(status);
            s.last_summary_message = Some(message);
        })
        .await;
    }

    async fn check_alert(&self) {
        let check = self.alert.check().await;
        let at = self.now().to_rfc3339();
        self.update(|s| {
            if check.status == AlertStatus::Sent {
                s.last_dashboard_alert_sent_at = Some(at.clone());
            }
            s.last_dashboard_alert_check_at = Some(at);
            s.last_dashboard_alert_status = Some(check.status.to_string());
            s.last_dashboard_alert_message = Some(check.message);
        })
        .await;
    }

    async fn persist(&self, key: &str, value: &str) {
        if let Outcome::Failed(reason) = self.state.set(key, value).await {
            warn!("Checkpoint '{}' not persisted: {}", key, reason);
        }
    }
}

/// Owns the monitor task and its stop signal
pub struct StuckupMonitor {
    core: Arc<MonitorCore>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl StuckupMonitor {
    pub fn new(stuckup: &Stuckup, config: MonitorConfig) -> Self {
        let status = MonitorStatus {
            state: "idle".to_string(),
            mode: config.mode.as_str().to_string(),
            poll_interval_seconds: config.poll_interval.as_secs(),
            reference_range: config.reference_range.clone(),
            ..MonitorStatus::default()
        };
        let core = MonitorCore {
            grid: stuckup.deps.grid.clone(),
            state: stuckup.deps.state.clone(),
            engine: stuckup.engine.clone(),
            dashboard: stuckup.dashboard.clone(),
            alert: stuckup.alert.clone(),
            config,
            status: RwLock::new(status),
        };
        Self {
            core: Arc::new(core),
            running: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> MonitorStatus {
        self.core.status.read().await.clone()
    }

    /// Whether a spawned loop is alive
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Run one tick inline
    pub async fn tick(&self) {
        self.core.tick().await;
    }

    /// Check preconditions once and spawn the loop
    ///
    /// Returns `false` when a precondition failed; the monitor then stays
    /// `not_started` until the process restarts.
    pub async fn start(&self) -> bool {
        if let Some(reason) = self.core.config.precondition_failure() {
            warn!("Stuckup monitor not started: {}", reason);
            self.core
                .update(|s| {
                    s.state = "not_started".to_string();
                    s.message = Some(reason);
                })
                .await;
            return false;
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return true;
        }

        self.core
            .update(|s| {
                s.state = "running".to_string();
                s.message = None;
            })
            .await;
        info!(
            "Stuckup monitor started: mode={}, poll={}s",
            self.core.config.mode.as_str(),
            self.core.config.poll_interval.as_secs()
        );

        // Fresh token per run so the monitor can be restarted after stop()
        let token = CancellationToken::new();
        let core = self.core.clone();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                let tick_core = core.clone();
                // A panicking tick surfaces as a JoinError
                if let Err(e) = tokio::spawn(async move { tick_core.tick().await }).await {
                    error!("Stuckup monitor tick aborted: {}", e);
                    let message = format!("tick aborted: {}", e);
                    core.update(|s| s.last_error = Some(message)).await;
                }

                tokio::select! {
                    () = loop_token.cancelled() => break,
                    () = tokio::time::sleep(core.config.poll_interval) => {},
                }
            }
            debug!("Stuckup monitor loop exited");
        });
        *running = Some((token, handle));
        true
    }

    /// Signal stop and wait for the current tick to finish
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some((token, handle)) = running {
            token.cancel();
            if let Err(e) = handle.await {
                error!("Stuckup monitor task failed: {}", e);
            }
            self.core.update(|s| s.state = "stopped".to_string()).await;
            info!("Stuckup monitor stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_range_follows_source_span() {
        assert_eq!(reference_range("A1:AL", 2), "A2:AL2");
        assert_eq!(reference_range("C5:F100", 7), "C7:F7");
        assert_eq!(reference_range("A:Z", 3), "A3:Z3");
        assert_eq!(reference_range("", 2), "A2:ZZ2");
    }
}
