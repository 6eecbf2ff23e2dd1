//! Stuckup shipment synchronization
//!
//! Source worksheet rows flow through the table store into the target
//! worksheet; a background monitor decides when to run a sync and raises an
//! edge-triggered alert from the dashboard.

pub mod alert;
pub mod columns;
pub mod dashboard;
pub mod fingerprint;
pub mod monitor;
pub mod state_store;
pub mod sync_engine;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::integrations::{GridStore, NotificationSink, TableStore};

pub use alert::{AlertCheck, AlertConfig, AlertStatus, DashboardAlert};
pub use dashboard::{Dashboard, DashboardConfig};
pub use monitor::{MonitorStatus, StuckupMonitor};
pub use state_store::{FallbackStateStore, StateStore};
pub use sync_engine::{SyncConfig, SyncEngine, SyncResult, SyncStatus};

// Checkpoint keys shared by the remote state table and the local files
pub const REFERENCE_FINGERPRINT_KEY: &str = "reference_row_fingerprint";
pub const DATA_HASH_KEY: &str = "stuckup_data_hash";
pub const LAST_SCHEDULED_SYNC_KEY: &str = "stuckup_last_scheduled_sync_ts";
pub const ALERT_TRIGGER_KEY: &str = "stuckup_dashboard_alert_trigger_value";

/// Collaborators the stuckup subsystem runs against
#[derive(Clone)]
pub struct StuckupDeps {
    pub grid: Arc<dyn GridStore>,
    pub table: Arc<dyn TableStore>,
    pub state: Arc<dyn StateStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl StuckupDeps {
    /// Wire the state facade over `table` with local files from `settings`
    pub fn new(
        settings: &Settings,
        grid: Arc<dyn GridStore>,
        table: Arc<dyn TableStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let state: Arc<dyn StateStore> =
            Arc::new(FallbackStateStore::from_settings(settings, table.clone()));
        Self {
            grid,
            table,
            state,
            notifier,
        }
    }
}

/// Fully wired engine, dashboard and alert built from one set of collaborators
pub struct Stuckup {
    pub dashboard: Arc<Dashboard>,
    pub engine: Arc<SyncEngine>,
    pub alert: Arc<DashboardAlert>,
    pub deps: StuckupDeps,
}

impl Stuckup {
    pub fn build(settings: &Settings, deps: StuckupDeps) -> Result<Self> {
        let dashboard = Arc::new(Dashboard::new(
            deps.grid.clone(),
            DashboardConfig::from_settings(settings),
        ));
        let engine = Arc::new(SyncEngine::new(
            deps.grid.clone(),
            deps.table.clone(),
            deps.state.clone(),
            dashboard.clone(),
            SyncConfig::from_settings(settings)?,
        ));
        let alert = Arc::new(DashboardAlert::new(
            deps.grid.clone(),
            deps.state.clone(),
            deps.notifier.clone(),
            dashboard.clone(),
            AlertConfig::from_settings(settings)?,
        ));
        Ok(Self {
            dashboard,
            engine,
            alert,
            deps,
        })
    }
}
