//! Service configuration
//!
//! Loaded with figment: built-in defaults, then an optional YAML file, then
//! environment variables. Keys are the lowercased environment names, so
//! `STUCKUP_SYNC_MODE=both` and `stuckup_sync_mode: both` in YAML are equivalent.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use common::serde_helpers::{
    deserialize_bool_flexible, deserialize_string_lossy, deserialize_u64_flexible,
};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::clock::parse_utc_offset;
use crate::error::{BotError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/botsrv.yaml";
pub const CONFIG_PATH_ENV: &str = "BOTSRV_CONFIG";

pub const DEFAULT_EXPORT_RANGES: &str = "B1:E,I1:J,M,Q1:U,Y1:AA,AH1:AK";
pub const DEFAULT_ALERT_TEXT_TEMPLATE: &str =
    "Outbound Stuck at SOC_Staging Stuckup Validation Report {date}";
pub const DEFAULT_ALERT_DATE_FORMAT: &str = "%Y-%m-%d";

pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MIN_SCHEDULED_INTERVAL_SECS: u64 = 30;

const ENV_PREFIXES: &[&str] = &["seatalk_", "google_", "stuckup_", "supabase_", "app_", "log_"];

/// Which triggers the monitor runs each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    RowChange,
    Scheduled,
    Both,
}

impl SyncMode {
    pub fn row_change_enabled(self) -> bool {
        matches!(self, SyncMode::RowChange | SyncMode::Both)
    }

    pub fn scheduled_enabled(self) -> bool {
        matches!(self, SyncMode::Scheduled | SyncMode::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::RowChange => "row_change",
            SyncMode::Scheduled => "scheduled",
            SyncMode::Both => "both",
        }
    }
}

impl FromStr for SyncMode {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row_change" | "" => Ok(SyncMode::RowChange),
            "scheduled" => Ok(SyncMode::Scheduled),
            "both" => Ok(SyncMode::Both),
            other => Err(BotError::Config(format!(
                "unknown sync mode '{}', expected row_change, scheduled or both",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Server
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub app_host: String,
    pub app_port: u16,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub app_timezone_offset: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub log_level: String,
    #[serde(deserialize_with = "deserialize_bool_flexible")]
    pub log_json: bool,

    // SeaTalk
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub seatalk_app_id: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub seatalk_app_secret: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub seatalk_signing_secret: String,
    #[serde(deserialize_with = "deserialize_bool_flexible")]
    pub seatalk_verify_signature: bool,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub seatalk_api_base_url: String,

    // Google
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub google_service_account_file: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub google_sheets_api_base_url: String,

    // Source / target sheets
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_source_spreadsheet_id: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_source_worksheet_name: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_source_range: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_target_spreadsheet_id: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_target_worksheet_name: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_filter_status_values: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_export_columns: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_export_ranges: String,
    pub stuckup_target_max_columns: usize,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_sync_log_worksheet_name: String,
    pub stuckup_sync_log_max_rows: usize,

    // Table store
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub supabase_url: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub supabase_service_role_key: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub supabase_stuckup_table: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub supabase_stuckup_conflict_column: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub supabase_state_table: String,
    pub supabase_page_size: usize,
    pub supabase_delete_batch_size: usize,
    #[serde(deserialize_with = "deserialize_u64_flexible")]
    pub supabase_timeout_seconds: u64,

    // Monitor
    #[serde(deserialize_with = "deserialize_bool_flexible")]
    pub stuckup_auto_sync_enabled: bool,
    #[serde(deserialize_with = "deserialize_u64_flexible")]
    pub stuckup_poll_interval_seconds: u64,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_sync_mode: String,
    #[serde(deserialize_with = "deserialize_u64_flexible")]
    pub stuckup_scheduled_sync_interval_seconds: u64,
    pub stuckup_reference_row: u32,

    // Dashboard
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_worksheet_name: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_block_range: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_summary_cell: String,
    pub stuckup_dashboard_stabilize_retries: u32,
    #[serde(deserialize_with = "deserialize_u64_flexible")]
    pub stuckup_dashboard_stabilize_delay_ms: u64,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_capture_worksheet_name: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_capture_range: String,

    // Dashboard alert
    #[serde(deserialize_with = "deserialize_bool_flexible")]
    pub stuckup_dashboard_alert_enabled: bool,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_system_webhook_url: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_worksheet_name: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_trigger_cell: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_trigger_value: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_text_template: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_date_format: String,
    #[serde(deserialize_with = "deserialize_bool_flexible")]
    pub stuckup_dashboard_alert_at_all: bool,

    // Local state files
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_raw_backup_path: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_state_path: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_data_hash_path: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_schedule_state_path: String,
    #[serde(deserialize_with = "deserialize_string_lossy")]
    pub stuckup_dashboard_alert_state_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_host: "0.0.0.0".to_string(),
            app_port: 8000,
            app_timezone_offset: "+08:00".to_string(),
            log_level: "info".to_string(),
            log_json: false,

            seatalk_app_id: String::new(),
            seatalk_app_secret: String::new(),
            seatalk_signing_secret: String::new(),
            seatalk_verify_signature: true,
            seatalk_api_base_url: "https://openapi.seatalk.io".to_string(),

            google_service_account_file: String::new(),
            google_sheets_api_base_url: "https://sheets.googleapis.com".to_string(),

            stuckup_source_spreadsheet_id: String::new(),
            stuckup_source_worksheet_name: "Source".to_string(),
            stuckup_source_range: "A1:AL".to_string(),
            stuckup_target_spreadsheet_id: String::new(),
            stuckup_target_worksheet_name: "Stuckup".to_string(),
            stuckup_filter_status_values: "SOC_Packed".to_string(),
            stuckup_export_columns: String::new(),
            stuckup_export_ranges: DEFAULT_EXPORT_RANGES.to_string(),
            stuckup_target_max_columns: 0,
            stuckup_sync_log_worksheet_name: "Sync Log".to_string(),
            stuckup_sync_log_max_rows: 200,

            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            supabase_stuckup_table: "stuckup_shipments".to_string(),
            supabase_stuckup_conflict_column: "shipment_id".to_string(),
            supabase_state_table: "stuckup_state".to_string(),
            supabase_page_size: 1000,
            supabase_delete_batch_size: 200,
            supabase_timeout_seconds: 30,

            stuckup_auto_sync_enabled: true,
            stuckup_poll_interval_seconds: 60,
            stuckup_sync_mode: "row_change".to_string(),
            stuckup_scheduled_sync_interval_seconds: 900,
            stuckup_reference_row: 2,

            stuckup_dashboard_worksheet_name: "Dashboard".to_string(),
            stuckup_dashboard_block_range: "A1:T40".to_string(),
            stuckup_dashboard_summary_cell: "W2".to_string(),
            stuckup_dashboard_stabilize_retries: 4,
            stuckup_dashboard_stabilize_delay_ms: 2000,
            stuckup_dashboard_capture_worksheet_name: "Dashboard".to_string(),
            stuckup_dashboard_capture_range: "A1:T30".to_string(),

            stuckup_dashboard_alert_enabled: true,
            stuckup_dashboard_alert_system_webhook_url: String::new(),
            stuckup_dashboard_alert_worksheet_name: "Dashboard".to_string(),
            stuckup_dashboard_alert_trigger_cell: "B1".to_string(),
            stuckup_dashboard_alert_trigger_value: "Updated".to_string(),
            stuckup_dashboard_alert_text_template: DEFAULT_ALERT_TEXT_TEMPLATE.to_string(),
            stuckup_dashboard_alert_date_format: DEFAULT_ALERT_DATE_FORMAT.to_string(),
            stuckup_dashboard_alert_at_all: true,

            stuckup_raw_backup_path: "data/stuckup/raw_full.jsonl".to_string(),
            stuckup_state_path: "data/stuckup/reference_row_state.txt".to_string(),
            stuckup_data_hash_path: "data/stuckup/data_hash.txt".to_string(),
            stuckup_schedule_state_path: "data/stuckup/last_scheduled_sync.txt".to_string(),
            stuckup_dashboard_alert_state_path: "data/stuckup/dashboard_alert_state.txt"
                .to_string(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, the YAML file and the environment
    ///
    /// `path` overrides the config file; otherwise `BOTSRV_CONFIG` or
    /// `config/botsrv.yaml` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
        });

        if path.is_some() && !config_path.exists() {
            return Err(BotError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(&config_path))
            .merge(Env::raw().filter(|key| {
                let key = key.as_str().to_ascii_lowercase();
                ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
            }));

        Self::from_figment(figment)
    }

    /// Extract and validate settings from a prepared figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| BotError::Config(format!("failed to load configuration: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject structurally impossible values
    ///
    /// Missing identifiers are not errors here; the sync and monitor report them.
    pub fn validate(&self) -> Result<()> {
        if self.app_port == 0 {
            return Err(BotError::Config("APP_PORT must be non-zero".to_string()));
        }
        if self.stuckup_dashboard_alert_trigger_value.trim().is_empty() {
            return Err(BotError::Config(
                "STUCKUP_DASHBOARD_ALERT_TRIGGER_VALUE must not be empty".to_string(),
            ));
        }
        self.sync_mode()?;
        self.timezone_offset()?;
        Ok(())
    }

    pub fn sync_mode(&self) -> Result<SyncMode> {
        self.stuckup_sync_mode.parse()
    }

    pub fn timezone_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.app_timezone_offset)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.stuckup_poll_interval_seconds.max(MIN_POLL_INTERVAL_SECS))
    }

    pub fn scheduled_interval(&self) -> Duration {
        Duration::from_secs(
            self.stuckup_scheduled_sync_interval_seconds
                .max(MIN_SCHEDULED_INTERVAL_SECS),
        )
    }

    pub fn stabilize_delay(&self) -> Duration {
        Duration::from_millis(self.stuckup_dashboard_stabilize_delay_ms)
    }

    pub fn supabase_timeout(&self) -> Duration {
        Duration::from_secs(self.supabase_timeout_seconds.max(1))
    }

    /// Allowed `status_desc` values
    pub fn filter_status_values(&self) -> Vec<String> {
        split_list(&self.stuckup_filter_status_values)
    }

    /// Explicitly requested export headers (empty when the range strategy applies)
    pub fn export_columns(&self) -> Vec<String> {
        split_list(&self.stuckup_export_columns)
    }

    pub fn supabase_configured(&self) -> bool {
        !self.supabase_url.trim().is_empty() && !self.supabase_service_role_key.trim().is_empty()
    }

    pub fn alert_webhook_configured(&self) -> bool {
        !self.stuckup_dashboard_alert_system_webhook_url.trim().is_empty()
    }

    /// Human-readable report for the `check` subcommand
    pub fn describe(&self) -> Vec<(String, String)> {
        let mask = |v: &str| {
            if v.is_empty() {
                "(unset)".to_string()
            } else {
                "(set)".to_string()
            }
        };
        let show = |v: &str| {
            if v.is_empty() {
                "(unset)".to_string()
            } else {
                v.to_string()
            }
        };

        vec![
            ("APP_HOST".into(), self.app_host.clone()),
            ("APP_PORT".into(), self.app_port.to_string()),
            ("APP_TIMEZONE_OFFSET".into(), self.app_timezone_offset.clone()),
            ("SEATALK_APP_ID".into(), show(&self.seatalk_app_id)),
            ("SEATALK_APP_SECRET".into(), mask(&self.seatalk_app_secret)),
            (
                "SEATALK_VERIFY_SIGNATURE".into(),
                self.seatalk_verify_signature.to_string(),
            ),
            (
                "GOOGLE_SERVICE_ACCOUNT_FILE".into(),
                show(&self.google_service_account_file),
            ),
            (
                "STUCKUP_SOURCE_SPREADSHEET_ID".into(),
                show(&self.stuckup_source_spreadsheet_id),
            ),
            (
                "STUCKUP_TARGET_SPREADSHEET_ID".into(),
                show(&self.stuckup_target_spreadsheet_id),
            ),
            ("STUCKUP_SYNC_MODE".into(), self.stuckup_sync_mode.clone()),
            (
                "STUCKUP_POLL_INTERVAL_SECONDS".into(),
                self.poll_interval().as_secs().to_string(),
            ),
            ("SUPABASE_URL".into(), show(&self.supabase_url)),
            (
                "SUPABASE_SERVICE_ROLE_KEY".into(),
                mask(&self.supabase_service_role_key),
            ),
            (
                "STUCKUP_DASHBOARD_ALERT_ENABLED".into(),
                self.stuckup_dashboard_alert_enabled.to_string(),
            ),
            (
                "STUCKUP_DASHBOARD_ALERT_SYSTEM_WEBHOOK_URL".into(),
                mask(&self.stuckup_dashboard_alert_system_webhook_url),
            ),
        ]
    }
}

/// Split a comma-separated list, trimming entries and dropping empties
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
