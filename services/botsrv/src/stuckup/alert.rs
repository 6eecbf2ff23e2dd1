//! Edge-triggered dashboard alert
//!
//! A single trigger cell is watched every tick. The alert fires only on the
//! transition into the trigger value; the last observed raw value is the only
//! state kept between ticks.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::dashboard::Dashboard;
use super::state_store::StateStore;
use super::ALERT_TRIGGER_KEY;
use crate::clock::{format_date, now_local};
use crate::config::{Settings, DEFAULT_ALERT_TEXT_TEMPLATE};
use crate::error::Result;
use crate::integrations::{GridStore, NotificationSink, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Disabled,
    Skipped,
    BaselineSet,
    Waiting,
    AlreadyTriggered,
    Sent,
    Error,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Disabled => "disabled",
            AlertStatus::Skipped => "skipped",
            AlertStatus::BaselineSet => "baseline_set",
            AlertStatus::Waiting => "waiting",
            AlertStatus::AlreadyTriggered => "already_triggered",
            AlertStatus::Sent => "sent",
            AlertStatus::Error => "error",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertCheck {
    pub status: AlertStatus,
    pub message: String,
    /// Raw trigger cell content, when it was read
    pub value: Option<String>,
}

impl AlertCheck {
    fn new(status: AlertStatus, message: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            status,
            message: message.into(),
            value: value.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub enabled: bool,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub trigger_cell: String,
    pub trigger_value: String,
    pub text_template: String,
    pub date_format: String,
    pub at_all: bool,
    pub timezone: FixedOffset,
}

impl AlertConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            enabled: settings.stuckup_dashboard_alert_enabled,
            spreadsheet_id: settings.stuckup_target_spreadsheet_id.trim().to_string(),
            worksheet: settings.stuckup_dashboard_alert_worksheet_name.clone(),
            trigger_cell: settings.stuckup_dashboard_alert_trigger_cell.clone(),
            trigger_value: settings.stuckup_dashboard_alert_trigger_value.clone(),
            text_template: settings.stuckup_dashboard_alert_text_template.clone(),
            date_format: settings.stuckup_dashboard_alert_date_format.clone(),
            at_all: settings.stuckup_dashboard_alert_at_all,
            timezone: settings.timezone_offset()?,
        })
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Fill `{date}` in the template; an empty template uses the default one
pub fn render_alert_text(template: &str, date_format: &str, at: DateTime<FixedOffset>) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_ALERT_TEXT_TEMPLATE
    } else {
        template
    };
    template.replace("{date}", &format_date(at, date_format))
}

/// Overrides for a manually sent sample alert
#[derive(Debug, Clone, Default)]
pub struct SampleAlert {
    pub text: Option<String>,
    pub image_base64: Option<String>,
    pub skip_text: bool,
    pub skip_image: bool,
    pub at_all: bool,
}

pub struct DashboardAlert {
    grid: Arc<dyn GridStore>,
    state: Arc<dyn StateStore>,
    notifier: Arc<dyn NotificationSink>,
    dashboard: Arc<Dashboard>,
    config: AlertConfig,
}

impl DashboardAlert {
    pub fn new(
        grid: Arc<dyn GridStore>,
        state: Arc<dyn StateStore>,
        notifier: Arc<dyn NotificationSink>,
        dashboard: Arc<Dashboard>,
        config: AlertConfig,
    ) -> Self {
        Self {
            grid,
            state,
            notifier,
            dashboard,
            config,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn render_text(&self) -> String {
        render_alert_text(
            &self.config.text_template,
            &self.config.date_format,
            now_local(self.config.timezone),
        )
    }

    /// Observe the trigger cell once and send on the rising edge
    pub async fn check(&self) -> AlertCheck {
        let cfg = &self.config;
        if !cfg.enabled {
            return AlertCheck::new(AlertStatus::Disabled, "dashboard alert is disabled", None);
        }
        if !self.notifier.enabled() {
            return AlertCheck::new(
                AlertStatus::Skipped,
                "STUCKUP_DASHBOARD_ALERT_SYSTEM_WEBHOOK_URL is not configured",
                None,
            );
        }
        if cfg.spreadsheet_id.is_empty() {
            return AlertCheck::new(
                AlertStatus::Skipped,
                "STUCKUP_TARGET_SPREADSHEET_ID is not configured",
                None,
            );
        }

        let observed = match self
            .grid
            .read(&cfg.spreadsheet_id, &cfg.worksheet, &cfg.trigger_cell)
            .await
        {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or_default(),
            Err(e) => {
                return AlertCheck::new(
                    AlertStatus::Error,
                    format!("trigger cell read failed: {}", e),
                    None,
                )
            },
        };
        let value = Some(observed.as_str());

        let previous = match self.state.get(ALERT_TRIGGER_KEY).await {
            Outcome::Ok(previous) => previous,
            other => {
                return AlertCheck::new(
                    AlertStatus::Error,
                    format!("alert state read {}: {}", other.label(), other.reason()),
                    value,
                )
            },
        };

        let Some(previous) = previous else {
            self.remember(&observed).await;
            info!("Dashboard alert baseline set to '{}'", observed);
            return AlertCheck::new(AlertStatus::BaselineSet, "baseline recorded", value);
        };

        let trigger = normalize(&cfg.trigger_value);
        if normalize(&observed) != trigger {
            if observed != previous {
                self.remember(&observed).await;
            }
            return AlertCheck::new(
                AlertStatus::Waiting,
                format!("waiting for '{}'", cfg.trigger_value),
                value,
            );
        }

        if normalize(&previous) == trigger {
            if observed != previous {
                self.remember(&observed).await;
            }
            debug!("Dashboard alert already sent for '{}'", observed);
            return AlertCheck::new(
                AlertStatus::AlreadyTriggered,
                "alert already sent for this value",
                value,
            );
        }

        if let Err(e) = self.send(&self.render_text(), cfg.at_all).await {
            warn!("Dashboard alert send failed: {}", e);
            return AlertCheck::new(AlertStatus::Error, format!("alert send failed: {}", e), value);
        }
        self.remember(&observed).await;
        info!("Dashboard alert sent ('{}' -> '{}')", previous, observed);
        AlertCheck::new(AlertStatus::Sent, "alert sent", value)
    }

    /// Send text and a live capture without touching the trigger state
    pub async fn send_sample(&self, sample: SampleAlert) -> Result<()> {
        if !sample.skip_text {
            let text = sample.text.unwrap_or_else(|| self.render_text());
            self.notifier.send_text(&text, sample.at_all).await?;
        }
        if !sample.skip_image {
            let image = match sample.image_base64 {
                Some(image) => image,
                None => self.dashboard.capture_png_base64().await?,
            };
            self.notifier.send_image(&image).await?;
        }
        Ok(())
    }

    async fn send(&self, text: &str, at_all: bool) -> Result<()> {
        self.notifier.send_text(text, at_all).await?;
        let image = self.dashboard.capture_png_base64().await?;
        self.notifier.send_image(&image).await
    }

    async fn remember(&self, value: &str) {
        if let Outcome::Failed(reason) = self.state.set(ALERT_TRIGGER_KEY, value).await {
            warn!("Dashboard alert state not persisted: {}", reason);
        }
    }
}
