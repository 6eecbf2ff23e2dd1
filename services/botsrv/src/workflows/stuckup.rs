//! `/stuckup` chat command
//!
//! Syncs are driven by the background monitor only; chat can read help and
//! the monitor status but never start a sync.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Workflow, WorkflowContext, WorkflowResult};
use crate::stuckup::{MonitorStatus, StuckupMonitor};

const COMMANDS: &[&str] = &["/stuckup", "stuckup"];

pub const HELP_TEXT: &str = "I handle stuckup sync automatically.\n\
Manual `/stuckup sync` is currently turned off.\n\
I can run on a schedule, on reference-row changes, or both.\n\
The behavior is controlled by your STUCKUP settings.\n\
Type `/stuckup status` to see what I did last, or `/stuckup help` to see this guide again.";

pub const REFUSAL_TEXT: &str = "I can't run a manual stuckup sync from chat right now.\n\
I run stuckup sync automatically in the background.\n\
Type `/stuckup help` if you want the setup details.";

pub struct StuckupWorkflow {
    monitor: Option<Arc<StuckupMonitor>>,
}

impl StuckupWorkflow {
    pub fn new(monitor: Option<Arc<StuckupMonitor>>) -> Self {
        Self { monitor }
    }
}

/// Short multi-line rendering of the monitor snapshot
pub fn render_status(status: &MonitorStatus) -> String {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let mut out = String::new();

    let _ = write!(out, "Stuckup monitor: {} (mode {})", status.state, status.mode);
    if let Some(message) = &status.message {
        let _ = write!(out, "\nNote: {}", message);
    }
    let _ = write!(out, "\nLast check: {}", show(&status.last_check_at));
    let _ = write!(
        out,
        "\nLast sync: {} at {}",
        show(&status.last_sync_status),
        show(&status.last_sync_at)
    );
    if let (Some(source), Some(exported)) =
        (status.last_sync_source_rows, status.last_sync_exported_rows)
    {
        let _ = write!(out, " ({} source rows, {} exported)", source, exported);
    }
    if let Some(message) = &status.last_sync_message {
        let _ = write!(out, "\nSync message: {}", message);
    }
    let _ = write!(out, "\nSummary refresh: {}", show(&status.last_summary_status));
    let _ = write!(
        out,
        "\nDashboard alert: {} (last sent {})",
        show(&status.last_dashboard_alert_status),
        show(&status.last_dashboard_alert_sent_at)
    );
    if let Some(error) = &status.last_error {
        let _ = write!(out, "\nLast error: {}", error);
    }
    out
}

#[async_trait]
impl Workflow for StuckupWorkflow {
    fn name(&self) -> &'static str {
        "stuckup"
    }

    async fn handle(&self, context: &WorkflowContext) -> WorkflowResult {
        let text = context.text.trim();
        let lowered = text.to_lowercase();
        if !COMMANDS.iter().any(|cmd| lowered.starts_with(cmd)) {
            return WorkflowResult::pass();
        }

        let argument = text
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim().to_lowercase())
            .unwrap_or_default();

        match argument.as_str() {
            "" | "help" | "-h" | "--help" => WorkflowResult::reply(HELP_TEXT),
            "status" => match &self.monitor {
                Some(monitor) => WorkflowResult::reply(render_status(&monitor.status().await)),
                None => WorkflowResult::reply("Stuckup monitor is not running in this process."),
            },
            _ => WorkflowResult::reply(REFUSAL_TEXT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handle(text: &str) -> WorkflowResult {
        StuckupWorkflow::new(None)
            .handle(&WorkflowContext::new("e_1", text))
            .await
    }

    #[tokio::test]
    async fn test_help_variants() {
        for text in ["/stuckup", "/stuckup help", "stuckup -h", "/STUCKUP --help"] {
            let result = handle(text).await;
            assert!(result.handled, "{text}");
            assert!(result
                .response_text
                .is_some_and(|t| t.contains("Manual `/stuckup sync` is currently turned off.")));
        }
    }

    #[tokio::test]
    async fn test_manual_sync_refused() {
        let result = handle("/stuckup sync").await;
        assert!(result.handled);
        assert!(result
            .response_text
            .is_some_and(|t| t.starts_with("I can't run a manual stuckup sync from chat right now.")));
    }

    #[tokio::test]
    async fn test_other_text_passes() {
        assert!(!handle("/backlogs").await.handled);
    }

    #[test]
    fn test_render_status() {
        let status = MonitorStatus {
            state: "not_started".into(),
            mode: "row_change".into(),
            message: Some("STUCKUP_AUTO_SYNC_ENABLED is off".into()),
            last_sync_status: Some("no update".into()),
            last_sync_source_rows: Some(3),
            last_sync_exported_rows: Some(3),
            ..MonitorStatus::default()
        };
        let text = render_status(&status);
        assert!(text.starts_with("Stuckup monitor: not_started (mode row_change)"));
        assert!(text.contains("Note: STUCKUP_AUTO_SYNC_ENABLED is off"));
        assert!(text.contains("Last sync: no update at - (3 source rows, 3 exported)"));
    }
}
