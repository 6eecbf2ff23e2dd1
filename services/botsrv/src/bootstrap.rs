//! Production wiring of the HTTP collaborators

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::Result;
use crate::integrations::google_auth::ServiceAccountTokenSource;
use crate::integrations::table_store::SupabaseConfig;
use crate::integrations::{GoogleSheetsClient, SupabaseClient};
use crate::seatalk::{SeaTalkClient, SystemAccountClient};
use crate::stuckup::{Stuckup, StuckupDeps};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()?)
}

/// Stuckup subsystem against Google Sheets, Supabase and the system-account webhook
pub fn build_stuckup(settings: &Settings, http: &reqwest::Client) -> Result<Stuckup> {
    let tokens = Arc::new(ServiceAccountTokenSource::new(
        settings.google_service_account_file.trim(),
        http.clone(),
    ));
    let grid = Arc::new(GoogleSheetsClient::new(
        http.clone(),
        settings.google_sheets_api_base_url.clone(),
        tokens,
    ));
    let table = Arc::new(SupabaseClient::new(
        http.clone(),
        SupabaseConfig::from_settings(settings),
    ));
    let notifier = Arc::new(SystemAccountClient::new(
        http.clone(),
        settings.stuckup_dashboard_alert_system_webhook_url.clone(),
    ));

    Stuckup::build(settings, StuckupDeps::new(settings, grid, table, notifier))
}

pub fn seatalk_client(settings: &Settings, http: &reqwest::Client) -> SeaTalkClient {
    SeaTalkClient::from_settings(http.clone(), settings)
}
