//! Relational table store
//!
//! Canonical stuckup rows plus a small key/value state table, served over
//! PostgREST (Supabase).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{cell_to_string, Outcome, Record};
use crate::config::Settings;

/// Rows per upsert request
pub const UPSERT_CHUNK_SIZE: usize = 500;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert or replace rows by `conflict_column`; returns the number sent
    async fn upsert(&self, rows: &[Record], conflict_column: &str) -> Outcome<usize>;

    /// Every row of the data table, paginated internally
    async fn select_all(&self, order_by: Option<&str>) -> Outcome<Vec<Record>>;

    /// Delete rows whose `column` is in `values`, `batch_size` values per call;
    /// returns the number of values submitted
    async fn delete_where_in(&self, column: &str, values: &[String], batch_size: usize)
        -> Outcome<usize>;

    /// `Ok(None)` means the key has never been set
    async fn get_state(&self, key: &str) -> Outcome<Option<String>>;

    async fn set_state(&self, key: &str, value: &str) -> Outcome<()>;
}

/// Quote a value for a PostgREST `in.(...)` list
fn quote_in_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote_in_value(v)).collect();
    format!("in.({})", quoted.join(","))
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub table: String,
    pub state_table: String,
    pub page_size: usize,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.supabase_url.trim().trim_end_matches('/').to_string(),
            service_role_key: settings.supabase_service_role_key.trim().to_string(),
            table: settings.supabase_stuckup_table.clone(),
            state_table: settings.supabase_state_table.clone(),
            page_size: settings.supabase_page_size.max(1),
            timeout: settings.supabase_timeout(),
        }
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, config: SupabaseConfig) -> Self {
        Self { http, config }
    }

    pub fn enabled(&self) -> bool {
        !self.config.url.is_empty() && !self.config.service_role_key.is_empty()
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.config.url, table);
        self.http
            .request(method, url)
            .timeout(self.config.timeout)
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    async fn execute(&self, req: RequestBuilder) -> Result<String, String> {
        let resp = req.send().await.map_err(|e| e.to_string())?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(format!("HTTP {}: {}", status.as_u16(), body))
        }
    }

    fn parse_rows(body: &str) -> Result<Vec<Map<String, Value>>, String> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(body).map_err(|e| format!("invalid response: {}", e))
    }
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn upsert(&self, rows: &[Record], conflict_column: &str) -> Outcome<usize> {
        if !self.enabled() {
            return Outcome::skipped("not configured");
        }
        if rows.is_empty() {
            return Outcome::Ok(0);
        }

        for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
            let req = self
                .request(Method::POST, &self.config.table)
                .query(&[("on_conflict", conflict_column)])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(chunk);
            if let Err(e) = self.execute(req).await {
                warn!("Supabase upsert failed: {}", e);
                return Outcome::Failed(e);
            }
        }
        debug!("Upserted {} rows into {}", rows.len(), self.config.table);
        Outcome::Ok(rows.len())
    }

    async fn select_all(&self, order_by: Option<&str>) -> Outcome<Vec<Record>> {
        if !self.enabled() {
            return Outcome::skipped("not configured");
        }

        let page_size = self.config.page_size;
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut query = vec![
                ("select".to_string(), "*".to_string()),
                ("limit".to_string(), page_size.to_string()),
                ("offset".to_string(), offset.to_string()),
            ];
            if let Some(column) = order_by.filter(|c| !c.is_empty()) {
                query.push(("order".to_string(), format!("{}.asc", column)));
            }

            let req = self.request(Method::GET, &self.config.table).query(&query);
            let page = match self.execute(req).await.and_then(|b| Self::parse_rows(&b)) {
                Ok(page) => page,
                Err(e) => {
                    warn!("Supabase fetch failed at offset {}: {}", offset, e);
                    return Outcome::Failed(e);
                },
            };

            let fetched = page.len();
            out.extend(page.into_iter().map(|row| {
                row.into_iter()
                    .map(|(k, v)| (k, cell_to_string(&v)))
                    .collect::<Record>()
            }));

            // A full page may be followed by more rows
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        debug!("Fetched {} rows from {}", out.len(), self.config.table);
        Outcome::Ok(out)
    }

    async fn delete_where_in(
        &self,
        column: &str,
        values: &[String],
        batch_size: usize,
    ) -> Outcome<usize> {
        if !self.enabled() {
            return Outcome::skipped("not configured");
        }
        if values.is_empty() {
            return Outcome::Ok(0);
        }

        let mut deleted = 0;
        for batch in values.chunks(batch_size.max(1)) {
            let req = self
                .request(Method::DELETE, &self.config.table)
                .query(&[(column, in_filter(batch))])
                .header("Prefer", "return=minimal");
            if let Err(e) = self.execute(req).await {
                warn!("Supabase delete failed after {} rows: {}", deleted, e);
                return Outcome::Failed(e);
            }
            deleted += batch.len();
        }
        Outcome::Ok(deleted)
    }

    async fn get_state(&self, key: &str) -> Outcome<Option<String>> {
        if !self.enabled() {
            return Outcome::skipped("not configured");
        }
        let req = self
            .request(Method::GET, &self.config.state_table)
            .query(&[
                ("select", "value".to_string()),
                ("key", format!("eq.{}", key)),
                ("limit", "1".to_string()),
            ]);
        match self.execute(req).await.and_then(|b| Self::parse_rows(&b)) {
            Ok(rows) => Outcome::Ok(
                rows.into_iter()
                    .next()
                    .and_then(|row| row.get("value").cloned())
                    .filter(|v| !v.is_null())
                    .map(|v| cell_to_string(&v)),
            ),
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn set_state(&self, key: &str, value: &str) -> Outcome<()> {
        if !self.enabled() {
            return Outcome::skipped("not configured");
        }
        let body = json!([{
            "key": key,
            "value": value,
            "updated_at": Utc::now().to_rfc3339(),
        }]);
        let req = self
            .request(Method::POST, &self.config.state_table)
            .query(&[("on_conflict", "key")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);
        match self.execute(req).await {
            Ok(_) => Outcome::Ok(()),
            Err(e) => Outcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_filter_quotes_values() {
        let values = vec!["SPX1".to_string(), "a\"b".to_string(), "c,d".to_string()];
        assert_eq!(in_filter(&values), r#"in.("SPX1","a\"b","c,d")"#);
    }

    #[tokio::test]
    async fn test_unconfigured_client_skips() {
        let client = SupabaseClient::new(
            reqwest::Client::new(),
            SupabaseConfig::from_settings(&Settings::default()),
        );
        assert!(!client.enabled());
        assert_eq!(client.upsert(&[Record::new()], "id").await.label(), "skipped");
        assert_eq!(client.get_state("k").await.label(), "skipped");
        assert_eq!(client.set_state("k", "v").await.label(), "skipped");
    }
}
