//! Spreadsheet grid store
//!
//! The sync engine only needs read/clear/write of A1 ranges and an additive
//! grid resize, so that is the whole contract.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::cell_to_string;
use super::google_auth::TokenSource;
use crate::error::{BotError, Result};
use crate::stuckup::columns::column_index;

/// Counts echoed back by a write, used only for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteSummary {
    pub updated_rows: usize,
    pub updated_columns: usize,
    pub updated_cells: usize,
}

#[async_trait]
pub trait GridStore: Send + Sync {
    /// Read a range; cells are trimmed strings, trailing empties are absent
    async fn read(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        cell_range: &str,
    ) -> Result<Vec<Vec<String>>>;

    async fn clear(&self, spreadsheet_id: &str, worksheet: &str, cell_range: &str) -> Result<()>;

    /// Write rows starting at `start_cell`
    async fn write(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        start_cell: &str,
        rows: &[Vec<String>],
    ) -> Result<WriteSummary>;

    /// Grow the worksheet grid to at least the given size; never shrinks
    async fn ensure_min_size(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        min_rows: usize,
        min_columns: usize,
    ) -> Result<()>;
}

/// `'Sheet Name'!A1:B2`, with embedded quotes doubled
pub fn sheet_range(worksheet: &str, cell_range: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cell_range)
}

/// One endpoint of an A1 range; either part may be open (`A`, `2`, `A2`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub column: Option<usize>,
    /// Zero-based row
    pub row: Option<usize>,
}

impl CellRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(raw.len());
        let (letters, digits) = raw.split_at(split);

        let column = if letters.is_empty() {
            None
        } else {
            Some(column_index(letters)?)
        };
        let row = if digits.is_empty() {
            None
        } else {
            let n: usize = digits.parse().ok()?;
            Some(n.checked_sub(1)?)
        };
        if column.is_none() && row.is_none() {
            return None;
        }
        Some(Self { column, row })
    }
}

/// Parsed `A1:T40` / `A2:AL2` / `B1` / `A:F`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl A1Range {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some((a, b)) => Some(Self {
                start: CellRef::parse(a)?,
                end: CellRef::parse(b)?,
            }),
            None => {
                let cell = CellRef::parse(raw)?;
                Some(Self {
                    start: cell,
                    end: cell,
                })
            },
        }
    }

    pub fn first_row(&self) -> usize {
        self.start.row.unwrap_or(0)
    }

    pub fn first_column(&self) -> usize {
        self.start.column.unwrap_or(0)
    }

    /// Inclusive last row, `None` when open-ended
    pub fn last_row(&self) -> Option<usize> {
        self.end.row
    }

    pub fn last_column(&self) -> Option<usize> {
        self.end.column
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GridProperties {
    row_count: usize,
    column_count: usize,
}

/// Google Sheets v4 REST client
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleSheetsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Build `{base}/v4/spreadsheets/{id}/...` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BotError::Config(format!("invalid sheets base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| BotError::Config("sheets base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        let token = self.tokens.access_token().await?;
        let mut req = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::api("google_sheets", status.as_u16(), text));
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl GridStore for GoogleSheetsClient {
    async fn read(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        cell_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        let range = sheet_range(worksheet, cell_range);
        let url = self.url(&[spreadsheet_id, "values", &range])?;
        let body = self.send(Method::GET, url, None).await?;
        let parsed: ValueRange = serde_json::from_value(body)?;

        Ok(parsed
            .values
            .iter()
            .map(|row| row.iter().map(|c| cell_to_string(c).trim().to_string()).collect())
            .collect())
    }

    async fn clear(&self, spreadsheet_id: &str, worksheet: &str, cell_range: &str) -> Result<()> {
        let range = format!("{}:clear", sheet_range(worksheet, cell_range));
        let url = self.url(&[spreadsheet_id, "values", &range])?;
        self.send(Method::POST, url, Some(json!({}))).await?;
        Ok(())
    }

    async fn write(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        start_cell: &str,
        rows: &[Vec<String>],
    ) -> Result<WriteSummary> {
        let range = sheet_range(worksheet, start_cell);
        let mut url = self.url(&[spreadsheet_id, "values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = self
            .send(
                Method::PUT,
                url,
                Some(json!({ "range": range, "majorDimension": "ROWS", "values": rows })),
            )
            .await?;
        let summary: WriteSummary = serde_json::from_value(body).unwrap_or_default();
        debug!(
            "Sheet write {}: {} rows, {} cells",
            range, summary.updated_rows, summary.updated_cells
        );
        Ok(summary)
    }

    async fn ensure_min_size(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        min_rows: usize,
        min_columns: usize,
    ) -> Result<()> {
        let mut url = self.url(&[spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("includeGridData", "false")
            .append_pair("fields", "sheets.properties");
        let meta: SpreadsheetMeta =
            serde_json::from_value(self.send(Method::GET, url, None).await?)?;

        let props = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == worksheet)
            .ok_or_else(|| BotError::InvalidInput(format!("worksheet '{}' not found", worksheet)))?;

        let mut grid = serde_json::Map::new();
        let mut fields = Vec::new();
        if props.grid_properties.row_count < min_rows {
            grid.insert("rowCount".into(), json!(min_rows));
            fields.push("gridProperties.rowCount");
        }
        if props.grid_properties.column_count < min_columns {
            grid.insert("columnCount".into(), json!(min_columns));
            fields.push("gridProperties.columnCount");
        }
        if fields.is_empty() {
            return Ok(());
        }

        let batch = format!("{}:batchUpdate", spreadsheet_id);
        let url = self.url(&[&batch])?;
        let request = json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": { "sheetId": props.sheet_id, "gridProperties": grid },
                    "fields": fields.join(","),
                }
            }]
        });
        self.send(Method::POST, url, Some(request)).await?;
        debug!(
            "Resized '{}' to at least {}x{}",
            worksheet, min_rows, min_columns
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_sheet_range_quotes_names() {
        assert_eq!(sheet_range("Team's Data", "A2:ZZ2"), "'Team''s Data'!A2:ZZ2");
        assert_eq!(sheet_range("Sync Log", "A1"), "'Sync Log'!A1");
    }

    #[test]
    fn test_a1_parsing() {
        let r = A1Range::parse("A1:T40").unwrap();
        assert_eq!((r.first_row(), r.first_column()), (0, 0));
        assert_eq!((r.last_row(), r.last_column()), (Some(39), Some(19)));

        let r = A1Range::parse("A2:AL").unwrap();
        assert_eq!(r.first_row(), 1);
        assert_eq!(r.last_row(), None);
        assert_eq!(r.last_column(), Some(37));

        let r = A1Range::parse("A:F").unwrap();
        assert_eq!(r.first_row(), 0);
        assert_eq!(r.last_row(), None);

        let r = A1Range::parse("W2").unwrap();
        assert_eq!((r.first_row(), r.first_column()), (1, 22));
        assert_eq!(r.last_column(), Some(22));

        assert!(A1Range::parse("A0").is_none());
        assert!(A1Range::parse("").is_none());
    }
}
