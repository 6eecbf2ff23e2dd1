//! In-memory collaborators
//!
//! Behave like the remote services closely enough for the sync engine, monitor
//! and alert logic to be exercised without network access. Failure switches let
//! tests simulate an unreachable backend.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::grid::{A1Range, GridStore, WriteSummary};
use super::table_store::TableStore;
use super::{NotificationSink, Outcome, Record};
use crate::error::{BotError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_range(raw: &str) -> Result<A1Range> {
    A1Range::parse(raw).ok_or_else(|| BotError::InvalidInput(format!("bad range '{}'", raw)))
}

type SheetKey = (String, String);

#[derive(Debug, Default, Clone)]
struct Sheet {
    cells: Vec<Vec<String>>,
    rows: usize,
    columns: usize,
}

impl Sheet {
    fn set(&mut self, row: usize, col: usize, value: String) {
        if self.cells.len() <= row {
            self.cells.resize(row + 1, Vec::new());
        }
        let line = &mut self.cells[row];
        if line.len() <= col {
            line.resize(col + 1, String::new());
        }
        line[col] = value;
    }
}

/// Grid store backed by a map of worksheets
///
/// Reads mimic the Sheets API: values are trimmed, trailing empty cells and
/// trailing empty rows are dropped.
#[derive(Default)]
pub struct MemoryGridStore {
    sheets: Mutex<HashMap<SheetKey, Sheet>>,
    scripted_reads: Mutex<HashMap<(String, String, String), VecDeque<Vec<Vec<String>>>>>,
    failing_worksheets: Mutex<Vec<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a worksheet's contents from A1
    pub fn set_sheet(&self, spreadsheet_id: &str, worksheet: &str, rows: Vec<Vec<String>>) {
        let mut sheets = lock(&self.sheets);
        let sheet = sheets
            .entry((spreadsheet_id.to_string(), worksheet.to_string()))
            .or_default();
        sheet.cells = rows;
    }

    pub fn set_cell(&self, spreadsheet_id: &str, worksheet: &str, cell: &str, value: &str) {
        if let Some(range) = A1Range::parse(cell) {
            let mut sheets = lock(&self.sheets);
            sheets
                .entry((spreadsheet_id.to_string(), worksheet.to_string()))
                .or_default()
                .set(range.first_row(), range.first_column(), value.to_string());
        }
    }

    /// Raw worksheet contents, untrimmed
    pub fn sheet(&self, spreadsheet_id: &str, worksheet: &str) -> Vec<Vec<String>> {
        lock(&self.sheets)
            .get(&(spreadsheet_id.to_string(), worksheet.to_string()))
            .map(|s| s.cells.clone())
            .unwrap_or_default()
    }

    /// Grid size last requested through `ensure_min_size`
    pub fn grid_size(&self, spreadsheet_id: &str, worksheet: &str) -> (usize, usize) {
        lock(&self.sheets)
            .get(&(spreadsheet_id.to_string(), worksheet.to_string()))
            .map(|s| (s.rows, s.columns))
            .unwrap_or((0, 0))
    }

    /// Queue responses returned for an exact range before the stored contents
    pub fn script_reads(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        cell_range: &str,
        responses: Vec<Vec<Vec<String>>>,
    ) {
        lock(&self.scripted_reads)
            .entry((
                spreadsheet_id.to_string(),
                worksheet.to_string(),
                cell_range.to_string(),
            ))
            .or_default()
            .extend(responses);
    }

    /// Make every call against `worksheet` fail
    pub fn fail_worksheet(&self, worksheet: &str) {
        lock(&self.failing_worksheets).push(worksheet.to_string());
    }

    pub fn heal_worksheet(&self, worksheet: &str) {
        lock(&self.failing_worksheets).retain(|w| w != worksheet);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self, worksheet: &str) -> Result<()> {
        if lock(&self.failing_worksheets).iter().any(|w| w == worksheet) {
            return Err(BotError::api("memory_grid", 503, format!("worksheet '{}' unavailable", worksheet)));
        }
        Ok(())
    }
}

#[async_trait]
impl GridStore for MemoryGridStore {
    async fn read(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        cell_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        self.check_available(worksheet)?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let scripted = lock(&self.scripted_reads)
            .get_mut(&(
                spreadsheet_id.to_string(),
                worksheet.to_string(),
                cell_range.to_string(),
            ))
            .and_then(VecDeque::pop_front);
        if let Some(rows) = scripted {
            return Ok(rows);
        }

        let range = parse_range(cell_range)?;
        let sheets = lock(&self.sheets);
        let Some(sheet) = sheets.get(&(spreadsheet_id.to_string(), worksheet.to_string())) else {
            return Ok(Vec::new());
        };

        let first_col = range.first_column();
        let mut out: Vec<Vec<String>> = sheet
            .cells
            .iter()
            .enumerate()
            .skip(range.first_row())
            .take_while(|(idx, _)| range.last_row().map_or(true, |last| *idx <= last))
            .map(|(_, row)| {
                let end = range
                    .last_column()
                    .map_or(row.len(), |last| (last + 1).min(row.len()));
                let mut cells: Vec<String> = row
                    .get(first_col..end.max(first_col))
                    .unwrap_or_default()
                    .iter()
                    .map(|c| c.trim().to_string())
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn clear(&self, spreadsheet_id: &str, worksheet: &str, cell_range: &str) -> Result<()> {
        self.check_available(worksheet)?;
        let range = parse_range(cell_range)?;
        let mut sheets = lock(&self.sheets);
        if let Some(sheet) = sheets.get_mut(&(spreadsheet_id.to_string(), worksheet.to_string())) {
            for (idx, row) in sheet.cells.iter_mut().enumerate() {
                if idx < range.first_row() || range.last_row().is_some_and(|last| idx > last) {
                    continue;
                }
                let end = range.last_column().map_or(row.len(), |l| (l + 1).min(row.len()));
                for cell in row.iter_mut().take(end).skip(range.first_column()) {
                    cell.clear();
                }
            }
        }
        Ok(())
    }

    async fn write(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        start_cell: &str,
        rows: &[Vec<String>],
    ) -> Result<WriteSummary> {
        self.check_available(worksheet)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let start = parse_range(start_cell)?;
        let mut sheets = lock(&self.sheets);
        let sheet = sheets
            .entry((spreadsheet_id.to_string(), worksheet.to_string()))
            .or_default();

        let mut cells = 0;
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.set(start.first_row() + r, start.first_column() + c, value.clone());
                cells += 1;
            }
        }
        Ok(WriteSummary {
            updated_rows: rows.len(),
            updated_columns: rows.iter().map(Vec::len).max().unwrap_or(0),
            updated_cells: cells,
        })
    }

    async fn ensure_min_size(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        min_rows: usize,
        min_columns: usize,
    ) -> Result<()> {
        self.check_available(worksheet)?;
        let mut sheets = lock(&self.sheets);
        let sheet = sheets
            .entry((spreadsheet_id.to_string(), worksheet.to_string()))
            .or_default();
        sheet.rows = sheet.rows.max(min_rows);
        sheet.columns = sheet.columns.max(min_columns);
        Ok(())
    }
}

/// Table store backed by ordered maps
///
/// Rows are keyed by the conflict column of the first upsert. `unconfigured`
/// makes every call return `Skipped`; the failure switches make data or state
/// calls return `Failed`.
#[derive(Default)]
pub struct MemoryTableStore {
    rows: Mutex<BTreeMap<String, Record>>,
    state: Mutex<HashMap<String, String>>,
    unconfigured: AtomicBool,
    fail_data: AtomicBool,
    fail_state: AtomicBool,
    upsert_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        let store = Self::default();
        store.unconfigured.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_fail_data(&self, fail: bool) {
        self.fail_data.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_state(&self, fail: bool) {
        self.fail_state.store(fail, Ordering::SeqCst);
    }

    /// Seed a row directly, bypassing upsert accounting
    pub fn insert_row(&self, key: &str, row: Record) {
        lock(&self.rows).insert(key.to_string(), row);
    }

    pub fn rows(&self) -> Vec<Record> {
        lock(&self.rows).values().cloned().collect()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Every key deleted so far, in deletion order
    pub fn deleted_keys(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn state_value(&self, key: &str) -> Option<String> {
        lock(&self.state).get(key).cloned()
    }

    fn gate<T>(&self, failing: &AtomicBool) -> Option<Outcome<T>> {
        if self.unconfigured.load(Ordering::SeqCst) {
            return Some(Outcome::skipped("not configured"));
        }
        if failing.load(Ordering::SeqCst) {
            return Some(Outcome::failed("memory store unavailable"));
        }
        None
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn upsert(&self, rows: &[Record], conflict_column: &str) -> Outcome<usize> {
        if let Some(out) = self.gate(&self.fail_data) {
            return out;
        }
        if rows.is_empty() {
            return Outcome::Ok(0);
        }
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = lock(&self.rows);
        for row in rows {
            let key = row.get(conflict_column).cloned().unwrap_or_default();
            stored.insert(key, row.clone());
        }
        Outcome::Ok(rows.len())
    }

    async fn select_all(&self, order_by: Option<&str>) -> Outcome<Vec<Record>> {
        if let Some(out) = self.gate(&self.fail_data) {
            return out;
        }
        let mut rows: Vec<Record> = lock(&self.rows).values().cloned().collect();
        if let Some(column) = order_by {
            rows.sort_by(|a, b| a.get(column).cmp(&b.get(column)));
        }
        Outcome::Ok(rows)
    }

    async fn delete_where_in(
        &self,
        column: &str,
        values: &[String],
        _batch_size: usize,
    ) -> Outcome<usize> {
        if let Some(out) = self.gate(&self.fail_data) {
            return out;
        }
        let mut stored = lock(&self.rows);
        let mut deleted = lock(&self.deleted);
        let mut count = 0;
        stored.retain(|_, row| {
            let hit = row
                .get(column)
                .is_some_and(|v| values.iter().any(|x| x == v));
            if hit {
                deleted.push(row.get(column).cloned().unwrap_or_default());
                count += 1;
            }
            !hit
        });
        Outcome::Ok(count)
    }

    async fn get_state(&self, key: &str) -> Outcome<Option<String>> {
        if let Some(out) = self.gate(&self.fail_state) {
            return out;
        }
        Outcome::Ok(lock(&self.state).get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: &str) -> Outcome<()> {
        if let Some(out) = self.gate(&self.fail_state) {
            return out;
        }
        lock(&self.state).insert(key.to_string(), value.to_string());
        Outcome::Ok(())
    }
}

/// Notification sink that records what it was asked to send
pub struct RecordingNotifier {
    enabled: bool,
    fail: AtomicBool,
    texts: Mutex<Vec<(String, bool)>>,
    images: Mutex<Vec<String>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            enabled: true,
            fail: AtomicBool::new(false),
            texts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `(content, at_all)` pairs
    pub fn texts(&self) -> Vec<(String, bool)> {
        lock(&self.texts).clone()
    }

    pub fn images(&self) -> Vec<String> {
        lock(&self.images).clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn send_text(&self, content: &str, at_all: bool) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::api("memory_notifier", 500, "send failed"));
        }
        lock(&self.texts).push((content.to_string(), at_all));
        Ok(())
    }

    async fn send_image(&self, image_base64: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::api("memory_notifier", 500, "send failed"));
        }
        lock(&self.images).push(image_base64.to_string());
        Ok(())
    }
}
