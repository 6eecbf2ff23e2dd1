//! External collaborators: spreadsheet grid, relational table store and the
//! outbound notification sink
//!
//! Each collaborator is a trait with an HTTP implementation and an in-memory
//! implementation in [`memory`] for tests and local runs.

pub mod google_auth;
pub mod grid;
pub mod memory;
pub mod outcome;
pub mod table_store;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use grid::{GoogleSheetsClient, GridStore, WriteSummary};
pub use memory::{MemoryGridStore, MemoryTableStore, RecordingNotifier};
pub use outcome::Outcome;
pub use table_store::{SupabaseClient, TableStore};

/// One row keyed by normalized column name
pub type Record = BTreeMap<String, String>;

/// Outbound channel for dashboard alerts
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Whether a destination is configured at all
    fn enabled(&self) -> bool;

    async fn send_text(&self, content: &str, at_all: bool) -> Result<()>;

    async fn send_image(&self, image_base64: &str) -> Result<()>;
}

/// Render a JSON cell the way the spreadsheet would show it
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!(null)), "");
        assert_eq!(cell_to_string(&json!("SOC_Packed")), "SOC_Packed");
        assert_eq!(cell_to_string(&json!(42)), "42");
        assert_eq!(cell_to_string(&json!(1.5)), "1.5");
        assert_eq!(cell_to_string(&json!(true)), "true");
    }
}
