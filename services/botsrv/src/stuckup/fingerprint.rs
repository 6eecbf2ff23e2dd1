//! Content fingerprints for change detection

use sha2::{Digest, Sha256};

use crate::integrations::Record;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a single row of cells (the reference row)
pub fn row_fingerprint(cells: &[String]) -> String {
    // Vec<String> serialization cannot fail
    let json = serde_json::to_string(cells).unwrap_or_default();
    sha256_hex(json.as_bytes())
}

/// Order-independent fingerprint of a filtered record set
///
/// Each record serializes with sorted keys; records are then sorted by their
/// serialized form, so source row order does not matter.
pub fn data_hash(records: &[Record]) -> String {
    let mut lines: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .collect();
    lines.sort();
    let json = format!("[{}]", lines.join(","));
    sha256_hex(json.as_bytes())
}

/// Fingerprint of a block of cells, used to detect when a formula range settles
pub fn grid_fingerprint(rows: &[Vec<String>]) -> String {
    let json = serde_json::to_string(rows).unwrap_or_default();
    sha256_hex(json.as_bytes())
}
