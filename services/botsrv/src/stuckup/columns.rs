//! Column arithmetic, header normalization and export column resolution
//!
//! Everything here is pure; collaborators are not involved.

use std::collections::{HashMap, HashSet};

use crate::error::{BotError, Result};
use crate::integrations::Record;

/// Zero-based index of a column letter sequence: `A` -> 0, `Z` -> 25, `AA` -> 26
///
/// Case-insensitive. Returns `None` for an empty or non-alphabetic input.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// Column letters for a zero-based index: 0 -> `A`, 26 -> `AA`
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn letters_of(part: &str) -> String {
    part.chars().filter(|c| c.is_ascii_alphabetic()).collect()
}

/// Resolve `"B1:E,I1:J,M"` into ordered, de-duplicated zero-based indices
///
/// Row digits are ignored, reversed pairs expand ascending, and tokens without
/// letters are skipped.
pub fn parse_column_ranges(expr: &str) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for token in expr.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let span = match token.split_once(':') {
            Some((start, end)) => {
                match (column_index(&letters_of(start)), column_index(&letters_of(end))) {
                    (Some(a), Some(b)) => Some((a.min(b), a.max(b))),
                    _ => None,
                }
            },
            None => column_index(&letters_of(token)).map(|i| (i, i)),
        };

        let Some((lo, hi)) = span else {
            continue;
        };
        for idx in lo..=hi {
            if seen.insert(idx) {
                out.push(idx);
            }
        }
    }
    out
}

/// Lowercase, collapse non-alphanumeric runs to `_`, trim `_`
pub fn normalize_header_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut pending_sep = false;
    for c in header.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Normalize a header row; empty names become `col_N` (1-based) and repeats get
/// `_2`, `_3`, ... suffixes
pub fn normalize_headers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut base = normalize_header_name(header.as_ref());
            if base.is_empty() {
                base = format!("col_{}", idx + 1);
            }
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}_{}", base, count)
            }
        })
        .collect()
}

/// How export columns are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStrategy {
    /// Display headers requested by name
    ByName(Vec<String>),
    /// Column-range expression over the source header row
    ByRange(String),
}

impl ExportStrategy {
    /// A non-empty name list wins over the range expression
    pub fn select(names: Vec<String>, ranges: &str) -> Self {
        if names.is_empty() {
            ExportStrategy::ByRange(ranges.to_string())
        } else {
            ExportStrategy::ByName(names)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    /// Header written to the target sheet
    pub display: String,
    /// Normalized key looked up in stored rows
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportColumnSpec {
    pub columns: Vec<ExportColumn>,
}

impl ExportColumnSpec {
    /// Resolve export columns against one source read
    ///
    /// `source_headers` and `normalized` are parallel. Indices past the header
    /// width are dropped; an empty result is an error.
    pub fn resolve(
        strategy: &ExportStrategy,
        source_headers: &[String],
        normalized: &[String],
    ) -> Result<Self> {
        let columns: Vec<ExportColumn> = match strategy {
            ExportStrategy::ByName(names) => {
                let lookup: HashMap<&str, &str> = source_headers
                    .iter()
                    .zip(normalized)
                    .map(|(s, n)| (s.as_str(), n.as_str()))
                    .collect();
                names
                    .iter()
                    .map(|name| ExportColumn {
                        display: name.clone(),
                        key: lookup
                            .get(name.as_str())
                            .map(|k| k.to_string())
                            .unwrap_or_else(|| normalize_header_name(name)),
                    })
                    .collect()
            },
            ExportStrategy::ByRange(expr) => parse_column_ranges(expr)
                .into_iter()
                .filter(|&idx| idx < source_headers.len() && idx < normalized.len())
                .map(|idx| ExportColumn {
                    display: source_headers[idx].clone(),
                    key: normalized[idx].clone(),
                })
                .collect(),
        };

        if columns.is_empty() {
            return Err(BotError::InvalidInput(
                "no export columns resolved".to_string(),
            ));
        }
        Ok(Self { columns })
    }

    /// Keep at most `max` columns (0 = unlimited); returns how many were dropped
    pub fn truncate(&mut self, max: usize) -> usize {
        if max == 0 || self.columns.len() <= max {
            return 0;
        }
        let dropped = self.columns.len() - max;
        self.columns.truncate(max);
        dropped
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.display.clone()).collect()
    }

    /// Project one stored row; missing keys export as empty cells
    pub fn project(&self, row: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| row.get(&c.key).cloned().unwrap_or_default())
            .collect()
    }

    /// Letter of the last exported column, for sizing the cleared range
    pub fn last_column_letter(&self) -> String {
        column_letter(self.columns.len().saturating_sub(1))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_column_index_and_letter() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("AL"), Some(37));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
        for idx in [0, 25, 26, 51, 52, 701, 702] {
            assert_eq!(column_index(&column_letter(idx)), Some(idx));
        }
        assert_eq!(column_letter(701), "ZZ");
    }

    #[test]
    fn test_parse_single_range() {
        assert_eq!(parse_column_ranges("B1:E"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_default_export_ranges() {
        let idx = parse_column_ranges("B1:E,I1:J,M,Q1:U,Y1:AA,AH1:AK");
        assert_eq!(
            idx,
            vec![1, 2, 3, 4, 8, 9, 12, 16, 17, 18, 19, 20, 24, 25, 26, 33, 34, 35, 36]
        );
    }

    #[test]
    fn test_parse_reversed_duplicates_and_garbage() {
        assert_eq!(parse_column_ranges("E:B, C, 12, :, M"), vec![1, 2, 3, 4, 12]);
        assert_eq!(parse_column_ranges("D,B:C,A"), vec![3, 1, 2, 0]);
        assert!(parse_column_ranges("1:2, ,").is_empty());
    }

    #[test]
    fn test_normalize_duplicates() {
        assert_eq!(
            normalize_headers(&["Status", "status", "STATUS"]),
            strings(&["status", "status_2", "status_3"])
        );
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(normalize_header_name("  Shipment ID "), "shipment_id");
        assert_eq!(normalize_header_name("Status-Desc (Latest)"), "status_desc_latest");
        assert_eq!(normalize_header_name("__x__"), "x");
        assert_eq!(
            normalize_headers(&["", "Hub", "", "hub"]),
            strings(&["col_1", "hub", "col_3", "hub_2"])
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = ["Shipment ID", "Status Desc", "status desc", "", "% Done!"];
        let once = normalize_headers(&raw);
        let twice = normalize_headers(&once);
        assert_eq!(once, twice);
        for name in &once {
            assert_eq!(&normalize_header_name(name), name);
        }
    }

    #[test]
    fn test_resolve_by_range_drops_out_of_width() {
        let source = strings(&["ID", "Status Desc", "Hub"]);
        let normalized = normalize_headers(&source);
        let spec = ExportColumnSpec::resolve(
            &ExportStrategy::ByRange("B:C,Z".into()),
            &source,
            &normalized,
        )
        .unwrap();
        assert_eq!(spec.headers(), strings(&["Status Desc", "Hub"]));
        assert_eq!(spec.columns[0].key, "status_desc");
    }

    #[test]
    fn test_resolve_by_name_falls_back_to_normalized_request() {
        let source = strings(&["Shipment ID", "Status Desc"]);
        let normalized = normalize_headers(&source);
        let spec = ExportColumnSpec::resolve(
            &ExportStrategy::ByName(strings(&["Status Desc", "Renamed Col"])),
            &source,
            &normalized,
        )
        .unwrap();
        assert_eq!(spec.columns[0].key, "status_desc");
        assert_eq!(spec.columns[1].key, "renamed_col");

        let mut row = Record::new();
        row.insert("status_desc".into(), "SOC_Packed".into());
        assert_eq!(spec.project(&row), strings(&["SOC_Packed", ""]));
    }

    #[test]
    fn test_resolve_empty_is_error() {
        let source = strings(&["A"]);
        let normalized = normalize_headers(&source);
        let err = ExportColumnSpec::resolve(&ExportStrategy::ByRange("Q:U".into()), &source, &normalized)
            .unwrap_err();
        assert!(err.to_string().contains("no export columns"));
    }

    #[test]
    fn test_strategy_selection_and_truncate() {
        assert_eq!(
            ExportStrategy::select(vec![], "B:E"),
            ExportStrategy::ByRange("B:E".into())
        );
        assert!(matches!(
            ExportStrategy::select(strings(&["ID"]), "B:E"),
            ExportStrategy::ByName(_)
        ));

        let source = strings(&["a", "b", "c", "d"]);
        let normalized = normalize_headers(&source);
        let mut spec =
            ExportColumnSpec::resolve(&ExportStrategy::ByRange("A:D".into()), &source, &normalized)
                .unwrap();
        assert_eq!(spec.truncate(0), 0);
        assert_eq!(spec.truncate(3), 1);
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.last_column_letter(), "C");
    }
}
