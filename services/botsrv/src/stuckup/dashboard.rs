//! Dashboard summary
//!
//! The dashboard worksheet is formula-driven, so reads are repeated until two
//! consecutive reads match. The settled block is turned into a short paragraph
//! written next to it, and a fixed range can be captured as a PNG for alerts.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::fingerprint::grid_fingerprint;
use crate::config::Settings;
use crate::error::Result;
use crate::integrations::GridStore;
use crate::table_image::render_table_png_base64;

/// Region column used when no "Region" header is found
pub const DEFAULT_REGION_COLUMN: usize = 1;
pub const TOP_N: usize = 3;

const AVG_OFFSET: usize = 1;
const TOTAL_OFFSET: usize = 2;
const LATEST_OFFSET: usize = 3;
const PREVIOUS_OFFSET: usize = 4;
const MARKER_OFFSET: usize = 13;
const CLUSTER_OFFSET: usize = 14;
const HUB_OFFSET: usize = 15;

const CLUSTER_MARKER: &str = "*";
const HUB_HEADER_ARTIFACTS: &[&str] = &["hub", "hub name"];
const ACTION_PREFIX: &str = "Action Taken:";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub block_range: String,
    pub summary_cell: String,
    pub stabilize_retries: u32,
    pub stabilize_delay: Duration,
    pub capture_worksheet: String,
    pub capture_range: String,
}

impl DashboardConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            spreadsheet_id: settings.stuckup_target_spreadsheet_id.clone(),
            worksheet: settings.stuckup_dashboard_worksheet_name.clone(),
            block_range: settings.stuckup_dashboard_block_range.clone(),
            summary_cell: settings.stuckup_dashboard_summary_cell.clone(),
            stabilize_retries: settings.stuckup_dashboard_stabilize_retries,
            stabilize_delay: settings.stabilize_delay(),
            capture_worksheet: settings.stuckup_dashboard_capture_worksheet_name.clone(),
            capture_range: settings.stuckup_dashboard_capture_range.clone(),
        }
    }
}

pub struct Dashboard {
    grid: Arc<dyn GridStore>,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(grid: Arc<dyn GridStore>, config: DashboardConfig) -> Self {
        Self { grid, config }
    }

    /// Read the block until two consecutive reads agree, or retries run out
    pub async fn read_stable_block(&self) -> Result<Vec<Vec<String>>> {
        let cfg = &self.config;
        let mut values = self
            .grid
            .read(&cfg.spreadsheet_id, &cfg.worksheet, &cfg.block_range)
            .await?;
        let mut previous = grid_fingerprint(&values);

        for attempt in 1..=cfg.stabilize_retries {
            tokio::time::sleep(cfg.stabilize_delay).await;
            values = self
                .grid
                .read(&cfg.spreadsheet_id, &cfg.worksheet, &cfg.block_range)
                .await?;
            let current = grid_fingerprint(&values);
            if current == previous {
                debug!("Dashboard block stable after {} re-read(s)", attempt);
                return Ok(values);
            }
            previous = current;
        }

        debug!("Dashboard block still changing, using last read");
        Ok(values)
    }

    /// Rebuild the summary paragraph and write it to the summary cell
    pub async fn refresh_summary(&self) -> Result<String> {
        let block = self.read_stable_block().await?;
        let text = compose_paragraph(&build_summary_from_block(&block));
        let cfg = &self.config;
        self.grid
            .write(
                &cfg.spreadsheet_id,
                &cfg.worksheet,
                &cfg.summary_cell,
                &[vec![text.clone()]],
            )
            .await?;
        info!("Dashboard summary written to {}!{}", cfg.worksheet, cfg.summary_cell);
        Ok(text)
    }

    /// Render the capture range as a base64 PNG
    pub async fn capture_png_base64(&self) -> Result<String> {
        let cfg = &self.config;
        let values = self
            .grid
            .read(&cfg.spreadsheet_id, &cfg.capture_worksheet, &cfg.capture_range)
            .await?;
        render_table_png_base64(&values)
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// Integer with thousands separators stripped, truncated toward zero
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value.trunc() as i64)
}

pub fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn show_count(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct Ranked {
    name: String,
    shown: String,
    score: Option<f64>,
}

fn rank_desc(entries: &mut [Ranked]) {
    entries.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn join_ranked(entries: &[Ranked]) -> String {
    entries
        .iter()
        .map(|e| format!("{} ({})", e.name, e.shown))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[derive(Debug, Default)]
struct Totals {
    average: Option<i64>,
    total: Option<i64>,
    latest: Option<i64>,
    previous: Option<i64>,
}

/// Sentences describing the dashboard block
///
/// Never fails: a block without usable figures yields a two-sentence fallback.
pub fn build_summary_from_block(values: &[Vec<String>]) -> Vec<String> {
    let header = values.iter().enumerate().find_map(|(r, row)| {
        row.iter()
            .position(|c| c.trim().eq_ignore_ascii_case("region"))
            .map(|c| (r, c))
    });
    let (data_start, rc) = match header {
        Some((r, c)) => (r + 1, c),
        None => (0, DEFAULT_REGION_COLUMN),
    };

    let header_row = header.map(|(r, _)| values[r].as_slice()).unwrap_or(&[]);
    let latest_label = match cell(header_row, rc + LATEST_OFFSET) {
        "" => "the latest day".to_string(),
        label => label.to_string(),
    };
    let previous_label = match cell(header_row, rc + PREVIOUS_OFFSET) {
        "" => "the previous day".to_string(),
        label => label.to_string(),
    };

    let mut totals: Option<Totals> = None;
    let mut regions = Vec::new();
    let mut clusters = Vec::new();
    let mut hubs: Vec<Ranked> = Vec::new();

    for row in values.iter().skip(data_start) {
        let region = cell(row, rc);
        if region.eq_ignore_ascii_case("total") {
            totals.get_or_insert(Totals {
                average: parse_count(cell(row, rc + AVG_OFFSET)),
                total: parse_count(cell(row, rc + TOTAL_OFFSET)),
                latest: parse_count(cell(row, rc + LATEST_OFFSET)),
                previous: parse_count(cell(row, rc + PREVIOUS_OFFSET)),
            });
        } else if !region.is_empty() && !region.eq_ignore_ascii_case("region") {
            let total = parse_count(cell(row, rc + TOTAL_OFFSET));
            regions.push(Ranked {
                name: region.to_string(),
                shown: show_count(total),
                score: total.map(|v| v as f64),
            });
        }

        let pct_raw = row.iter().rev().map(|c| c.trim()).find(|c| !c.is_empty()).unwrap_or("");
        let pct = parse_percent(pct_raw);
        let pct_shown = if pct.is_some() { pct_raw.to_string() } else { "n/a".to_string() };

        if cell(row, rc + MARKER_OFFSET) == CLUSTER_MARKER {
            let cluster = cell(row, rc + CLUSTER_OFFSET);
            if !cluster.is_empty() && !cluster.eq_ignore_ascii_case("no cluster") {
                clusters.push(Ranked {
                    name: cluster.to_string(),
                    shown: pct_shown.clone(),
                    score: pct,
                });
            }
        }

        let hub = cell(row, rc + HUB_OFFSET);
        let is_artifact = HUB_HEADER_ARTIFACTS.iter().any(|a| hub.eq_ignore_ascii_case(a));
        if !hub.is_empty() && !is_artifact && !hubs.iter().any(|h| h.name == hub) {
            hubs.push(Ranked {
                name: hub.to_string(),
                shown: pct_shown,
                score: pct,
            });
        }
    }

    if totals.is_none() && regions.is_empty() && clusters.is_empty() && hubs.is_empty() {
        return fallback_sentences();
    }

    rank_desc(&mut regions);
    rank_desc(&mut clusters);
    rank_desc(&mut hubs);
    regions.truncate(TOP_N);
    clusters.truncate(TOP_N);
    hubs.truncate(TOP_N);

    let totals = totals.unwrap_or_default();
    let mut sentences = Vec::with_capacity(4);

    sentences.push(format!(
        "Outbound stuck at SOC staging averaged {} per day with a 7-day total of {}; {} logged {} against {} on {}.",
        show_count(totals.average),
        show_count(totals.total),
        latest_label,
        show_count(totals.latest),
        show_count(totals.previous),
        previous_label,
    ));

    sentences.push(if regions.is_empty() {
        "No single region stood out in the last 7 days.".to_string()
    } else {
        format!("Top contributing regions were {}.", join_ranked(&regions))
    });

    sentences.push(match (clusters.is_empty(), hubs.is_empty()) {
        (true, true) => "No cluster or hub breakdown was available.".to_string(),
        (false, true) => format!("Leading clusters were {}.", join_ranked(&clusters)),
        (true, false) => format!("Leading hubs were {}.", join_ranked(&hubs)),
        (false, false) => format!(
            "Leading clusters were {}, while the leading hubs were {}.",
            join_ranked(&clusters),
            join_ranked(&hubs)
        ),
    });

    let top_hubs: Vec<&str> = hubs.iter().take(2).map(|h| h.name.as_str()).collect();
    sentences.push(match (clusters.first(), top_hubs.is_empty()) {
        (Some(cluster), false) => format!(
            "{} Escalated to {} and coordinated with {} to clear the stuck shipments.",
            ACTION_PREFIX,
            cluster.name,
            join_names(&top_hubs)
        ),
        (Some(cluster), true) => format!(
            "{} Escalated to {} to clear the stuck shipments.",
            ACTION_PREFIX, cluster.name
        ),
        (None, false) => format!(
            "{} Coordinated with {} to clear the stuck shipments.",
            ACTION_PREFIX,
            join_names(&top_hubs)
        ),
        (None, true) => format!(
            "{} Monitoring continues until a cluster or hub stands out.",
            ACTION_PREFIX
        ),
    });

    sentences
}

fn fallback_sentences() -> Vec<String> {
    vec![
        "Dashboard figures are not available yet.".to_string(),
        format!(
            "{} Monitoring continues until the dashboard refreshes.",
            ACTION_PREFIX
        ),
    ]
}

/// Space-join the sentences, setting the "Action Taken:" sentence apart
pub fn compose_paragraph(sentences: &[String]) -> String {
    let (actions, body): (Vec<&String>, Vec<&String>) =
        sentences.iter().partition(|s| s.starts_with(ACTION_PREFIX));
    let body = body
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    match actions.first() {
        Some(action) if body.is_empty() => action.to_string(),
        Some(action) => format!("{}\n\n    {}", body, action),
        None => body,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::integrations::MemoryGridStore;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample_block() -> Vec<Vec<String>> {
        vec![
            row(&["", "Region", "Ave L7D", "Total L7D", "18-Feb", "17-Feb"]),
            row(&["", "RC", "2", "4", "0", "2"]),
            row(&["", "InterSOC", "57", "226", "0", "100"]),
            row(&[
                "", "SOL-IIS", "89", "355", "0", "144", "", "", "", "", "", "", "", "", "*",
                "SOC BCP", "GenSan Tambler Hub", "", "", "30.95%",
            ]),
            row(&[
                "", "MIN", "43", "216", "0", "83", "", "", "", "", "", "", "", "", "*",
                "No Cluster", "SOC 5", "", "", "27.48%",
            ]),
            row(&["", "Total", "199", "830", "0", "335"]),
        ]
    }

    #[test]
    fn test_summary_from_populated_block() {
        let lines = build_summary_from_block(&sample_block());
        let text = lines.join(" ");

        assert_eq!(lines.len(), 4);
        assert!(text.contains("7-day total of 830"));
        assert!(text.contains("averaged 199 per day"));
        assert!(text.contains("18-Feb logged 0 against 335 on 17-Feb"));
        assert!(text.contains("SOL-IIS (355), InterSOC (226), MIN (216)"));
        assert!(text.contains("SOC BCP (30.95%)"));
        assert!(!text.contains("No Cluster"));
        assert!(text.contains("GenSan Tambler Hub (30.95%), SOC 5 (27.48%)"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("Action Taken:")).count(), 1);
        assert!(lines[3].contains("SOC BCP") && lines[3].contains("GenSan Tambler Hub and SOC 5"));
    }

    #[test]
    fn test_region_header_found_in_shifted_column() {
        let shifted: Vec<Vec<String>> = sample_block()
            .into_iter()
            .map(|mut r| {
                r.insert(0, String::new());
                r
            })
            .collect();
        let text = build_summary_from_block(&shifted).join(" ");
        assert!(text.contains("7-day total of 830"));
        assert!(text.contains("SOC BCP"));
    }

    #[test]
    fn test_missing_header_uses_default_column() {
        let block: Vec<Vec<String>> = sample_block().into_iter().skip(1).collect();
        let text = build_summary_from_block(&block).join(" ");
        assert!(text.contains("7-day total of 830"));
        assert!(text.contains("the latest day"));
    }

    #[test]
    fn test_unparsable_numbers_show_na() {
        let block = vec![
            row(&["", "Region", "Ave L7D", "Total L7D", "18-Feb", "17-Feb"]),
            row(&["", "Total", "#REF!", "1,234", "", "7.9"]),
        ];
        let text = build_summary_from_block(&block).join(" ");
        assert!(text.contains("averaged n/a per day"));
        assert!(text.contains("7-day total of 1234"));
        assert!(text.contains("logged n/a against 7 on"));
    }

    #[test]
    fn test_hub_artifacts_and_duplicates_excluded() {
        let header = row(&["", "Region", "Ave L7D", "Total L7D"]);
        let mut hub_header = vec![String::new(); 20];
        hub_header[16] = "Hub".into();
        hub_header[19] = "%".into();
        let mut a = vec![String::new(); 20];
        a[1] = "North".into();
        a[3] = "10".into();
        a[16] = "Hub A".into();
        a[19] = "10%".into();
        let mut b = a.clone();
        b[1] = "South".into();
        b[19] = "50%".into();

        let text = build_summary_from_block(&[header, hub_header, a, b]).join(" ");
        assert!(text.contains("Leading hubs were Hub A (10%)."));
    }

    #[test]
    fn test_empty_block_falls_back() {
        let lines = build_summary_from_block(&[]);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Action Taken:"));
    }

    #[test]
    fn test_compose_paragraph_sets_action_apart() {
        let lines = build_summary_from_block(&sample_block());
        let paragraph = compose_paragraph(&lines);
        let (body, action) = paragraph.split_once("\n\n").unwrap();
        assert!(!body.contains("Action Taken:"));
        assert!(action.trim_start().starts_with("Action Taken:"));
        assert!(action.starts_with(' '));
        assert_eq!(body, lines[..3].join(" "));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_count("1,234.9"), Some(1234));
        assert_eq!(parse_count("-2.7"), Some(-2));
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_percent("30.95%"), Some(30.95));
        assert_eq!(parse_percent(""), None);
    }

    fn config(retries: u32) -> DashboardConfig {
        DashboardConfig {
            spreadsheet_id: "t".into(),
            worksheet: "Dashboard".into(),
            block_range: "A1:T40".into(),
            summary_cell: "W2".into(),
            stabilize_retries: retries,
            stabilize_delay: Duration::from_millis(1),
            capture_worksheet: "Dashboard".into(),
            capture_range: "A1:T30".into(),
        }
    }

    #[tokio::test]
    async fn test_stabilization_stops_on_two_identical_reads() {
        let grid = Arc::new(MemoryGridStore::new());
        grid.script_reads(
            "t",
            "Dashboard",
            "A1:T40",
            vec![
                vec![row(&["loading"])],
                vec![row(&["x"])],
                vec![row(&["x"])],
                vec![row(&["never read"])],
            ],
        );
        let dashboard = Dashboard::new(grid.clone(), config(4));
        let block = dashboard.read_stable_block().await.unwrap();
        assert_eq!(block, vec![row(&["x"])]);
        assert_eq!(grid.read_count(), 3);
    }

    #[tokio::test]
    async fn test_stabilization_uses_last_read_when_exhausted() {
        let grid = Arc::new(MemoryGridStore::new());
        grid.script_reads(
            "t",
            "Dashboard",
            "A1:T40",
            vec![vec![row(&["1"])], vec![row(&["2"])], vec![row(&["3"])]],
        );
        let dashboard = Dashboard::new(grid.clone(), config(2));
        assert_eq!(dashboard.read_stable_block().await.unwrap(), vec![row(&["3"])]);
    }

    #[tokio::test]
    async fn test_refresh_writes_summary_cell() {
        let grid = Arc::new(MemoryGridStore::new());
        grid.set_sheet("t", "Dashboard", sample_block());
        let dashboard = Dashboard::new(grid.clone(), config(1));

        let text = dashboard.refresh_summary().await.unwrap();
        let sheet = grid.sheet("t", "Dashboard");
        assert_eq!(sheet[1][22], text);
        assert!(text.contains("\n\n    Action Taken:"));
    }
}
