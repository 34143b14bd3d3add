//! Portfolio views over saved scenarios: summary, side-by-side comparison,
//! and CSV export.

use chrono::SecondsFormat;
use serde::Serialize;
use std::fmt::Write as _;

use crate::models::Scenario;

/// Aggregate figures across a scenario list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total: usize,
    pub avg_monthly_savings: f64,
    /// Label of the scenario with the highest monthly savings (first wins ties).
    pub top: Option<String>,
}

pub fn summarize(scenarios: &[Scenario]) -> PortfolioSummary {
    if scenarios.is_empty() {
        return PortfolioSummary {
            total: 0,
            avg_monthly_savings: 0.0,
            top: None,
        };
    }

    let total = scenarios.len();
    let sum: f64 = scenarios.iter().map(|s| s.result.monthly_savings).sum();
    let top = scenarios
        .iter()
        .reduce(|best, s| {
            if s.result.monthly_savings > best.result.monthly_savings {
                s
            } else {
                best
            }
        })
        .map(Scenario::label);

    PortfolioSummary {
        total,
        avg_monthly_savings: sum / total as f64,
        top,
    }
}

/// One metric row of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub metric: &'static str,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub left_label: String,
    pub right_label: String,
    pub rows: Vec<ComparisonRow>,
}

const MISSING: &str = "—";

fn money(value: f64) -> String {
    format!("${value:.2}")
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v:.1}"))
}

fn row(
    metric: &'static str,
    left: &Scenario,
    right: &Scenario,
    cell: impl Fn(&Scenario) -> String,
) -> ComparisonRow {
    ComparisonRow {
        metric,
        left: cell(left),
        right: cell(right),
    }
}

pub fn compare(left: &Scenario, right: &Scenario) -> Comparison {
    Comparison {
        left_label: left.label(),
        right_label: right.label(),
        rows: vec![
            row("Monthly savings", left, right, |s| money(s.result.monthly_savings)),
            row("Labor cost (monthly)", left, right, |s| {
                money(s.result.labor_cost_manual)
            }),
            row("Automation cost (monthly)", left, right, |s| {
                money(s.result.auto_cost)
            }),
            row("ROI (%)", left, right, |s| percent(s.result.roi_percentage)),
        ],
    }
}

impl Comparison {
    /// Plain-text table with padded columns.
    pub fn render_text(&self) -> String {
        let headers = ["Metric", self.left_label.as_str(), self.right_label.as_str()];
        let mut widths = headers.map(|h| h.chars().count());
        for r in &self.rows {
            for (w, cell) in widths.iter_mut().zip([r.metric, r.left.as_str(), r.right.as_str()]) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let mut line = |cells: [&str; 3]| {
            let padded: Vec<String> = cells
                .iter()
                .zip(widths)
                .map(|(c, w)| format!("{c:<w$}"))
                .collect();
            let _ = writeln!(out, "{}", padded.join("  ").trim_end());
        };
        line(headers);
        for r in &self.rows {
            line([r.metric, r.left.as_str(), r.right.as_str()]);
        }
        out
    }
}

const CSV_COLUMNS: [&str; 4] = [
    "scenario_name",
    "monthly_invoice_volume",
    "monthly_savings",
    "createdAt",
];

fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Export the list as CSV. Every cell is quoted; an empty list yields an
/// empty header line.
pub fn to_csv(scenarios: &[Scenario]) -> String {
    if scenarios.is_empty() {
        return "\n".to_string();
    }

    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    let rows: Vec<String> = scenarios
        .iter()
        .map(|s| {
            [
                s.input.scenario_name.clone().unwrap_or_default(),
                s.input.monthly_invoice_volume.to_string(),
                s.result.monthly_savings.to_string(),
                s.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ]
            .iter()
            .map(|v| csv_cell(v))
            .collect::<Vec<_>>()
            .join(",")
        })
        .collect();
    out.push_str(&rows.join("\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScenarioId, SimulationInput};
    use crate::scenarios::draft_for;
    use chrono::{Duration, TimeZone, Utc};

    fn scenario(name: Option<&str>, volume: f64, cost: f64) -> Scenario {
        let input = SimulationInput {
            scenario_name: name.map(str::to_string),
            monthly_invoice_volume: volume,
            one_time_implementation_cost: cost,
            ..SimulationInput::starter()
        };
        draft_for(input).into_scenario(ScenarioId::mint_durable())
    }

    #[test]
    fn test_summary_of_empty_list() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_monthly_savings, 0.0);
        assert!(summary.top.is_none());
    }

    #[test]
    fn test_summary_picks_top_by_monthly_savings() {
        let small = scenario(Some("small"), 100.0, 1000.0);
        let big = scenario(Some("big"), 5000.0, 1000.0);
        let summary = summarize(&[small.clone(), big.clone()]);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.top.as_deref(), Some("big"));
        let expected = (small.result.monthly_savings + big.result.monthly_savings) / 2.0;
        assert!((summary.avg_monthly_savings - expected).abs() < 1e-9);
    }

    #[test]
    fn test_compare_formats_cells() {
        let left = scenario(Some("A"), 2000.0, 50_000.0);
        let right = scenario(Some("B"), 2000.0, 0.0);
        let cmp = compare(&left, &right);

        assert_eq!(cmp.left_label, "A");
        assert_eq!(cmp.rows[2].left, "$400.00");
        assert_eq!(cmp.rows[3].left, "2308.2");
        assert_eq!(cmp.rows[3].right, "—");

        let text = cmp.render_text();
        assert!(text.starts_with("Metric"));
        assert!(text.contains("Automation cost (monthly)  $400.00"));
    }

    #[test]
    fn test_csv_quotes_every_cell() {
        let quoted = scenario(Some("Say \"hi\""), 2000.0, 1.0);
        let unnamed = scenario(None, 10.0, 1.0);
        let csv = to_csv(&[quoted, unnamed]);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], "scenario_name,monthly_invoice_volume,monthly_savings,createdAt");
        assert!(lines[1].starts_with("\"Say \"\"hi\"\"\",\"2000\","));
        assert!(lines[2].starts_with("\"\",\"10\","));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_created_at_uses_millis_and_z() {
        let mut s = scenario(Some("ts"), 1.0, 1.0);
        s.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + Duration::microseconds(123_456);
        let csv = to_csv(&[s]);

        assert!(csv.ends_with(",\"2024-03-09T14:05:07.123Z\""));
    }

    #[test]
    fn test_csv_of_empty_list() {
        assert_eq!(to_csv(&[]), "\n");
    }
}
