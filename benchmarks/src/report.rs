//! Comparison tables, summaries and CSV output
//!
//! The aggregator reports raw differences (positive when A's value is larger).
//! Here every row is turned around so that a positive percentage always means
//! backend A did better: rates are better when higher, memory and total time
//! when lower.

use std::fmt::Write as _;

use serde::Serialize;

use crate::aggregator::{BenchmarkResult, Comparison, RunDelta, ScalabilityReport, Winner};
use crate::error::{BenchError, Result};

/// Which direction of a metric counts as better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub metric: &'static str,
    pub value_a: f64,
    pub value_b: f64,
    /// Advantage of A over B in percent; negative when B is better
    pub advantage_pct: f64,
    pub preference: Preference,
    pub winner: Winner,
}

/// Winner per metric plus the overall verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub insert_winner: Winner,
    pub query_winner: Winner,
    pub memory_winner: Winner,
    pub time_winner: Winner,
    /// The backend that wins both rates, otherwise a tie
    pub overall: Winner,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub backend_a: String,
    pub backend_b: String,
    pub rows: Vec<ReportRow>,
    pub summary: Summary,
}

fn negate(pct: f64) -> f64 {
    if pct == 0.0 {
        0.0
    } else {
        -pct
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn comparison(comparison: &Comparison) -> ComparisonReport {
        let a = &comparison.result_a;
        let b = &comparison.result_b;
        let row = |metric, va: f64, vb: f64, advantage_pct, preference| {
            let pair_a = (a.backend_name.as_str(), va);
            let pair_b = (b.backend_name.as_str(), vb);
            ReportRow {
                metric,
                value_a: va,
                value_b: vb,
                advantage_pct,
                preference,
                winner: match preference {
                    Preference::HigherIsBetter => Winner::higher(pair_a, pair_b),
                    Preference::LowerIsBetter => Winner::lower(pair_a, pair_b),
                },
            }
        };

        let rows = vec![
            row(
                "Insert (ops/s)",
                a.insert_ops_per_second(),
                b.insert_ops_per_second(),
                comparison.insert_performance,
                Preference::HigherIsBetter,
            ),
            row(
                "Query (ops/s)",
                a.query_ops_per_second(),
                b.query_ops_per_second(),
                comparison.query_performance,
                Preference::HigherIsBetter,
            ),
            row(
                "Memory (MB)",
                a.total_memory(),
                b.total_memory(),
                negate(comparison.memory_difference),
                Preference::LowerIsBetter,
            ),
            row(
                "Total time (s)",
                a.total_time(),
                b.total_time(),
                negate(comparison.total_time_difference),
                Preference::LowerIsBetter,
            ),
        ];

        let insert_winner = rows[0].winner.clone();
        let query_winner = rows[1].winner.clone();
        let overall = match (&insert_winner, &query_winner) {
            (Winner::Backend(x), Winner::Backend(y)) if x == y => insert_winner.clone(),
            _ => Winner::Tie,
        };

        let summary = Summary {
            memory_winner: rows[2].winner.clone(),
            time_winner: rows[3].winner.clone(),
            insert_winner,
            query_winner,
            overall,
        };

        ComparisonReport {
            backend_a: comparison.backend_a.clone(),
            backend_b: comparison.backend_b.clone(),
            rows,
            summary,
        }
    }

    /// Plain-text table, one row per metric
    pub fn render_table(report: &ComparisonReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<16} {:>16} {:>16} {:>12}  {}",
            "Metric", report.backend_a, report.backend_b, "Difference", "Winner"
        );
        let _ = writeln!(out, "{}", "-".repeat(76));
        for row in &report.rows {
            let _ = writeln!(
                out,
                "{:<16} {:>16} {:>16} {:>11.1}%  {}",
                row.metric,
                format_number(row.value_a),
                format_number(row.value_b),
                row.advantage_pct,
                row.winner
            );
        }
        out
    }

    /// Narrative lines naming the winner of every metric
    pub fn narrative(report: &ComparisonReport) -> Vec<String> {
        let mut lines = Vec::with_capacity(report.rows.len() + 1);
        for row in &report.rows {
            let line = match &row.winner {
                Winner::Tie => format!("{}: no difference", row.metric),
                Winner::Backend(name) => {
                    format!(
                        "{}: {} wins by {:.1}%",
                        row.metric,
                        name,
                        row.advantage_pct.abs()
                    )
                }
            };
            lines.push(line);
        }
        lines.push(match &report.summary.overall {
            Winner::Backend(name) => format!("Overall: {} wins both insert and query", name),
            Winner::Tie => "Overall: tie".to_string(),
        });
        lines
    }

    pub fn render_scalability(report: &ScalabilityReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Scalability at {}x volume (100% = linear)",
            report.scale_factor
        );
        let _ = writeln!(
            out,
            "{:<16} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Backend", "Insert eff", "Query eff", "Insert rate", "Query rate", "Memory", "Time"
        );
        for b in &report.backends {
            let _ = writeln!(
                out,
                "{:<16} {:>11.1}% {:>11.1}% {:>11.0}% {:>11.0}% {:>11.0}% {:>11.0}%",
                b.backend_name,
                b.insert_efficiency * 100.0,
                b.query_efficiency * 100.0,
                b.insert_rate_growth,
                b.query_rate_growth,
                b.memory_growth,
                b.time_growth
            );
        }
        let _ = writeln!(out, "Insert scaling winner: {}", report.insert_winner);
        let _ = writeln!(out, "Query scaling winner: {}", report.query_winner);
        out
    }

    pub fn render_delta(delta: &RunDelta) -> String {
        format!(
            "{}: insert {:+.1}%, query {:+.1}%, memory {:+.1}%, time {:+.1}%",
            delta.backend_name,
            delta.insert_improvement,
            delta.query_improvement,
            delta.memory_improvement,
            delta.time_improvement
        )
    }

    pub fn results_to_csv(results: &[BenchmarkResult]) -> Result<String> {
        write_csv(
            &[
                "backend_name",
                "sample_size",
                "insert_ops_per_second",
                "query_ops_per_second",
                "insert_time",
                "query_time",
                "total_time",
                "memory_used",
                "records_inserted",
            ],
            results.iter().map(|result| {
                vec![
                    result.backend_name.clone(),
                    result.sample_size.to_string(),
                    result.insert_ops_per_second().to_string(),
                    result.query_ops_per_second().to_string(),
                    result.insert_sample.elapsed_seconds.to_string(),
                    result.query_sample.elapsed_seconds.to_string(),
                    result.total_time().to_string(),
                    result.total_memory().to_string(),
                    result.insert_sample.item_count.to_string(),
                ]
            }),
        )
    }

    pub fn comparison_to_csv(report: &ComparisonReport) -> Result<String> {
        write_csv(
            &[
                "metric",
                report.backend_a.as_str(),
                report.backend_b.as_str(),
                "advantage_pct",
                "winner",
            ],
            report.rows.iter().map(|row| {
                vec![
                    row.metric.to_string(),
                    row.value_a.to_string(),
                    row.value_b.to_string(),
                    row.advantage_pct.to_string(),
                    row.winner.to_string(),
                ]
            }),
        )
    }

    pub fn deltas_to_csv(deltas: &[RunDelta]) -> Result<String> {
        write_csv(
            &[
                "backend_name",
                "insert_improvement",
                "query_improvement",
                "memory_improvement",
                "time_improvement",
            ],
            deltas.iter().map(|d| {
                vec![
                    d.backend_name.clone(),
                    d.insert_improvement.to_string(),
                    d.query_improvement.to_string(),
                    d.memory_improvement.to_string(),
                    d.time_improvement.to_string(),
                ]
            }),
        )
    }

    pub fn scalability_to_csv(report: &ScalabilityReport) -> Result<String> {
        write_csv(
            &[
                "backend_name",
                "insert_efficiency",
                "query_efficiency",
                "insert_rate_growth",
                "query_rate_growth",
                "memory_growth",
                "time_growth",
            ],
            report.backends.iter().map(|b| {
                vec![
                    b.backend_name.clone(),
                    b.insert_efficiency.to_string(),
                    b.query_efficiency.to_string(),
                    b.insert_rate_growth.to_string(),
                    b.query_rate_growth.to_string(),
                    b.memory_growth.to_string(),
                    b.time_growth.to_string(),
                ]
            }),
        )
    }
}

/// Header plus rows with fields quoted where needed, `\n`-terminated
fn write_csv<I>(header: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let csv_error = |e: csv::Error| BenchError::Serialization(e.to_string());

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(header).map_err(csv_error)?;
    for row in rows {
        wtr.write_record(&row).map_err(csv_error)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| BenchError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BenchError::Serialization(e.to_string()))
}

/// Thousands-separated above 1000, one decimal below
pub fn format_number(value: f64) -> String {
    if value.abs() < 1000.0 {
        return format!("{:.1}", value);
    }

    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
