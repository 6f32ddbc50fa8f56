//! Table output for lineages and search reports using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{EvaluationResult, Lineage};
use crate::services::{SearchReport, StopReason};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// One row per revision: index, id, version, target flag, parents, result.
    pub fn format_lineage(&self, lineage: &Lineage) -> String {
        let mut table = base_table();
        table.set_header(
            ["#", "Revision", "Version", "Target", "Parents", "Result"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for (index, (revision, result)) in lineage.results().enumerate() {
            let parents = lineage
                .links(index)
                .map(|links| {
                    links
                        .parents
                        .iter()
                        .filter_map(|p| lineage.get(*p))
                        .map(|r| r.id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();

            let result_cell = if self.use_colors {
                Cell::new(result.to_string()).fg(result_color(result))
            } else {
                Cell::new(result.to_string())
            };

            table.add_row(vec![
                Cell::new(index),
                Cell::new(revision.id.to_string()),
                Cell::new(revision.version.as_deref().unwrap_or("-")),
                Cell::new(if revision.evaluation_target { "yes" } else { "no" }),
                Cell::new(if parents.is_empty() { "-".to_string() } else { parents }),
                result_cell,
            ]);
        }

        table.to_string()
    }

    pub fn format_report(&self, report: &SearchReport) -> String {
        let mut table = base_table();
        let frontier = report
            .frontier
            .as_ref()
            .map(|(before, after)| format!("{before} -> {after}"))
            .unwrap_or_else(|| "not found".to_string());
        let stop = match report.stop_reason {
            StopReason::Exhausted => "exhausted",
            StopReason::StopRequested => "stop requested",
        };
        let elapsed = report.finished_at - report.started_at;

        let frontier_cell = match (&report.frontier, self.use_colors) {
            (Some(_), true) => Cell::new(frontier).fg(Color::Green).add_attribute(Attribute::Bold),
            (None, true) => Cell::new(frontier).fg(Color::Yellow),
            _ => Cell::new(frontier),
        };

        table.add_row(vec![Cell::new("Run"), Cell::new(report.run_id)]);
        table.add_row(vec![Cell::new("Strategy"), Cell::new(&report.strategy)]);
        table.add_row(vec![Cell::new("Transition"), frontier_cell]);
        table.add_row(vec![Cell::new("Dispatched"), Cell::new(report.dispatched)]);
        table.add_row(vec![Cell::new("Cached"), Cell::new(report.cached)]);
        table.add_row(vec![Cell::new("Failed"), Cell::new(report.failed)]);
        table.add_row(vec![Cell::new("Stopped"), Cell::new(stop)]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{}s", elapsed.num_seconds())),
        ]);
        table.to_string()
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn result_color(result: &EvaluationResult) -> Color {
    match result {
        EvaluationResult::Positive => Color::Green,
        EvaluationResult::Negative => Color::Blue,
        EvaluationResult::BuildUnavailable => Color::DarkGrey,
        EvaluationResult::Error(_) => Color::Red,
        EvaluationResult::Undefined => Color::Reset,
    }
}

/// Respect NO_COLOR and dumb terminals.
fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Revision, RevisionId};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_lineage_rows() {
        let ids = (10..13).map(RevisionId::Position).collect();
        let mut lineage = Lineage::from_ids(ids, None).unwrap();
        lineage
            .record_result(&RevisionId::Position(11), EvaluationResult::Positive)
            .unwrap();

        let rendered = TableFormatter::with_colors(false).format_lineage(&lineage);
        assert!(rendered.contains("Revision"));
        assert!(rendered.contains("positive"));
        assert!(rendered.contains("undefined"));
    }

    #[test]
    fn test_report_shows_transition() {
        let now = Utc::now();
        let report = SearchReport {
            run_id: Uuid::new_v4(),
            strategy: "bin_search".to_string(),
            started_at: now,
            finished_at: now,
            frontier: Some((Revision::new(4u64), Revision::new(5u64))),
            cached: 1,
            dispatched: 4,
            failed: 0,
            stop_reason: StopReason::Exhausted,
        };
        let rendered = TableFormatter::with_colors(false).format_report(&report);
        assert!(rendered.contains("4 -> 5"));
        assert!(rendered.contains("bin_search"));
        assert!(rendered.contains("exhausted"));
    }
}
