//! Terminal tables for query results and summaries.
//!
//! Rendering is a pure function of the artifacts; [`ConsoleReporter`] only
//! prints what [`render_results`] and [`render_summary`] return. Colour is
//! applied with the `colored` crate after padding so columns stay aligned.

use colored::Colorize;
use std::io::IsTerminal;

use super::{optional, query_set_label, ReportContext, Reporter};
use crate::error::Result;
use crate::query::QueryResult;
use crate::summary::Summary;

/// Gap between columns.
const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

struct Column {
    header: &'static str,
    align: Align,
}

const fn col(header: &'static str, align: Align) -> Column {
    Column { header, align }
}

const RESULT_COLUMNS: [Column; 9] = [
    col("Query #", Align::Left),
    col("Name", Align::Left),
    col("Status", Align::Center),
    col("Total (ms)", Align::Right),
    col("Query (ms)", Align::Right),
    col("Queued (ms)", Align::Right),
    col("Network (ms)", Align::Right),
    col("Rows", Align::Right),
    col("Error", Align::Left),
];

const STATUS_COLUMN: usize = 2;

const SUMMARY_COLUMNS: [Column; 13] = [
    col("Test", Align::Left),
    col("Set", Align::Left),
    col("Iter", Align::Right),
    col("Started", Align::Left),
    col("Clean", Align::Center),
    col("Total (ms)", Align::Right),
    col("Query (ms)", Align::Right),
    col("Queued (ms)", Align::Right),
    col("Network (ms)", Align::Right),
    col("VI", Align::Center),
    col("Agg Par", Align::Right),
    col("CQEL", Align::Right),
    col("CQL", Align::Right),
];

const CLEAN_COLUMN: usize = 4;

const WARNING_COLUMNS: [Column; 3] = [
    col("Query #", Align::Left),
    col("Name", Align::Left),
    col("Status", Align::Left),
];

/// Prints results and summaries to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Creates a console reporter.
    ///
    /// Colour is disabled when `no_color` is set or stdout is not a terminal.
    pub fn new(no_color: bool) -> Self {
        if no_color || !std::io::stdout().is_terminal() {
            colored::control::set_override(false);
        }
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn report(
        &mut self,
        ctx: &ReportContext<'_>,
        results: &[QueryResult],
        summary: &Summary,
    ) -> Result<()> {
        println!("{}", render_results(results));
        println!("{}", render_summary(ctx, summary));
        Ok(())
    }
}

/// Renders the per-query table.
pub fn render_results(results: &[QueryResult]) -> String {
    let rows: Vec<Vec<String>> = results.iter().map(result_row).collect();

    render_table(&RESULT_COLUMNS, &rows, |column, raw, padded| {
        if column != STATUS_COLUMN {
            return padded;
        }
        match raw {
            "success" => padded.green().to_string(),
            "error" | "invalid" => padded.red().to_string(),
            "timeout" | "exhausted" => padded.yellow().to_string(),
            _ => padded,
        }
    })
}

fn result_row(result: &QueryResult) -> Vec<String> {
    let mut row = vec![
        result.query_num.to_string(),
        result.name.clone(),
        result.kind().as_str().to_string(),
    ];

    match result.outcome.timings() {
        Some(t) => row.extend([
            t.round_trip_ms.to_string(),
            t.query_ms.to_string(),
            t.queued_ms.to_string(),
            t.network_ms.to_string(),
            t.row_count.to_string(),
            String::new(),
        ]),
        None => {
            row.extend(std::iter::repeat(String::new()).take(5));
            row.push(result.outcome.message().unwrap_or("").to_string());
        }
    }

    debug_assert_eq!(row.len(), RESULT_COLUMNS.len());
    row
}

/// Renders the summary table, followed by the warnings table when there are any.
pub fn render_summary(ctx: &ReportContext<'_>, summary: &Summary) -> String {
    let capacity = &ctx.target.capacity;
    let row = vec![
        ctx.test_name.to_string(),
        query_set_label(summary),
        ctx.iteration.to_string(),
        ctx.stats.started_display(),
        summary.clean.to_string(),
        summary.total_ms.to_string(),
        summary.query_ms.to_string(),
        summary.queued_ms.to_string(),
        summary.network_ms.to_string(),
        capacity.vi_size.clone().unwrap_or_default(),
        optional(&capacity.aggregator_parallelism),
        optional(&capacity.concurrent_query_execution_limit),
        optional(&capacity.concurrent_queries_limit),
    ];

    let mut out = render_table(&SUMMARY_COLUMNS, &[row], |column, raw, padded| {
        match (column, raw) {
            (CLEAN_COLUMN, "true") => padded.green().to_string(),
            (CLEAN_COLUMN, "false") => padded.red().to_string(),
            _ => padded,
        }
    });

    if !summary.warnings.is_empty() {
        let rows: Vec<Vec<String>> = summary
            .warnings
            .iter()
            .map(|w| vec![w.query_num.to_string(), w.name.clone(), w.message.clone()])
            .collect();
        out.push_str("\n--- WARNINGS ---\n");
        out.push_str(&render_table(&WARNING_COLUMNS, &rows, |_, _, padded| padded));
    }

    out
}

/// Lays out a borderless table. `style` sees each cell's column, raw text and padded text.
fn render_table<F>(columns: &[Column], rows: &[Vec<String>], style: F) -> String
where
    F: Fn(usize, &str, String) -> String,
{
    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let header = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(c.header, *w, c.align).bold().to_string())
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);

    let mut lines = vec![header.trim_end().to_string()];
    for row in rows {
        let line = row
            .iter()
            .zip(columns.iter().zip(&widths))
            .enumerate()
            .map(|(idx, (cell, (c, w)))| style(idx, cell, pad(cell, *w, c.align)))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

fn pad(text: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{text:<width$}"),
        Align::Center => format!("{text:^width$}"),
        Align::Right => format!("{text:>width$}"),
    }
}
