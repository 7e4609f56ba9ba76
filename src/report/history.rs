//! CSV history files.
//!
//! Each dispatched query set appends one row per query to the details file
//! and one row to the summary file. Files are created with a header row on
//! first use and only appended to afterwards, so history accumulates across
//! runs and can be correlated by `run_id`.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{query_set_label, ReportContext, Reporter};
use crate::error::{Result, RsloadError};
use crate::query::{QueryResult, RowCount};
use crate::summary::Summary;

/// Default file name for per-query records.
pub const DEFAULT_DETAILS_NAME: &str = "query_details.csv";

/// Default file name for per-set summary records.
pub const DEFAULT_SUMMARY_NAME: &str = "qs_summary.csv";

#[derive(Debug, Serialize)]
struct DetailRecord<'a> {
    test_name: &'a str,
    run_id: &'a str,
    test_start: &'a str,
    query_set: &'a str,
    iteration: u32,
    query_name: &'a str,
    query_num: usize,
    status: &'static str,
    round_trip_ms: Option<u64>,
    server_ms: Option<u64>,
    queued_ms: Option<u64>,
    query_ms: Option<u64>,
    network_ms: Option<u64>,
    row_count: Option<u64>,
    vi_size: Option<&'a str>,
    agg_par: Option<u64>,
    cqel: Option<u64>,
    cql: Option<u64>,
    error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SummaryRecord<'a> {
    test_name: &'a str,
    run_id: &'a str,
    test_start: &'a str,
    query_set: &'a str,
    iteration: u32,
    clean: bool,
    total_ms: u64,
    query_ms: u64,
    queued_ms: u64,
    network_ms: u64,
    vi_size: Option<&'a str>,
    agg_par: Option<u64>,
    cqel: Option<u64>,
    cql: Option<u64>,
}

/// Appends results and summaries to CSV files in an output directory.
#[derive(Debug, Clone)]
pub struct CsvReporter {
    output_dir: PathBuf,
    details_name: String,
    summary_name: String,
}

impl CsvReporter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        details_name: impl Into<String>,
        summary_name: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            details_name: details_name.into(),
            summary_name: summary_name.into(),
        }
    }

    pub fn details_path(&self) -> PathBuf {
        self.output_dir.join(&self.details_name)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_name)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            RsloadError::output(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })
    }

    fn write_details(
        &self,
        ctx: &ReportContext<'_>,
        set_label: &str,
        results: &[QueryResult],
    ) -> Result<()> {
        let run_id = ctx.stats.run_id.to_string();
        let test_start = ctx.stats.started_display();
        let capacity = &ctx.target.capacity;

        let mut writer = open_appender(&self.details_path())?;
        for result in results {
            let timings = result.outcome.timings();
            let record = DetailRecord {
                test_name: ctx.test_name,
                run_id: &run_id,
                test_start: &test_start,
                query_set: set_label,
                iteration: ctx.iteration,
                query_name: &result.name,
                query_num: result.query_num,
                status: result.kind().as_str(),
                round_trip_ms: timings.map(|t| t.round_trip_ms),
                server_ms: timings.map(|t| t.server_ms),
                queued_ms: timings.map(|t| t.queued_ms),
                query_ms: timings.map(|t| t.query_ms),
                network_ms: timings.map(|t| t.network_ms),
                row_count: timings.and_then(|t| match t.row_count {
                    RowCount::Rows(n) => Some(n),
                    RowCount::Dropped => None,
                }),
                vi_size: capacity.vi_size.as_deref(),
                agg_par: capacity.aggregator_parallelism,
                cqel: capacity.concurrent_query_execution_limit,
                cql: capacity.concurrent_queries_limit,
                error: result.outcome.message(),
            };
            writer.serialize(record)?;
        }
        writer
            .flush()
            .map_err(|e| RsloadError::output(format!("Failed to flush details file: {e}")))
    }

    fn write_summary(
        &self,
        ctx: &ReportContext<'_>,
        set_label: &str,
        summary: &Summary,
    ) -> Result<()> {
        let run_id = ctx.stats.run_id.to_string();
        let test_start = ctx.stats.started_display();
        let capacity = &ctx.target.capacity;

        let mut writer = open_appender(&self.summary_path())?;
        writer.serialize(SummaryRecord {
            test_name: ctx.test_name,
            run_id: &run_id,
            test_start: &test_start,
            query_set: set_label,
            iteration: ctx.iteration,
            clean: summary.clean,
            total_ms: summary.total_ms,
            query_ms: summary.query_ms,
            queued_ms: summary.queued_ms,
            network_ms: summary.network_ms,
            vi_size: capacity.vi_size.as_deref(),
            agg_par: capacity.aggregator_parallelism,
            cqel: capacity.concurrent_query_execution_limit,
            cql: capacity.concurrent_queries_limit,
        })?;
        writer
            .flush()
            .map_err(|e| RsloadError::output(format!("Failed to flush summary file: {e}")))
    }
}

impl Reporter for CsvReporter {
    fn report(
        &mut self,
        ctx: &ReportContext<'_>,
        results: &[QueryResult],
        summary: &Summary,
    ) -> Result<()> {
        self.ensure_output_dir()?;
        let set_label = query_set_label(summary);
        self.write_details(ctx, &set_label, results)?;
        self.write_summary(ctx, &set_label, summary)?;
        debug!(
            details = %self.details_path().display(),
            summary = %self.summary_path().display(),
            rows = results.len(),
            "history appended"
        );
        Ok(())
    }
}

/// Opens a CSV file for appending, writing the header only if the file is new or empty.
fn open_appender(path: &Path) -> Result<csv::Writer<fs::File>> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RsloadError::output(format!("Failed to open {}: {e}", path.display())))?;

    Ok(csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file))
}
