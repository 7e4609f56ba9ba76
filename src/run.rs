//! Run orchestration.
//!
//! A run is one or more cycles. Each cycle dispatches every configured query
//! set in order, summarizes the results and hands both artifacts to the
//! reporters. The live [`Target`] stays private to the controller; reporters
//! only ever see the [`PublishedTarget`] derived once the first dispatch of
//! the run has completed.

use chrono::{DateTime, Local};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::error::{Result, RsloadError};
use crate::query::QuerySet;
use crate::report::{ReportContext, Reporter};
use crate::summary::{summarize, Summary};
use crate::target::{PublishedTarget, Target};

const START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identity of a run, attached to every persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub run_id: Uuid,
    pub test_start: DateTime<Local>,
}

impl RunStats {
    /// Starts a new run now.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_start: Local::now(),
        }
    }

    /// Start time as shown in tables and CSV records.
    pub fn started_display(&self) -> String {
        self.test_start.format(START_FORMAT).to_string()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// How many cycles a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Single,
    Iterations(NonZeroU32),
}

impl RunMode {
    /// Maps a configured iteration count onto a mode.
    ///
    /// Counts below one are rejected: there is no continuous mode.
    pub fn from_iterations(iterations: i64) -> Result<Self> {
        match iterations {
            i64::MIN..=0 => Err(RsloadError::config(format!(
                "iterations must be at least 1, got {iterations}"
            ))),
            1 => Ok(Self::Single),
            n => u32::try_from(n)
                .ok()
                .and_then(NonZeroU32::new)
                .map(Self::Iterations)
                .ok_or_else(|| RsloadError::config(format!("iterations out of range: {n}"))),
        }
    }

    pub fn cycles(&self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Iterations(n) => n.get(),
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunVerdict {
    pub cycles: u32,
    /// Every summary, in dispatch order.
    pub summaries: Vec<Summary>,
    /// Number of summaries with warnings.
    pub unclean: usize,
}

impl RunVerdict {
    pub fn is_clean(&self) -> bool {
        self.unclean == 0
    }
}

/// Drives dispatch, summary and reporting for a whole run.
pub struct RunController {
    target: Arc<Target>,
    query_sets: Vec<QuerySet>,
    dispatcher: Dispatcher,
    reporters: Vec<Box<dyn Reporter>>,
    test_name: String,
    mode: RunMode,
    stats: RunStats,
}

impl RunController {
    pub fn new(
        target: Target,
        query_sets: Vec<QuerySet>,
        dispatcher: Dispatcher,
        test_name: impl Into<String>,
    ) -> Self {
        Self {
            target: Arc::new(target),
            query_sets,
            dispatcher,
            reporters: Vec::new(),
            test_name: test_name.into(),
            mode: RunMode::Single,
            stats: RunStats::new(),
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Runs every cycle. Classified query failures never stop the run;
    /// transport faults and reporter failures do.
    pub async fn run(mut self) -> Result<RunVerdict> {
        let cycles = self.mode.cycles();
        let mut verdict = RunVerdict::default();
        let mut published: Option<PublishedTarget> = None;

        info!(
            test = %self.test_name,
            run_id = %self.stats.run_id,
            cycles,
            sets = self.query_sets.len(),
            mode = %self.target.mode,
            "starting run"
        );

        for iteration in 1..=cycles {
            self.run_cycle(iteration, &mut published, &mut verdict).await?;
            verdict.cycles = iteration;
        }

        info!(
            run_id = %self.stats.run_id,
            cycles = verdict.cycles,
            unclean = verdict.unclean,
            "run finished"
        );
        Ok(verdict)
    }

    async fn run_cycle(
        &mut self,
        iteration: u32,
        published: &mut Option<PublishedTarget>,
        verdict: &mut RunVerdict,
    ) -> Result<()> {
        for set in &self.query_sets {
            let results = self.dispatcher.dispatch(&self.target, set).await?;

            let view = published.get_or_insert_with(|| {
                debug!("publishing masked target");
                self.target.publish()
            });

            let summary = summarize(&results).for_query_set(set);
            info!(
                iteration,
                set = %set.label(),
                queries = results.len(),
                total_ms = summary.total_ms,
                warnings = summary.warnings.len(),
                clean = summary.clean,
                "query set complete"
            );

            let ctx = ReportContext {
                test_name: &self.test_name,
                stats: &self.stats,
                iteration,
                target: view,
            };
            for reporter in self.reporters.iter_mut() {
                reporter.report(&ctx, &results, &summary)?;
            }

            if !summary.clean {
                verdict.unclean += 1;
            }
            verdict.summaries.push(summary);
        }
        Ok(())
    }
}
