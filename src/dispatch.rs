//! Fan-out of a query set to the target.
//!
//! One [`Dispatcher`] serves both strategies. Output is always index-stable:
//! `results[i]` belongs to `set.queries[i]` whatever order the queries
//! finished in.

use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Result, RsloadError};
use crate::query::{QueryResult, QueryRunner, QuerySet};
use crate::target::{ExecutionMode, Target};

/// How a query set is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// One query at a time.
    Serial,
    /// Every query in its own task; at most `max_concurrency` in flight
    /// (`None`: as many as there are queries).
    Parallel { max_concurrency: Option<NonZeroUsize> },
}

impl DispatchStrategy {
    /// The strategy configured on a target.
    pub fn for_target(target: &Target) -> Self {
        match target.mode {
            ExecutionMode::Serial => Self::Serial,
            ExecutionMode::Parallel => Self::Parallel {
                max_concurrency: target.max_concurrency,
            },
        }
    }
}

/// Executes whole query sets.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runner: QueryRunner,
}

impl Dispatcher {
    pub fn new(runner: QueryRunner) -> Self {
        Self { runner }
    }

    /// Runs every query of `set` using the target's strategy.
    pub async fn dispatch(&self, target: &Arc<Target>, set: &QuerySet) -> Result<Vec<QueryResult>> {
        self.dispatch_with(DispatchStrategy::for_target(target), target, set)
            .await
    }

    /// Runs every query of `set` using an explicit strategy.
    pub async fn dispatch_with(
        &self,
        strategy: DispatchStrategy,
        target: &Arc<Target>,
        set: &QuerySet,
    ) -> Result<Vec<QueryResult>> {
        debug!(set = %set.label(), queries = set.len(), ?strategy, "dispatching query set");
        match strategy {
            DispatchStrategy::Serial => self.dispatch_serial(target, set).await,
            DispatchStrategy::Parallel { max_concurrency } => {
                self.dispatch_parallel(target, set, max_concurrency).await
            }
        }
    }

    async fn dispatch_serial(&self, target: &Target, set: &QuerySet) -> Result<Vec<QueryResult>> {
        let mut results = Vec::with_capacity(set.len());
        for (idx, query) in set.queries.iter().enumerate() {
            results.push(self.runner.run(idx + 1, target, query).await?);
        }
        Ok(results)
    }

    async fn dispatch_parallel(
        &self,
        target: &Arc<Target>,
        set: &QuerySet,
        max_concurrency: Option<NonZeroUsize>,
    ) -> Result<Vec<QueryResult>> {
        let count = set.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let permits = max_concurrency.map_or(count, |limit| limit.get().min(count));
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (idx, query) in set.queries.iter().enumerate() {
            let query_num = idx + 1;
            let runner = self.runner.clone();
            let target = Arc::clone(target);
            let query = query.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => runner.run(query_num, &target, &query).await,
                    Err(e) => Err(RsloadError::internal(format!("Dispatch pool closed: {e}"))),
                };
                (query_num, result)
            });
        }

        let mut slots: Vec<Option<QueryResult>> = (0..count).map(|_| None).collect();
        let mut first_fault: Option<(usize, RsloadError)> = None;
        let mut task_failure: Option<RsloadError> = None;

        while let Some(joined) = tasks.join_next().await {
            let (query_num, result) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    task_failure.get_or_insert_with(|| {
                        RsloadError::internal(format!("Query task failed: {e}"))
                    });
                    continue;
                }
            };
            match result {
                Ok(result) => slots[query_num - 1] = Some(result),
                Err(e) => {
                    if first_fault.as_ref().map_or(true, |(num, _)| query_num < *num) {
                        first_fault = Some((query_num, e));
                    }
                }
            }
        }

        if let Some((_, e)) = first_fault {
            return Err(e);
        }
        if let Some(e) = task_failure {
            return Err(e);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| {
                    RsloadError::internal(format!("Missing result for query {}", idx + 1))
                })
            })
            .collect()
    }
}
