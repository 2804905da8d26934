use std::num::NonZeroUsize;
use std::panic;
use std::thread;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::SagaError;
use crate::report::{SagaOutcome, SagaReport};
use crate::retry::RetryPolicy;
use crate::saga::Saga;
use crate::state::SagaState;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("a saga with id '{0}' is already registered")]
    DuplicateId(String),

    #[error("no saga with id '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

/// Counters over the sagas an orchestrator has created and run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub total: usize,
    pub completed: usize,
    pub compensated: usize,
    pub residual: usize,
    pub aborted: usize,
}

impl OrchestratorStats {
    fn record(&mut self, outcome: SagaOutcome) {
        match outcome {
            SagaOutcome::Succeeded => self.completed += 1,
            SagaOutcome::Compensated => self.compensated += 1,
            SagaOutcome::CompensatedWithResidualFailures => self.residual += 1,
            SagaOutcome::Aborted => self.aborted += 1,
            SagaOutcome::InProgress => {}
        }
    }

    /// Sagas that have reached a terminal state.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed + self.compensated + self.residual + self.aborted
    }
}

/// Registry of sagas keyed by id, with run statistics.
///
/// Sagas are kept in creation order. Each saga still executes its own steps
/// sequentially; [`execute_pending_parallel`](Self::execute_pending_parallel) only runs
/// distinct sagas side by side.
#[derive(Debug, Default)]
pub struct SagaOrchestrator {
    sagas: IndexMap<String, Saga>,
    retry_policy: RetryPolicy,
    stats: OrchestratorStats,
}

impl SagaOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry policy applied to every saga created afterwards.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Register a new, empty saga and return it for step registration.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::DuplicateId`] if the id is taken.
    pub fn create(&mut self, id: impl Into<String>) -> Result<&mut Saga, OrchestratorError> {
        match self.sagas.entry(id.into()) {
            Entry::Occupied(entry) => Err(OrchestratorError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(saga_id = %entry.key(), "registered saga");
                let saga = Saga::new(entry.key().clone()).with_retry_policy(self.retry_policy);
                self.stats.total += 1;
                Ok(entry.insert(saga))
            }
        }
    }

    /// Execute one registered saga.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] for an unknown id and
    /// [`OrchestratorError::Saga`] if the saga was already executed.
    pub fn execute(&mut self, id: &str) -> Result<SagaReport, OrchestratorError> {
        let saga = self
            .sagas
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        let report = saga.execute()?;
        self.stats.record(report.outcome());
        info!(saga_id = id, outcome = %report.outcome(), "saga finished");
        Ok(report)
    }

    /// Execute every pending saga on worker threads and wait for all of them.
    ///
    /// At most [`thread::available_parallelism`] sagas run at once. A saga whose thread
    /// cannot be spawned runs on the calling thread instead. Reports are returned in
    /// creation order.
    pub fn execute_pending_parallel(&mut self) -> Vec<SagaReport> {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let mut pending: Vec<&mut Saga> = self
            .sagas
            .values_mut()
            .filter(|saga| saga.state() == SagaState::Pending)
            .collect();
        debug!(pending = pending.len(), workers, "executing pending sagas");

        let mut results = Vec::with_capacity(pending.len());
        for batch in pending.chunks_mut(workers) {
            results.extend(execute_batch(batch));
        }

        let mut reports = Vec::with_capacity(results.len());
        // Only pending sagas were started, so none of them can report misuse.
        for report in results.into_iter().flatten() {
            self.stats.record(report.outcome());
            info!(saga_id = %report.saga_id, outcome = %report.outcome(), "saga finished");
            reports.push(report);
        }
        reports
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Saga> {
        self.sagas.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sagas.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }
}

/// Run one batch of sagas side by side, falling back to the caller's thread for any
/// saga whose worker could not be spawned.
fn execute_batch(batch: &mut [&mut Saga]) -> Vec<Result<SagaReport, SagaError>> {
    let mut results: Vec<Option<Result<SagaReport, SagaError>>> = thread::scope(|scope| {
        let spawned: Vec<_> = batch
            .iter_mut()
            .map(|saga| {
                let saga: &mut Saga = saga;
                thread::Builder::new().spawn_scoped(scope, move || saga.execute())
            })
            .collect();
        spawned
            .into_iter()
            .map(|spawned| match spawned {
                Ok(handle) => Some(
                    handle
                        .join()
                        .unwrap_or_else(|payload| panic::resume_unwind(payload)),
                ),
                Err(error) => {
                    warn!(%error, "could not spawn saga thread, running on the caller");
                    None
                }
            })
            .collect()
    });

    results
        .iter_mut()
        .zip(batch.iter_mut())
        .map(|(result, saga)| result.take().unwrap_or_else(|| saga.execute()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::StepFailure;

    fn register(
        orchestrator: &mut SagaOrchestrator,
        id: &str,
        fail: bool,
        fail_compensation: bool,
    ) -> anyhow::Result<()> {
        let saga = orchestrator.create(id)?;
        saga.add_step(
            "reserve",
            || Ok(()),
            move || {
                if fail_compensation {
                    Err(StepFailure::rejected("release refused"))
                } else {
                    Ok(())
                }
            },
        )?;
        saga.add_step(
            "pay",
            move || {
                if fail {
                    Err(StepFailure::rejected("declined"))
                } else {
                    Ok(())
                }
            },
            || Ok(()),
        )?;
        Ok(())
    }

    #[test]
    fn create_rejects_duplicate_ids() -> anyhow::Result<()> {
        let mut orchestrator = SagaOrchestrator::new();
        orchestrator.create("order-1")?;

        let err = orchestrator.create("order-1").expect_err("duplicate");

        assert_eq!(err, OrchestratorError::DuplicateId("order-1".to_string()));
        assert_eq!(orchestrator.stats().total, 1);
        Ok(())
    }

    #[test]
    fn execute_unknown_id_is_not_found() {
        let mut orchestrator = SagaOrchestrator::new();

        let err = orchestrator.execute("missing").expect_err("unknown id");

        assert_eq!(err, OrchestratorError::NotFound("missing".to_string()));
    }

    #[test]
    fn stats_track_outcomes() -> anyhow::Result<()> {
        let mut orchestrator = SagaOrchestrator::new();
        register(&mut orchestrator, "ok", false, false)?;
        register(&mut orchestrator, "rolled_back", true, false)?;
        register(&mut orchestrator, "residual", true, true)?;

        for id in ["ok", "rolled_back", "residual"] {
            orchestrator.execute(id)?;
        }

        let stats = orchestrator.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.compensated, 1);
        assert_eq!(stats.residual, 1);
        assert_eq!(stats.finished(), 3);
        Ok(())
    }

    #[test]
    fn executing_twice_propagates_misuse() -> anyhow::Result<()> {
        let mut orchestrator = SagaOrchestrator::new();
        register(&mut orchestrator, "order-1", false, false)?;
        orchestrator.execute("order-1")?;

        let err = orchestrator.execute("order-1").expect_err("single-shot");

        assert!(matches!(
            err,
            OrchestratorError::Saga(SagaError::AlreadyExecuted { .. })
        ));
        assert_eq!(orchestrator.stats().completed, 1);
        Ok(())
    }

    #[test]
    fn parallel_execution_runs_only_pending_sagas_in_creation_order() -> anyhow::Result<()> {
        let mut orchestrator = SagaOrchestrator::new();
        register(&mut orchestrator, "a", false, false)?;
        register(&mut orchestrator, "b", true, false)?;
        register(&mut orchestrator, "c", false, false)?;
        orchestrator.execute("a")?;

        let reports = orchestrator.execute_pending_parallel();

        let ids: Vec<_> = reports.iter().map(|r| r.saga_id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(orchestrator.stats().completed, 2);
        assert_eq!(orchestrator.stats().compensated, 1);
        Ok(())
    }

    #[test]
    fn parallel_execution_handles_more_sagas_than_workers() -> anyhow::Result<()> {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let count = workers * 3 + 1;
        let mut orchestrator = SagaOrchestrator::new();
        let ids: Vec<String> = (0..count).map(|i| format!("order-{i}")).collect();
        for (i, id) in ids.iter().enumerate() {
            register(&mut orchestrator, id, i % 4 == 0, false)?;
        }

        let reports = orchestrator.execute_pending_parallel();

        let reported: Vec<_> = reports.iter().map(|r| r.saga_id.clone()).collect();
        assert_eq!(reported, ids);
        let failing = (0..count).filter(|i| i % 4 == 0).count();
        let stats = orchestrator.stats();
        assert_eq!(stats.total, count);
        assert_eq!(stats.compensated, failing);
        assert_eq!(stats.completed, count - failing);
        assert!(
            ids.iter()
                .all(|id| orchestrator.get(id).is_some_and(|saga| saga.state().is_terminal()))
        );
        Ok(())
    }

    #[test]
    fn retry_policy_is_applied_to_created_sagas() -> anyhow::Result<()> {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let mut orchestrator = SagaOrchestrator::new().with_retry_policy(policy);

        let saga = orchestrator.create("order-1")?;

        assert_eq!(saga.retry_policy(), policy);
        Ok(())
    }

    #[test]
    fn ids_preserve_creation_order() -> anyhow::Result<()> {
        let mut orchestrator = SagaOrchestrator::new();
        for id in ["z", "a", "m"] {
            orchestrator.create(id)?;
        }

        assert_eq!(orchestrator.ids().collect::<Vec<_>>(), ["z", "a", "m"]);
        assert!(orchestrator.get("a").is_some());
        Ok(())
    }
}
