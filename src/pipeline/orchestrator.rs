use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::observability::metrics;
use crate::pipeline::reconcile::{FlowStats, ReconciliationReporter};
use crate::pipeline::staging::{LoadOutcome, LoadReport, StagingLoader};
use crate::pipeline::transform::TransformEngine;
use crate::pipeline::warehouse::Warehouse;

/// Where a pipeline run is. Only forward edges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Loading,
    Transforming,
    Reporting,
    Done,
    Skipped,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Skipped | RunState::Failed)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Skipped)
                | (Loading, Transforming)
                | (Transforming, Reporting)
                | (Reporting, Done)
                | (Loading, Failed)
                | (Transforming, Failed)
                | (Reporting, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Loading => "loading",
            RunState::Transforming => "transforming",
            RunState::Reporting => "reporting",
            RunState::Done => "done",
            RunState::Skipped => "skipped",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run that did not fail ended
#[derive(Debug, Clone, Serialize)]
pub enum RunOutcome {
    Done { load: LoadReport, stats: FlowStats },
    Skipped { path: PathBuf },
}

/// A run that ended in [`RunState::Failed`], with the stage it failed in.
#[derive(Debug, Error)]
#[error("pipeline run {run_id} failed while {stage}: {source}")]
pub struct RunFailure {
    pub run_id: Uuid,
    pub stage: RunState,
    #[source]
    pub source: PipelineError,
}

/// Sequences load → transform → reconcile for one input artifact.
pub struct PipelineOrchestrator {
    warehouse: Warehouse,
    loader: StagingLoader,
    engine: Box<dyn TransformEngine>,
    state: RunState,
    transitions: Vec<RunState>,
}

impl PipelineOrchestrator {
    pub fn new(warehouse: Warehouse, loader: StagingLoader, engine: Box<dyn TransformEngine>) -> Self {
        Self {
            warehouse,
            loader,
            engine,
            state: RunState::Idle,
            transitions: vec![RunState::Idle],
        }
    }

    /// State reached by the most recent run
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state the most recent run passed through, starting at `Idle`
    pub fn transitions(&self) -> &[RunState] {
        &self.transitions
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        info!("Run state {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, run_id: Uuid, source: PipelineError) -> RunFailure {
        let stage = self.state;
        error!(
            stage = %stage,
            kind = source.kind().as_str(),
            "Pipeline run failed: {}",
            source
        );
        metrics::pipeline::failed(stage.as_str(), source.kind().as_str());
        self.advance(RunState::Failed);
        RunFailure {
            run_id,
            stage,
            source,
        }
    }

    /// Execute one run from `Idle`.
    ///
    /// A later stage never starts unless the previous one succeeded. There is
    /// no retry; the next scheduled invocation starts over.
    pub async fn run(&mut self) -> Result<RunOutcome, RunFailure> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid) -> Result<RunOutcome, RunFailure> {
        self.state = RunState::Idle;
        self.transitions = vec![RunState::Idle];
        let started = Instant::now();
        metrics::pipeline::started();

        self.advance(RunState::Loading);
        let load = match self.loader.load(&mut self.warehouse) {
            Ok(LoadOutcome::Loaded(report)) => report,
            Ok(LoadOutcome::Skipped { path }) => {
                warn!("No input at {}; skipping downstream stages", path.display());
                self.advance(RunState::Skipped);
                metrics::pipeline::finished(RunState::Skipped.as_str(), started.elapsed().as_secs_f64());
                return Ok(RunOutcome::Skipped { path });
            }
            Err(e) => return Err(self.fail(run_id, e)),
        };
        info!("Loaded batch {} ({} rows)", load.batch_id, load.rows);

        self.advance(RunState::Transforming);
        info!("Invoking transform engine '{}'", self.engine.name());
        if let Err(e) = self.engine.run().await {
            return Err(self.fail(run_id, e));
        }

        self.advance(RunState::Reporting);
        let stats = match ReconciliationReporter::report(&self.warehouse) {
            Ok(stats) => stats,
            Err(e) => return Err(self.fail(run_id, e)),
        };

        self.advance(RunState::Done);
        metrics::pipeline::finished(RunState::Done.as_str(), started.elapsed().as_secs_f64());
        Ok(RunOutcome::Done { load, stats })
    }
}
