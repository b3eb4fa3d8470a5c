//! Work-unit execution and admission control.
//!
//! A validation run is decomposed into independent work units (one per
//! internal flow, plus the external relation and summary units). The
//! executor runs them either sequentially or on the rayon pool; results
//! come back in submission order either way, so the assembled report does
//! not depend on the execution strategy.
//!
//! [`ValidationSlots`] is the admission gate: a small global ceiling on
//! concurrent runs, plus exclusivity per `(release, project)` so two runs
//! never validate the same submission at once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, info};

use genosub_model::Report;

use crate::error::{Result, ValidateError};
use crate::plan::FlowType;
use crate::summary::FieldSummary;

/// Output of one work unit: a report fragment plus any summaries the unit
/// computed. Fragments are absorbed into the run's report sink afterwards.
pub struct UnitOutput {
    pub report: Report,
    /// Summaries computed by this unit, keyed by the file they describe.
    pub summaries: Option<(String, Vec<FieldSummary>)>,
}

impl UnitOutput {
    pub fn report_only(report: Report) -> Self {
        Self {
            report,
            summaries: None,
        }
    }

    pub fn summaries_for(file_name: impl Into<String>, summaries: Vec<FieldSummary>) -> Self {
        Self {
            report: Report::new(),
            summaries: Some((file_name.into(), summaries)),
        }
    }
}

type UnitFn = Box<dyn FnOnce() -> Result<UnitOutput> + Send>;

/// One schedulable piece of a validation run.
pub struct WorkUnit {
    pub name: String,
    pub flow: FlowType,
    run: UnitFn,
}

impl WorkUnit {
    pub fn new(
        name: impl Into<String>,
        flow: FlowType,
        run: impl FnOnce() -> Result<UnitOutput> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            flow,
            run: Box::new(run),
        }
    }
}

/// A unit's result, tagged with its name for attribution.
pub struct UnitResult {
    pub name: String,
    pub flow: FlowType,
    pub output: Result<UnitOutput>,
}

/// Runs a batch of work units to completion.
pub trait FlowExecutor {
    fn execute(&self, units: Vec<WorkUnit>) -> Vec<UnitResult>;
}

/// In-process executor. With `parallel` the units run on the rayon pool;
/// results are returned in submission order in both cases.
pub struct LocalExecutor {
    parallel: bool,
}

impl LocalExecutor {
    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    pub fn parallel() -> Self {
        Self { parallel: true }
    }
}

impl FlowExecutor for LocalExecutor {
    fn execute(&self, units: Vec<WorkUnit>) -> Vec<UnitResult> {
        debug!(units = units.len(), parallel = self.parallel, "executing work units");
        if self.parallel {
            units
                .into_par_iter()
                .map(|unit| UnitResult {
                    name: unit.name,
                    flow: unit.flow,
                    output: (unit.run)(),
                })
                .collect()
        } else {
            units
                .into_iter()
                .map(|unit| UnitResult {
                    name: unit.name,
                    flow: unit.flow,
                    output: (unit.run)(),
                })
                .collect()
        }
    }
}

/// Default ceiling on concurrent validation runs.
pub const DEFAULT_MAX_RUNS: usize = 1;

#[derive(Default)]
struct SlotState {
    running: usize,
    held: HashSet<(String, String)>,
}

/// Admission control for validation runs.
///
/// `acquire` fails when the global ceiling is reached or when the same
/// `(release, project)` pair already holds a slot. The returned guard
/// releases the slot on drop.
pub struct ValidationSlots {
    max_runs: usize,
    state: Arc<Mutex<SlotState>>,
}

impl ValidationSlots {
    pub fn new(max_runs: usize) -> Self {
        Self {
            max_runs: max_runs.max(1),
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    pub fn acquire(&self, release_name: &str, project_key: &str) -> Result<SlotGuard> {
        let key = (release_name.to_string(), project_key.to_string());
        let mut state = self
            .state
            .lock()
            .map_err(|_| ValidateError::Executor("slot state poisoned".into()))?;
        if state.held.contains(&key) {
            return Err(ValidateError::Executor(format!(
                "validation already running for {release_name}/{project_key}"
            )));
        }
        if state.running >= self.max_runs {
            return Err(ValidateError::Executor(format!(
                "no free validation slot ({} of {} in use)",
                state.running, self.max_runs
            )));
        }
        state.running += 1;
        state.held.insert(key.clone());
        info!(release = release_name, project = project_key, "validation slot acquired");
        Ok(SlotGuard {
            state: Arc::clone(&self.state),
            key,
        })
    }
}

impl Default for ValidationSlots {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RUNS)
    }
}

/// Releases its slot when dropped.
pub struct SlotGuard {
    state: Arc<Mutex<SlotState>>,
    key: (String, String),
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.running = state.running.saturating_sub(1);
            state.held.remove(&self.key);
        }
    }
}
