//! Validation engine: structural checker chains, dictionary-driven plan
//! building, internal and relational flows, and the pipeline that ties
//! them into one report per submission run.

pub mod checkers;
pub mod context;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod internal;
pub mod key;
pub mod pipeline;
pub mod plan;
pub mod summary;

pub use context::{CancelToken, ReportSink};
pub use error::{Result, ValidateError};
pub use exclusion::{
    CachedExclusions, DEFAULT_EXCLUSION_TTL, ExclusionDictionary, ExclusionSource,
    FileExclusionSource, NoExclusions,
};
pub use executor::{
    DEFAULT_MAX_RUNS, FlowExecutor, LocalExecutor, SlotGuard, UnitOutput, UnitResult,
    ValidationSlots, WorkUnit,
};
pub use internal::{InternalOutcome, run_internal};
pub use key::{
    ExecutionMode, KeyRow, RelationCheck, RelationErrors, check_relation, check_uniqueness,
};
pub use pipeline::{SubmissionValidator, ValidationRequest, ValidationRun};
pub use plan::{ExternalStep, FilePlan, FlowType, InternalStep, Plan, PlanningError, build_plan};
pub use summary::{FieldSummary, SummaryValue, collect_summaries};
