//! First-pass structural checking as two ordered checker chains.
//!
//! One chain inspects whole files (header, corruption, collision,
//! cross-reference existence), one inspects individual rows (column count,
//! charset, row population). A chain is a short-circuiting fold over an
//! ordered checker list: each checker emits errors into the chain context
//! and answers whether the chain may continue. A `Stop` verdict skips every
//! later checker and, for a file chain, all row-level checking of that file.
//!
//! Checkers report expected data defects only; environment failures (an
//! unreadable file) surface as `ValidateError` from the caller instead.

pub mod file;
pub mod row;

use genosub_ingest::{FileSniff, Row, SubmissionFiles};
use genosub_model::{DataType, Dictionary, FileSchema, ValidationError};
use tracing::debug;

pub use file::{
    CollisionChecker, CorruptionChecker, HeaderChecker, ReferencedFileChecker, default_file_chain,
};
pub use row::{CharsetChecker, ColumnCountChecker, RowCountChecker, default_row_chain};

/// Whether the chain may proceed past the current checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckVerdict {
    Continue,
    /// Fail fast: skip later checkers and all row-level checking for the
    /// file in scope.
    Stop,
}

/// Context handed down a file chain for one physical file.
pub struct FileCheckContext<'a> {
    pub dictionary: &'a Dictionary,
    pub schema: &'a FileSchema,
    pub files: &'a SubmissionFiles,
    pub data_type: DataType,
    pub file_name: &'a str,
    /// Header row (line 1), `None` for an empty file.
    pub header: Option<&'a Row>,
    pub sniff: FileSniff,
    errors: Vec<ValidationError>,
}

impl<'a> FileCheckContext<'a> {
    pub fn new(
        dictionary: &'a Dictionary,
        schema: &'a FileSchema,
        files: &'a SubmissionFiles,
        file_name: &'a str,
        header: Option<&'a Row>,
        sniff: FileSniff,
    ) -> Self {
        Self {
            dictionary,
            schema,
            files,
            data_type: DataType::of_file_schema(&schema.name),
            file_name,
            header,
            sniff,
            errors: Vec::new(),
        }
    }

    pub fn emit(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// Context handed down a row chain for one data row.
pub struct RowCheckContext<'a> {
    pub schema: &'a FileSchema,
    /// Column count declared by the file's own header.
    pub header_width: usize,
    pub row: &'a Row,
    errors: Vec<ValidationError>,
}

impl<'a> RowCheckContext<'a> {
    pub fn new(schema: &'a FileSchema, header_width: usize, row: &'a Row) -> Self {
        Self {
            schema,
            header_width,
            row,
            errors: Vec::new(),
        }
    }

    pub fn emit(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// A whole-file structural check.
pub trait FileChecker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &mut FileCheckContext<'_>) -> CheckVerdict;
}

/// A per-row structural check.
pub trait RowChecker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check_row(&self, ctx: &mut RowCheckContext<'_>) -> CheckVerdict;
    /// Called once after the last row with the number of data rows seen;
    /// whole-file row-population errors are emitted here.
    fn finish(&self, _rows_seen: u64, _errors: &mut Vec<ValidationError>) {}
}

/// Result of running a chain to completion or early stop.
#[derive(Debug)]
pub struct ChainRun {
    /// No checker emitted an error.
    pub valid: bool,
    /// Name of the checker that stopped the chain, if any.
    pub stopped_by: Option<&'static str>,
    /// Per-checker emitted-error counters, in chain order (diagnostics).
    pub error_counts: Vec<(&'static str, u64)>,
}

impl ChainRun {
    pub fn can_continue(&self) -> bool {
        self.stopped_by.is_none()
    }
}

/// Run a file chain as a short-circuiting fold over the checker list.
pub fn run_file_chain(
    checkers: &[Box<dyn FileChecker>],
    ctx: &mut FileCheckContext<'_>,
) -> ChainRun {
    let mut run = ChainRun {
        valid: true,
        stopped_by: None,
        error_counts: Vec::with_capacity(checkers.len()),
    };
    for checker in checkers {
        let before = ctx.errors.len();
        let verdict = checker.check(ctx);
        let emitted = (ctx.errors.len() - before) as u64;
        run.error_counts.push((checker.name(), emitted));
        if emitted > 0 {
            run.valid = false;
            debug!(
                checker = checker.name(),
                file = ctx.file_name,
                errors = emitted,
                "file checker emitted errors"
            );
        }
        if verdict == CheckVerdict::Stop {
            run.stopped_by = Some(checker.name());
            break;
        }
    }
    run
}

/// Run a row chain over one row; `Stop` ends row checking for the file.
pub fn run_row_chain(checkers: &[Box<dyn RowChecker>], ctx: &mut RowCheckContext<'_>) -> ChainRun {
    let mut run = ChainRun {
        valid: true,
        stopped_by: None,
        error_counts: Vec::with_capacity(checkers.len()),
    };
    for checker in checkers {
        let before = ctx.errors.len();
        let verdict = checker.check_row(ctx);
        let emitted = (ctx.errors.len() - before) as u64;
        run.error_counts.push((checker.name(), emitted));
        if emitted > 0 {
            run.valid = false;
        }
        if verdict == CheckVerdict::Stop {
            run.stopped_by = Some(checker.name());
            break;
        }
    }
    run
}
