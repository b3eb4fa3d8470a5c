//! Per-row structural checkers, in canonical chain order: column count,
//! charset, row population.

use genosub_model::{ErrorKind, ValidationError};

use super::{CheckVerdict, RowCheckContext, RowChecker};

/// The default row chain in its fixed canonical order.
pub fn default_row_chain() -> Vec<Box<dyn RowChecker>> {
    vec![
        Box::new(ColumnCountChecker),
        Box::new(CharsetChecker),
        Box::new(RowCountChecker),
    ]
}

/// Every row must carry exactly as many columns as the header declares.
/// A mismatch stops row checking for the whole file: later rows would only
/// cascade spurious errors off a misaligned record.
pub struct ColumnCountChecker;

impl RowChecker for ColumnCountChecker {
    fn name(&self) -> &'static str {
        "column-count"
    }

    fn check_row(&self, ctx: &mut RowCheckContext<'_>) -> CheckVerdict {
        let found = ctx.row.fields.len();
        if found == ctx.header_width {
            return CheckVerdict::Continue;
        }
        ctx.emit(
            ValidationError::at_line(ErrorKind::ColumnCountMismatch, Vec::new(), ctx.row.line_number)
                .with_value(format!("expected {} columns, found {found}", ctx.header_width)),
        );
        CheckVerdict::Stop
    }
}

/// Cells must be valid UTF-8. Emitted per offending row; the chain
/// continues so every bad row is reported.
pub struct CharsetChecker;

impl RowChecker for CharsetChecker {
    fn name(&self) -> &'static str {
        "charset"
    }

    fn check_row(&self, ctx: &mut RowCheckContext<'_>) -> CheckVerdict {
        if ctx.row.invalid_utf8 {
            ctx.emit(ValidationError::at_line(
                ErrorKind::InvalidCharset,
                Vec::new(),
                ctx.row.line_number,
            ));
        }
        CheckVerdict::Continue
    }
}

/// Row-population sanity: a headered file with zero data rows is not a
/// submission.
pub struct RowCountChecker;

impl RowChecker for RowCountChecker {
    fn name(&self) -> &'static str {
        "row-count"
    }

    fn check_row(&self, _ctx: &mut RowCheckContext<'_>) -> CheckVerdict {
        CheckVerdict::Continue
    }

    fn finish(&self, rows_seen: u64, errors: &mut Vec<ValidationError>) {
        if rows_seen == 0 {
            errors.push(ValidationError::file_level(ErrorKind::EmptyFile));
        }
    }
}
