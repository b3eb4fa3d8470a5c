//! Internal (single-file) flow execution: value-type coercion, key
//! uniqueness, and per-restriction validators over a streaming row source.
//!
//! Rows are tagged with the errors found on them as the plan's internal
//! steps run; the trailing error-collection step rolls every tagged row
//! into the outcome. Steps run value-types first (plan order), so
//! restriction validators always see a row whose cells have been through
//! coercion.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use genosub_ingest::{Row, TsvReader};
use genosub_model::{
    ErrorKind, FileSchema, Restriction, ValidationError, ValueType, is_missing_value,
};

use crate::context::CancelToken;
use crate::error::{Result, ValidateError};
use crate::key::{KeyRow, check_uniqueness};
use crate::plan::{FilePlan, InternalStep};

/// How many rows between cancellation checks.
pub(crate) const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Result of the internal flow over one physical file.
#[derive(Debug, Default)]
pub struct InternalOutcome {
    pub errors: Vec<ValidationError>,
    pub rows_checked: u64,
}

/// Column index of every schema field in this file's header. Header shape
/// was already checked by the file chain, but lookups stay defensive.
fn column_indices<'a>(schema: &'a FileSchema, header: &Row) -> BTreeMap<&'a str, usize> {
    let mut indices = BTreeMap::new();
    for field in &schema.fields {
        if let Some(idx) = header
            .fields
            .iter()
            .position(|cell| cell.trim() == field.name)
        {
            indices.insert(field.name.as_str(), idx);
        }
    }
    indices
}

fn parses_as(value_type: ValueType, raw: &str) -> bool {
    match value_type {
        ValueType::Text => true,
        ValueType::Integer => raw.parse::<i64>().is_ok(),
        ValueType::Decimal => raw.parse::<f64>().is_ok(),
        ValueType::Datetime => {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").is_ok()
        }
    }
}

struct CompiledRestrictions {
    regexes: BTreeMap<String, Regex>,
}

impl CompiledRestrictions {
    fn build(plan: &FilePlan) -> Result<Self> {
        let mut regexes = BTreeMap::new();
        for step in &plan.internal {
            if let InternalStep::Restriction {
                field,
                restriction: Restriction::Regex { pattern },
            } = step
            {
                // The plan builder validated the pattern; a failure here is
                // an executor defect, not a data error.
                let regex = Regex::new(pattern)
                    .map_err(|error| ValidateError::Executor(error.to_string()))?;
                regexes.insert(field.clone(), regex);
            }
        }
        Ok(Self { regexes })
    }
}

/// Run the plan's internal steps over every row of the file.
pub fn run_internal(
    dictionary: &genosub_model::Dictionary,
    schema: &FileSchema,
    plan: &FilePlan,
    reader: &mut TsvReader,
    cancel: &CancelToken,
) -> Result<InternalOutcome> {
    let header = reader
        .read_header()?
        .ok_or_else(|| ValidateError::Executor("internal flow on empty file".to_string()))?
        .clone();
    let columns = column_indices(schema, &header);
    let compiled = CompiledRestrictions::build(plan)?;

    let mut outcome = InternalOutcome::default();
    let mut key_rows: Vec<KeyRow> = Vec::new();
    // Rows tagged invalid, flushed by the error-collection step.
    let mut tagged: Vec<ValidationError> = Vec::new();

    while let Some(row) = reader.next_row()? {
        outcome.rows_checked += 1;
        if outcome.rows_checked % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }

        let cell = |name: &str| -> &str {
            columns
                .get(name)
                .map(|idx| row.field(*idx).trim())
                .unwrap_or("")
        };

        for step in &plan.internal {
            match step {
                InternalStep::ValueTypes => {
                    for field in &schema.fields {
                        let raw = cell(&field.name);
                        if is_missing_value(raw, false) {
                            continue;
                        }
                        if !parses_as(field.value_type, raw) {
                            tagged.push(
                                ValidationError::at_line(
                                    ErrorKind::ValueTypeError,
                                    vec![field.name.clone()],
                                    row.line_number,
                                )
                                .with_value(raw),
                            );
                        }
                    }
                }
                InternalStep::UniqueKey { fields } => {
                    // Uniqueness is a whole-file property; tuples are
                    // collected here and checked after the streaming pass.
                    let tuple: Vec<String> =
                        fields.iter().map(|field| cell(field).to_string()).collect();
                    key_rows.push(KeyRow::new(tuple, row.line_number));
                }
                InternalStep::Restriction { field, restriction } => {
                    let raw = cell(field);
                    match restriction {
                        Restriction::Required {
                            accept_missing_code,
                        } => {
                            if is_missing_value(raw, *accept_missing_code) {
                                tagged.push(ValidationError::at_line(
                                    ErrorKind::MissingRequiredField,
                                    vec![field.clone()],
                                    row.line_number,
                                ));
                            }
                        }
                        Restriction::Regex { .. } => {
                            if is_missing_value(raw, false) {
                                continue;
                            }
                            let Some(regex) = compiled.regexes.get(field) else {
                                continue;
                            };
                            let full_match = regex
                                .find(raw)
                                .is_some_and(|m| m.start() == 0 && m.end() == raw.len());
                            if !full_match {
                                tagged.push(
                                    ValidationError::at_line(
                                        ErrorKind::RegexError,
                                        vec![field.clone()],
                                        row.line_number,
                                    )
                                    .with_value(raw),
                                );
                            }
                        }
                        Restriction::Codelist { name } => {
                            if is_missing_value(raw, false) {
                                continue;
                            }
                            let member = dictionary
                                .codelist(name)
                                .is_some_and(|list| list.contains(raw));
                            if !member {
                                tagged.push(
                                    ValidationError::at_line(
                                        ErrorKind::CodelistError,
                                        vec![field.clone()],
                                        row.line_number,
                                    )
                                    .with_value(raw),
                                );
                            }
                        }
                        Restriction::In { values } => {
                            if is_missing_value(raw, false) {
                                continue;
                            }
                            if !values.iter().any(|value| value == raw) {
                                tagged.push(
                                    ValidationError::at_line(
                                        ErrorKind::DiscreteValuesError,
                                        vec![field.clone()],
                                        row.line_number,
                                    )
                                    .with_value(raw),
                                );
                            }
                        }
                    }
                }
                InternalStep::CollectErrors => {
                    outcome.errors.append(&mut tagged);
                }
            }
        }
    }
    for step in &plan.internal {
        if let InternalStep::UniqueKey { fields } = step {
            tagged.extend(check_uniqueness(fields, &key_rows));
        }
    }
    // Collect whatever the last rows tagged.
    outcome.errors.append(&mut tagged);
    Ok(outcome)
}
