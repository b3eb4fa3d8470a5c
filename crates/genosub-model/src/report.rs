//! Hierarchical validation report: Report → DataTypeReport → FileTypeReport
//! → FileReport → ValidationError.
//!
//! Every state in the tree is a pure function of its children: a file with
//! at least one error is INVALID, otherwise VALID once checked; every
//! aggregate level is the worst-of its children. Errors are append-only
//! within a run and never mutated after being attached.

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;

/// Kind of a validation error record.
///
/// These are expected data defects (spec'd field names stay stable in JSON);
/// infrastructure failures never become records of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Row/value-level defects found by the internal flow.
    MissingRequiredField,
    ValueTypeError,
    RegexError,
    CodelistError,
    DiscreteValuesError,
    DuplicateKey,
    // Cross-file defects found by the key validator.
    RelationViolation,
    UnusedReferencedKey,
    ReferenceSampleTypeMismatch,
    // Structural defects found by the checker chains.
    InvalidHeader,
    CorruptedFile,
    FileCollision,
    MissingReferencedFile,
    ColumnCountMismatch,
    InvalidCharset,
    EmptyFile,
}

/// One validation error attached to a file report.
///
/// `line_number` is 1-based (the header is line 1). Aggregated errors carry
/// a `count` instead of a line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    #[serde(default)]
    pub field_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Snapshot of the offending value, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationError {
    pub fn at_line(kind: ErrorKind, field_names: Vec<String>, line_number: u64) -> Self {
        Self {
            kind,
            field_names,
            line_number: Some(line_number),
            count: None,
            value: None,
        }
    }

    pub fn counted(kind: ErrorKind, field_names: Vec<String>, count: u64) -> Self {
        Self {
            kind,
            field_names,
            line_number: None,
            count: Some(count),
            value: None,
        }
    }

    pub fn file_level(kind: ErrorKind) -> Self {
        Self {
            kind,
            field_names: Vec::new(),
            line_number: None,
            count: None,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Validation state at every level of the report tree.
///
/// Worst-of ordering: `NotValidated < Valid < Invalid < Error`. A mix of
/// VALID and NOT_VALIDATED children derives VALID; any INVALID child
/// dominates; ERROR (aborted/failed run) dominates everything.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportState {
    #[default]
    NotValidated,
    Valid,
    Invalid,
    Error,
}

impl ReportState {
    /// Worst-of over children. An empty child list stays NOT_VALIDATED;
    /// VALID is never derived from absence.
    pub fn worst_of<I>(states: I) -> Self
    where
        I: IntoIterator<Item = ReportState>,
    {
        states
            .into_iter()
            .max()
            .unwrap_or(ReportState::NotValidated)
    }
}

/// Report for one physical file instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_name: String,
    pub file_state: ReportState,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
}

impl FileReport {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_state: ReportState::NotValidated,
            errors: Vec::new(),
        }
    }

    /// Append an error; the state follows from the error list.
    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.file_state = ReportState::Invalid;
    }

    /// Mark this file as checked: no errors means VALID. An ERROR state set
    /// by an aborted run is preserved.
    pub fn mark_checked(&mut self) {
        if self.file_state == ReportState::Error {
            return;
        }
        self.file_state = if self.errors.is_empty() {
            ReportState::Valid
        } else {
            ReportState::Invalid
        };
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Reports for all physical files of one file type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTypeReport {
    pub file_type: String,
    pub file_type_state: ReportState,
    #[serde(default)]
    pub file_reports: Vec<FileReport>,
}

impl FileTypeReport {
    pub fn new(file_type: impl Into<String>) -> Self {
        Self {
            file_type: file_type.into(),
            file_type_state: ReportState::NotValidated,
            file_reports: Vec::new(),
        }
    }

    pub fn file_report_mut(&mut self, file_name: &str) -> &mut FileReport {
        if let Some(idx) = self
            .file_reports
            .iter()
            .position(|report| report.file_name == file_name)
        {
            return &mut self.file_reports[idx];
        }
        self.file_reports.push(FileReport::new(file_name));
        self.file_reports.last_mut().expect("just pushed")
    }

    pub fn derive_state(&mut self) {
        self.file_type_state =
            ReportState::worst_of(self.file_reports.iter().map(|report| report.file_state));
    }
}

/// Reports for all file types of one logical data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeReport {
    pub data_type: DataType,
    pub data_type_state: ReportState,
    #[serde(default)]
    pub file_type_reports: Vec<FileTypeReport>,
}

impl DataTypeReport {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            data_type_state: ReportState::NotValidated,
            file_type_reports: Vec::new(),
        }
    }

    pub fn file_type_report_mut(&mut self, file_type: &str) -> &mut FileTypeReport {
        if let Some(idx) = self
            .file_type_reports
            .iter()
            .position(|report| report.file_type == file_type)
        {
            return &mut self.file_type_reports[idx];
        }
        self.file_type_reports.push(FileTypeReport::new(file_type));
        self.file_type_reports.last_mut().expect("just pushed")
    }

    pub fn derive_state(&mut self) {
        for file_type in &mut self.file_type_reports {
            file_type.derive_state();
        }
        self.data_type_state = ReportState::worst_of(
            self.file_type_reports
                .iter()
                .map(|report| report.file_type_state),
        );
    }

    pub fn error_count(&self) -> usize {
        self.file_type_reports
            .iter()
            .flat_map(|file_type| &file_type.file_reports)
            .map(FileReport::error_count)
            .sum()
    }
}

/// Root aggregate of one submission's validation results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub data_type_reports: Vec<DataTypeReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report with one NOT_VALIDATED entry per data type, in the given
    /// order. Data types not present in a submission still appear.
    pub fn with_data_types<I>(data_types: I) -> Self
    where
        I: IntoIterator<Item = DataType>,
    {
        let mut report = Report::new();
        for data_type in data_types {
            report.data_type_report_mut(&data_type);
        }
        report
    }

    pub fn data_type_report(&self, data_type: &DataType) -> Option<&DataTypeReport> {
        self.data_type_reports
            .iter()
            .find(|report| &report.data_type == data_type)
    }

    pub fn data_type_report_mut(&mut self, data_type: &DataType) -> &mut DataTypeReport {
        if let Some(idx) = self
            .data_type_reports
            .iter()
            .position(|report| &report.data_type == data_type)
        {
            return &mut self.data_type_reports[idx];
        }
        self.data_type_reports
            .push(DataTypeReport::new(data_type.clone()));
        self.data_type_reports.last_mut().expect("just pushed")
    }

    /// Address a file report by (dataType, fileType, fileName), creating the
    /// intermediate nodes as needed.
    pub fn file_report_mut(
        &mut self,
        data_type: &DataType,
        file_type: &str,
        file_name: &str,
    ) -> &mut FileReport {
        self.data_type_report_mut(data_type)
            .file_type_report_mut(file_type)
            .file_report_mut(file_name)
    }

    /// Recompute every aggregate state bottom-up.
    pub fn derive_states(&mut self) {
        for data_type in &mut self.data_type_reports {
            data_type.derive_state();
        }
    }

    /// Worst-of across all data types.
    pub fn overall_state(&self) -> ReportState {
        ReportState::worst_of(
            self.data_type_reports
                .iter()
                .map(|report| report.data_type_state),
        )
    }

    pub fn error_count(&self) -> usize {
        self.data_type_reports
            .iter()
            .map(DataTypeReport::error_count)
            .sum()
    }

    /// Additively merge a report fragment produced by one unit of work.
    ///
    /// Errors are appended, never replaced; per-file states combine as
    /// worst-of so a checked-VALID mark survives an empty fragment and an
    /// error mark survives a passing one.
    pub fn absorb(&mut self, fragment: Report) {
        for data_type_entry in fragment.data_type_reports {
            let target = self.data_type_report_mut(&data_type_entry.data_type);
            target.data_type_state = target.data_type_state.max(data_type_entry.data_type_state);
            for file_type_entry in data_type_entry.file_type_reports {
                let file_type = target.file_type_report_mut(&file_type_entry.file_type);
                file_type.file_type_state = file_type
                    .file_type_state
                    .max(file_type_entry.file_type_state);
                for file_entry in file_type_entry.file_reports {
                    let file = file_type.file_report_mut(&file_entry.file_name);
                    file.file_state = file.file_state.max(file_entry.file_state);
                    file.errors.extend(file_entry.errors);
                }
            }
        }
    }

    /// Merge a partial re-validation result into this report.
    ///
    /// Only entries for `validated_types` are replaced by the corresponding
    /// entries of `new`; every other entry is carried over unchanged. A
    /// validated type with no entry in `new` is dropped to NOT_VALIDATED
    /// rather than keeping a stale result.
    #[must_use]
    pub fn merged(&self, new: &Report, validated_types: &[DataType]) -> Report {
        let mut merged = Report::new();
        for old_entry in &self.data_type_reports {
            if validated_types.contains(&old_entry.data_type) {
                let replacement = new
                    .data_type_report(&old_entry.data_type)
                    .cloned()
                    .unwrap_or_else(|| DataTypeReport::new(old_entry.data_type.clone()));
                merged.data_type_reports.push(replacement);
            } else {
                merged.data_type_reports.push(old_entry.clone());
            }
        }
        // Validated types the old report had never seen.
        for data_type in validated_types {
            if merged.data_type_report(data_type).is_none() {
                if let Some(entry) = new.data_type_report(data_type) {
                    merged.data_type_reports.push(entry.clone());
                }
            }
        }
        merged
    }
}
