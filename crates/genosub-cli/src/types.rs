use std::path::PathBuf;

use genosub_model::ReportState;

/// Outcome of one `validate` invocation, ready for summary printing.
#[derive(Debug)]
pub struct ValidateResult {
    pub project_key: String,
    pub release_name: String,
    pub state: ReportState,
    pub data_types: Vec<DataTypeSummary>,
    pub planning_errors: Vec<String>,
    pub failures: Vec<String>,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct DataTypeSummary {
    pub data_type: String,
    pub state: ReportState,
    pub files: usize,
    pub errors: usize,
}
