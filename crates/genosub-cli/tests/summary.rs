//! Rendering tests for the validation summary output.

use genosub_cli::logging::{REDACTED_VALUE, redact_value};
use genosub_cli::summary::summary_table;
use genosub_cli::types::{DataTypeSummary, ValidateResult};
use genosub_model::ReportState;

fn sample_result() -> ValidateResult {
    ValidateResult {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        state: ReportState::Invalid,
        data_types: vec![
            DataTypeSummary {
                data_type: "clinical_core".to_string(),
                state: ReportState::Invalid,
                files: 3,
                errors: 2,
            },
            DataTypeSummary {
                data_type: "ssm".to_string(),
                state: ReportState::Valid,
                files: 1,
                errors: 0,
            },
        ],
        planning_errors: Vec::new(),
        failures: Vec::new(),
        report_path: None,
    }
}

#[test]
fn table_carries_headers_and_one_row_per_data_type() {
    let rendered = summary_table(&sample_result()).to_string();
    for label in ["Data type", "State", "Files", "Errors"] {
        assert!(rendered.contains(label), "missing header {label}");
    }
    assert!(rendered.contains("clinical_core"));
    assert!(rendered.contains("ssm"));
    assert!(rendered.contains("INVALID"));
}

#[test]
fn total_row_aggregates_counts() {
    let rendered = summary_table(&sample_result()).to_string();
    assert!(rendered.contains("TOTAL"));
    assert!(rendered.contains('4'));
}

#[test]
fn row_values_are_redacted_by_default() {
    assert_eq!(redact_value("DO1"), REDACTED_VALUE);
}
