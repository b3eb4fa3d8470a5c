//! End-to-end pipeline tests over real submission directories.

use std::fs;
use std::path::Path;

use genosub_model::{
    Codelist, DataType, Dictionary, ErrorKind, Field, FileSchema, FileSchemaRole, Relation,
    ReportState, Restriction, Term, ValidationOutcome, ValueType,
};
use genosub_validate::{
    CancelToken, LocalExecutor, SubmissionValidator, ValidationRequest, ValidationRun,
};

fn make_field(name: &str, value_type: ValueType, restrictions: Vec<Restriction>) -> Field {
    Field {
        name: name.to_string(),
        label: None,
        value_type,
        summary_type: None,
        restrictions,
    }
}

fn make_dictionary() -> Dictionary {
    let donor = FileSchema {
        name: "donor".to_string(),
        label: None,
        role: FileSchemaRole::Submission,
        pattern: r"^donor(\.[0-9]+)?\.txt$".to_string(),
        unique_fields: vec!["donor_id".to_string()],
        fields: vec![
            make_field("donor_id", ValueType::Text, vec![Restriction::Required {
                accept_missing_code: false,
            }]),
            make_field("sex", ValueType::Text, vec![Restriction::Codelist {
                name: "donor.sex".to_string(),
            }]),
            make_field("age", ValueType::Integer, Vec::new()),
        ],
        relations: Vec::new(),
    };
    let specimen = FileSchema {
        name: "specimen".to_string(),
        label: None,
        role: FileSchemaRole::Submission,
        pattern: r"^specimen(\.[0-9]+)?\.txt$".to_string(),
        unique_fields: vec!["specimen_id".to_string()],
        fields: vec![
            make_field("specimen_id", ValueType::Text, vec![Restriction::Required {
                accept_missing_code: false,
            }]),
            make_field("donor_id", ValueType::Text, Vec::new()),
        ],
        relations: vec![Relation {
            fields: vec!["donor_id".to_string()],
            other_file_schema: "donor".to_string(),
            other_fields: vec!["donor_id".to_string()],
            bidirectional: false,
        }],
    };
    let ssm_m = FileSchema {
        name: "ssm_m".to_string(),
        label: None,
        role: FileSchemaRole::Submission,
        pattern: r"^ssm_m(\.[0-9]+)?\.txt$".to_string(),
        unique_fields: vec!["analysis_id".to_string()],
        fields: vec![make_field("analysis_id", ValueType::Text, Vec::new())],
        relations: Vec::new(),
    };

    let mut dictionary = Dictionary::new("0.8c");
    dictionary.codelists = vec![Codelist {
        name: "donor.sex".to_string(),
        terms: vec![
            Term {
                code: "1".to_string(),
                value: "male".to_string(),
            },
            Term {
                code: "2".to_string(),
                value: "female".to_string(),
            },
        ],
    }];
    dictionary.file_schemas = vec![donor, specimen, ssm_m];
    dictionary
}

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn run(dir: &Path) -> ValidationRun {
    let validator = SubmissionValidator::new(make_dictionary());
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.to_path_buf(),
        data_types: None,
    };
    validator.validate(&request, &CancelToken::new()).unwrap()
}

fn file_errors<'a>(
    run: &'a ValidationRun,
    data_type: &DataType,
    file_type: &str,
    file_name: &str,
) -> &'a [genosub_model::ValidationError] {
    let dt = run.report.data_type_report(data_type).unwrap();
    let ft = dt
        .file_type_reports
        .iter()
        .find(|ft| ft.file_type == file_type)
        .unwrap();
    let file = ft
        .file_reports
        .iter()
        .find(|f| f.file_name == file_name)
        .unwrap();
    &file.errors
}

#[test]
fn clean_submission_validates() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\nDO2\tfemale\t51\n",
    );
    write_file(
        dir.path(),
        "specimen.txt",
        "specimen_id\tdonor_id\nSP1\tDO1\nSP2\tDO2\n",
    );

    let result = run(dir.path());
    assert_eq!(result.outcome, ValidationOutcome::Completed);
    assert!(result.failures.is_empty());
    assert_eq!(result.report.overall_state(), ReportState::Valid);

    let clinical = result
        .report
        .data_type_report(&DataType::clinical_core())
        .unwrap();
    assert_eq!(clinical.data_type_state, ReportState::Valid);
    // ssm was never submitted; its entry exists but is untouched.
    let ssm = result.report.data_type_report(&DataType::from("ssm")).unwrap();
    assert_eq!(ssm.data_type_state, ReportState::NotValidated);
    assert!(result.validated_data_types.contains(&DataType::from("ssm")));
}

#[test]
fn codelist_violation_is_reported_with_its_line() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\nDO2\tunknown\t51\n",
    );

    let result = run(dir.path());
    assert_eq!(result.outcome, ValidationOutcome::Completed);
    assert_eq!(result.report.overall_state(), ReportState::Invalid);

    let errors = file_errors(&result, &DataType::clinical_core(), "donor", "donor.txt");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::CodelistError);
    assert_eq!(errors[0].line_number, Some(3));
    assert_eq!(errors[0].value.as_deref(), Some("unknown"));
}

#[test]
fn orphan_specimen_is_a_relation_violation() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\n",
    );
    write_file(
        dir.path(),
        "specimen.txt",
        "specimen_id\tdonor_id\nSP1\tDO1\nSP2\tDO9\n",
    );

    let result = run(dir.path());
    let errors = file_errors(&result, &DataType::clinical_core(), "specimen", "specimen.txt");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::RelationViolation);
    assert_eq!(errors[0].line_number, Some(3));
    assert_eq!(errors[0].value.as_deref(), Some("DO9"));
    // The donor file itself stays valid.
    let clinical = result
        .report
        .data_type_report(&DataType::clinical_core())
        .unwrap();
    assert_eq!(clinical.data_type_state, ReportState::Invalid);
}

#[test]
fn structurally_broken_file_skips_deeper_checks() {
    let dir = tempfile::tempdir().unwrap();
    // Wrong header: row-level and internal checks must never run.
    write_file(
        dir.path(),
        "donor.txt",
        "wrong_column\nDO1\n",
    );

    let result = run(dir.path());
    let errors = file_errors(&result, &DataType::clinical_core(), "donor", "donor.txt");
    assert!(errors.iter().all(|e| e.kind == ErrorKind::InvalidHeader));
}

#[test]
fn colliding_files_both_fail() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "donor.1.txt", "donor_id\tsex\tage\nDO1\tmale\t41\n");
    write_file(dir.path(), "donor.2.txt", "donor_id\tsex\tage\nDO2\tmale\t42\n");

    let result = run(dir.path());
    for file in ["donor.1.txt", "donor.2.txt"] {
        let errors = file_errors(&result, &DataType::clinical_core(), "donor", file);
        assert_eq!(errors[0].kind, ErrorKind::FileCollision);
    }
    assert_eq!(result.report.overall_state(), ReportState::Invalid);
}

#[test]
fn duplicate_primary_key_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\nDO1\tfemale\t50\n",
    );

    let result = run(dir.path());
    let errors = file_errors(&result, &DataType::clinical_core(), "donor", "donor.txt");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::DuplicateKey);
    assert_eq!(errors[0].line_number, Some(3));
}

#[test]
fn cancellation_yields_a_clean_abort() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\n",
    );

    let validator = SubmissionValidator::new(make_dictionary());
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.path().to_path_buf(),
        data_types: None,
    };
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = validator.validate(&request, &cancel).unwrap();
    assert_eq!(result.outcome, ValidationOutcome::Aborted);
    // Nothing was promoted to VALID.
    assert_ne!(result.report.overall_state(), ReportState::Valid);
}

#[test]
fn missing_submission_directory_is_an_error() {
    let validator = SubmissionValidator::new(make_dictionary());
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: "/nonexistent/submission".into(),
        data_types: None,
    };
    assert!(validator.validate(&request, &CancelToken::new()).is_err());
}

#[test]
fn data_type_subset_leaves_other_types_out_of_scope() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\n",
    );
    write_file(dir.path(), "ssm_m.txt", "analysis_id\nAN1\n");

    let validator = SubmissionValidator::new(make_dictionary());
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.path().to_path_buf(),
        data_types: Some(vec![DataType::from("ssm")]),
    };
    let result = validator.validate(&request, &CancelToken::new()).unwrap();
    assert_eq!(result.validated_data_types, vec![DataType::from("ssm")]);
    let ssm = result.report.data_type_report(&DataType::from("ssm")).unwrap();
    assert_eq!(ssm.data_type_state, ReportState::Valid);
    // The clinical files were not in scope this run.
    assert!(
        result
            .report
            .data_type_report(&DataType::clinical_core())
            .is_none()
    );
}

fn feature_dictionary(bidirectional: bool) -> Dictionary {
    let specimen = FileSchema {
        name: "specimen".to_string(),
        label: None,
        role: FileSchemaRole::Submission,
        pattern: r"^specimen(\.[0-9]+)?\.txt$".to_string(),
        unique_fields: vec!["specimen_id".to_string()],
        fields: vec![make_field("specimen_id", ValueType::Text, vec![
            Restriction::Required {
                accept_missing_code: false,
            },
        ])],
        relations: Vec::new(),
    };
    let ssm_m = FileSchema {
        name: "ssm_m".to_string(),
        label: None,
        role: FileSchemaRole::Submission,
        pattern: r"^ssm_m(\.[0-9]+)?\.txt$".to_string(),
        unique_fields: vec!["analysis_id".to_string()],
        fields: vec![
            make_field("analysis_id", ValueType::Text, Vec::new()),
            make_field("specimen_id", ValueType::Text, Vec::new()),
        ],
        relations: vec![Relation {
            fields: vec!["specimen_id".to_string()],
            other_file_schema: "specimen".to_string(),
            other_fields: vec!["specimen_id".to_string()],
            bidirectional,
        }],
    };
    let mut dictionary = Dictionary::new("0.8c");
    dictionary.file_schemas = vec![specimen, ssm_m];
    dictionary
}

#[test]
fn subset_run_checks_relations_into_out_of_scope_data_types() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "specimen.txt", "specimen_id\nSP1\n");
    write_file(
        dir.path(),
        "ssm_m.txt",
        "analysis_id\tspecimen_id\nAN1\tSP1\nAN2\tSP9\n",
    );

    let validator = SubmissionValidator::new(feature_dictionary(false));
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.path().to_path_buf(),
        data_types: Some(vec![DataType::from("ssm")]),
    };
    let result = validator.validate(&request, &CancelToken::new()).unwrap();

    let errors = file_errors(&result, &DataType::from("ssm"), "ssm_m", "ssm_m.txt");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::RelationViolation);
    assert_eq!(errors[0].line_number, Some(3));
    assert_eq!(errors[0].value.as_deref(), Some("SP9"));
    let ssm = result.report.data_type_report(&DataType::from("ssm")).unwrap();
    assert_eq!(ssm.data_type_state, ReportState::Invalid);
    // The specimen file was only consulted; it is not reported on.
    assert!(
        result
            .report
            .data_type_report(&DataType::clinical_core())
            .is_none()
    );
}

#[test]
fn subset_run_keeps_unused_key_findings_off_out_of_scope_files() {
    let dir = tempfile::tempdir().unwrap();
    // SP2 is never used by the feature file; on a full run the
    // bidirectional relation would flag it against specimen.txt.
    write_file(dir.path(), "specimen.txt", "specimen_id\nSP1\nSP2\n");
    write_file(
        dir.path(),
        "ssm_m.txt",
        "analysis_id\tspecimen_id\nAN1\tSP1\n",
    );

    let validator = SubmissionValidator::new(feature_dictionary(true));
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.path().to_path_buf(),
        data_types: Some(vec![DataType::from("ssm")]),
    };
    let result = validator.validate(&request, &CancelToken::new()).unwrap();

    assert_eq!(result.outcome, ValidationOutcome::Completed);
    let ssm = result.report.data_type_report(&DataType::from("ssm")).unwrap();
    assert_eq!(ssm.data_type_state, ReportState::Valid);
    assert!(
        result
            .report
            .data_type_report(&DataType::clinical_core())
            .is_none()
    );
}

#[test]
fn parallel_execution_produces_the_same_report() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "donor.txt",
        "donor_id\tsex\tage\nDO1\tmale\t44\nDO2\tnope\t\n",
    );
    write_file(
        dir.path(),
        "specimen.txt",
        "specimen_id\tdonor_id\nSP1\tDO1\nSP2\tDO7\n",
    );
    let request = ValidationRequest {
        project_key: "PRJ1".to_string(),
        release_name: "release18".to_string(),
        submission_dir: dir.path().to_path_buf(),
        data_types: None,
    };

    let sequential = SubmissionValidator::new(make_dictionary())
        .with_executor(Box::new(LocalExecutor::sequential()))
        .validate(&request, &CancelToken::new())
        .unwrap();
    let parallel = SubmissionValidator::new(make_dictionary())
        .with_executor(Box::new(LocalExecutor::parallel()))
        .validate(&request, &CancelToken::new())
        .unwrap();

    assert_eq!(sequential.report, parallel.report);
}
