use std::fs;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::{debug, info, info_span};

use genosub_model::{DataType, Dictionary, Report, Submission};
use genosub_validate::{
    CachedExclusions, CancelToken, ExecutionMode, FileExclusionSource, LocalExecutor,
    SubmissionValidator, ValidationRequest,
};

use genosub_cli::logging::redact_value;
use genosub_cli::report::ReportEnvelope;
use genosub_cli::summary::apply_table_style;
use genosub_cli::types::{DataTypeSummary, ValidateResult};

use crate::cli::{SchemasArgs, ValidateArgs};

pub fn run_schemas(args: &SchemasArgs) -> Result<()> {
    let dictionary = load_dictionary(args)?;
    let mut table = Table::new();
    table.set_header(vec!["Schema", "Role", "Pattern", "Fields", "Relations"]);
    apply_table_style(&mut table);
    for schema in &dictionary.file_schemas {
        table.add_row(vec![
            schema.name.clone(),
            format!("{:?}", schema.role).to_uppercase(),
            schema.pattern.clone(),
            schema.fields.len().to_string(),
            schema.relations.len().to_string(),
        ]);
    }
    println!("Dictionary {} ({:?})", dictionary.version, dictionary.state);
    println!("{table}");
    Ok(())
}

pub fn run_validate(args: &ValidateArgs) -> Result<ValidateResult> {
    let span = info_span!("validate", project = %args.project_key, release = %args.release_name);
    let _guard = span.enter();

    let contents = fs::read_to_string(&args.dictionary)
        .with_context(|| format!("read dictionary {}", args.dictionary.display()))?;
    let dictionary: Dictionary = serde_json::from_str(&contents)
        .with_context(|| format!("parse dictionary {}", args.dictionary.display()))?;
    info!(version = %dictionary.version, schemas = dictionary.file_schemas.len(), "dictionary loaded");

    let exclusions = match &args.exclusions {
        Some(path) => CachedExclusions::with_default_ttl(Box::new(FileExclusionSource::new(path))),
        None => CachedExclusions::empty(),
    };
    let executor = if args.parallel {
        LocalExecutor::parallel()
    } else {
        LocalExecutor::sequential()
    };
    let mode = match args.partitions {
        Some(partitions) => ExecutionMode::Partitioned(partitions),
        None => ExecutionMode::SingleNode,
    };
    let validator = SubmissionValidator::new(dictionary)
        .with_exclusions(exclusions)
        .with_executor(Box::new(executor))
        .with_execution_mode(mode);

    let data_types = if args.data_types.is_empty() {
        None
    } else {
        Some(
            args.data_types
                .iter()
                .map(|name| DataType::from(name.as_str()))
                .collect(),
        )
    };
    let request = ValidationRequest {
        project_key: args.project_key.clone(),
        release_name: args.release_name.clone(),
        submission_dir: args.submission_dir.clone(),
        data_types,
    };

    let mut submission = Submission::new(&args.project_key, &args.release_name);
    submission.queue()?;
    submission.start_validation()?;

    let run = validator.validate(&request, &CancelToken::new())?;
    log_error_details(&run.report);
    submission.finish_validation(&run.validated_data_types, run.outcome, &run.report)?;

    let report_path = match &args.report_out {
        Some(path) => {
            let envelope = ReportEnvelope::new(
                &args.project_key,
                &args.release_name,
                submission.report.clone(),
            );
            let payload = serde_json::to_string_pretty(&envelope)?;
            fs::write(path, payload)
                .with_context(|| format!("write report {}", path.display()))?;
            Some(path.clone())
        }
        None => None,
    };

    let data_types = submission
        .report
        .data_type_reports
        .iter()
        .map(|entry| DataTypeSummary {
            data_type: entry.data_type.as_str().to_string(),
            state: entry.data_type_state,
            files: entry
                .file_type_reports
                .iter()
                .map(|ft| ft.file_reports.len())
                .sum(),
            errors: entry.error_count(),
        })
        .collect();

    Ok(ValidateResult {
        project_key: args.project_key.clone(),
        release_name: args.release_name.clone(),
        state: submission.report.overall_state(),
        data_types,
        planning_errors: run
            .planning_errors
            .iter()
            .map(|e| format!("{}: {}", e.schema_name, e.message))
            .collect(),
        failures: run.failures,
        report_path,
    })
}

/// Per-error detail at debug level. Row values may identify donors, so
/// they pass through redaction unless `--log-data` is set.
fn log_error_details(report: &Report) {
    for data_type in &report.data_type_reports {
        for file_type in &data_type.file_type_reports {
            for file in &file_type.file_reports {
                for error in &file.errors {
                    debug!(
                        file = %file.file_name,
                        error_type = ?error.kind,
                        line = error.line_number,
                        value = error.value.as_deref().map_or("-", redact_value),
                        "validation error"
                    );
                }
            }
        }
    }
}

fn load_dictionary(args: &SchemasArgs) -> Result<Dictionary> {
    let contents = fs::read_to_string(&args.dictionary)
        .with_context(|| format!("read dictionary {}", args.dictionary.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse dictionary {}", args.dictionary.display()))
}
