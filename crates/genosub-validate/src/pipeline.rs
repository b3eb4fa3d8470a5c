//! The validation pipeline: structural checks, then the internal flows,
//! then the external (relation and summary) flows, assembled into one
//! report for the submission merge.
//!
//! Stage order is a hard dependency: a file that fails its file chain is
//! never row-checked, a file that fails structurally never enters the
//! internal or external flows. Within a stage the per-schema work units
//! share nothing but the append-only report sink, so the executor may run
//! them in parallel.
//!
//! Cancellation and infrastructure failures end the run with a non
//! `Completed` outcome; fragments of interrupted units are never merged,
//! so an aborted run cannot corrupt the report it hands back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use genosub_ingest::{TsvReader, list_submission_files, match_file_schemas, sniff_file};
use genosub_model::{
    DataType, Dictionary, FileSchema, FileSchemaRole, Report, ReportState, ValidationOutcome,
};

use crate::checkers::{
    FileCheckContext, RowCheckContext, default_file_chain, default_row_chain, run_file_chain,
    run_row_chain,
};
use crate::context::{CancelToken, ReportSink};
use crate::error::{Result, ValidateError};
use crate::exclusion::CachedExclusions;
use crate::executor::{FlowExecutor, LocalExecutor, UnitOutput, WorkUnit};
use crate::key::{ExecutionMode, KeyRow, RelationCheck, check_relation};
use crate::plan::{ExternalStep, FilePlan, FlowType, Plan, PlanningError, build_plan};
use crate::summary::{FieldSummary, collect_summaries};

/// Field carrying the accession id used by the exclusion dictionary.
const ANALYSIS_ID_FIELD: &str = "analysis_id";

/// One validation run's input.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub project_key: String,
    pub release_name: String,
    pub submission_dir: PathBuf,
    /// Restrict the run to these data types; `None` validates everything
    /// the dictionary declares.
    pub data_types: Option<Vec<DataType>>,
}

/// One validation run's result, ready for `Submission::finish_validation`.
#[derive(Debug)]
pub struct ValidationRun {
    pub outcome: ValidationOutcome,
    pub report: Report,
    /// The data types this run covered; the merge replaces exactly these.
    pub validated_data_types: Vec<DataType>,
    pub summaries: BTreeMap<String, Vec<FieldSummary>>,
    pub planning_errors: Vec<PlanningError>,
    /// Infrastructure failures of individual work units (operator facing).
    pub failures: Vec<String>,
}

/// Validates one submission directory against one dictionary.
pub struct SubmissionValidator {
    dictionary: Arc<Dictionary>,
    exclusions: CachedExclusions,
    executor: Box<dyn FlowExecutor>,
    mode: ExecutionMode,
}

impl SubmissionValidator {
    pub fn new(dictionary: Dictionary) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
            exclusions: CachedExclusions::empty(),
            executor: Box::new(LocalExecutor::sequential()),
            mode: ExecutionMode::SingleNode,
        }
    }

    #[must_use]
    pub fn with_exclusions(mut self, exclusions: CachedExclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Box<dyn FlowExecutor>) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the whole pipeline for one submission.
    ///
    /// `Err` is reserved for failures before any checking starts (an
    /// unreadable submission directory, an unavailable exclusion
    /// dictionary); everything after that lands in the returned run, with
    /// `outcome` telling the merge what happened.
    pub fn validate(
        &self,
        request: &ValidationRequest,
        cancel: &CancelToken,
    ) -> Result<ValidationRun> {
        let file_names = list_submission_files(&request.submission_dir)?;
        let files = match_file_schemas(&self.dictionary, &file_names);
        let plan = build_plan(&self.dictionary, &files);
        let exclusions = self.exclusions.current()?;

        let in_scope = self.in_scope_data_types(request);
        let sink = ReportSink::new();
        sink.absorb(Report::with_data_types(in_scope.iter().cloned()));

        let file_plans: Vec<&FilePlan> = plan
            .file_plans
            .iter()
            .filter(|fp| in_scope.contains(&fp.data_type))
            .collect();

        // Relations may point at schemas whose data type is outside this
        // run's scope (or at SYSTEM schemas that never get a plan). Those
        // referenced files still need a structural pass so the relation
        // checks can pair against them; their own findings belong to a run
        // that has them in scope.
        let in_scope_schemas: BTreeSet<&str> = file_plans
            .iter()
            .map(|fp| fp.schema_name.as_str())
            .collect();
        let support_files: Vec<(String, Vec<String>)> = file_plans
            .iter()
            .flat_map(|fp| fp.external.iter())
            .filter_map(|step| match step {
                ExternalStep::Relation(relation) => Some(relation.other_file_schema.clone()),
                ExternalStep::Summary { .. } | ExternalStep::CollectErrors => None,
            })
            .collect::<BTreeSet<String>>()
            .into_iter()
            .filter(|schema| !in_scope_schemas.contains(schema.as_str()))
            .map(|schema| {
                let names = files.files_for(&schema).to_vec();
                (schema, names)
            })
            .filter(|(_, names)| !names.is_empty())
            .collect();

        self.attach_planning_errors(&plan, &files, &sink);

        let mut failures: Vec<String> = Vec::new();
        let mut cancelled = false;

        // Structural pass: file chain, then row chain. Fail-fast files are
        // excluded from everything that follows.
        let mut structurally_valid: BTreeSet<(String, String)> = BTreeSet::new();
        'structural: for file_plan in &file_plans {
            let Some(schema) = self.dictionary.file_schema(&file_plan.schema_name) else {
                continue;
            };
            for file_name in &file_plan.file_names {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'structural;
                }
                let path = request.submission_dir.join(file_name);
                match self.check_structure(schema, &files, file_name, &path, cancel) {
                    Ok(StructureOutcome::Valid) => {
                        sink.touch(&file_plan.data_type, &file_plan.schema_name, file_name);
                        structurally_valid
                            .insert((file_plan.schema_name.clone(), file_name.clone()));
                    }
                    Ok(StructureOutcome::Invalid(errors)) => {
                        sink.append_all(
                            &file_plan.data_type,
                            &file_plan.schema_name,
                            file_name,
                            errors,
                        );
                    }
                    Err(error) if error.is_cancelled() => {
                        cancelled = true;
                        break 'structural;
                    }
                    Err(error) => {
                        warn!(file = file_name, %error, "structural pass failed");
                        failures.push(format!("{file_name}: {error}"));
                    }
                }
            }
        }

        if !cancelled {
            'support: for (schema_name, file_names) in &support_files {
                let Some(schema) = self.dictionary.file_schema(schema_name) else {
                    continue;
                };
                for file_name in file_names {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        break 'support;
                    }
                    let path = request.submission_dir.join(file_name);
                    match self.check_structure(schema, &files, file_name, &path, cancel) {
                        Ok(StructureOutcome::Valid) => {
                            structurally_valid.insert((schema_name.clone(), file_name.clone()));
                        }
                        Ok(StructureOutcome::Invalid(errors)) => {
                            warn!(
                                file = file_name,
                                errors = errors.len(),
                                "referenced file failed structural checks; its relations go unchecked"
                            );
                        }
                        Err(error) if error.is_cancelled() => {
                            cancelled = true;
                            break 'support;
                        }
                        Err(error) => {
                            warn!(file = file_name, %error, "structural pass failed");
                            failures.push(format!("{file_name}: {error}"));
                        }
                    }
                }
            }
        }

        // Internal and external flows as independent work units.
        if !cancelled {
            let units = self.build_units(
                request,
                &file_plans,
                &in_scope,
                &structurally_valid,
                &exclusions,
                cancel,
            );
            let results = self.executor.execute(units);
            let mut summaries = BTreeMap::new();
            for result in results {
                match result.output {
                    Ok(UnitOutput {
                        report,
                        summaries: unit_summaries,
                    }) => {
                        sink.absorb(report);
                        if let Some((file_name, values)) = unit_summaries {
                            summaries.insert(file_name, values);
                        }
                    }
                    Err(error) if error.is_cancelled() => cancelled = true,
                    Err(error) => {
                        warn!(unit = %result.name, %error, "work unit failed");
                        failures.push(format!("{}: {error}", result.name));
                    }
                }
            }

            if !cancelled && failures.is_empty() {
                for (schema_name, file_name) in &structurally_valid {
                    if let Some(fp) = file_plans.iter().find(|fp| &fp.schema_name == schema_name) {
                        sink.mark_checked(&fp.data_type, schema_name, file_name);
                    }
                }
            }

            let outcome = if cancelled {
                ValidationOutcome::Aborted
            } else if failures.is_empty() {
                ValidationOutcome::Completed
            } else {
                ValidationOutcome::Failed
            };
            let report = sink.into_report();
            info!(
                project = %request.project_key,
                release = %request.release_name,
                state = ?report.overall_state(),
                errors = report.error_count(),
                ?outcome,
                "validation finished"
            );
            return Ok(ValidationRun {
                outcome,
                report,
                validated_data_types: in_scope.into_iter().collect(),
                summaries,
                planning_errors: plan.errors,
                failures,
            });
        }

        info!(
            project = %request.project_key,
            release = %request.release_name,
            "validation aborted by cancellation"
        );
        Ok(ValidationRun {
            outcome: ValidationOutcome::Aborted,
            report: sink.into_report(),
            validated_data_types: in_scope.into_iter().collect(),
            summaries: BTreeMap::new(),
            planning_errors: plan.errors,
            failures,
        })
    }

    fn in_scope_data_types(&self, request: &ValidationRequest) -> BTreeSet<DataType> {
        self.dictionary
            .file_schemas
            .iter()
            .filter(|schema| schema.role == FileSchemaRole::Submission)
            .map(|schema| DataType::of_file_schema(&schema.name))
            .filter(|data_type| {
                request
                    .data_types
                    .as_ref()
                    .is_none_or(|subset| subset.contains(data_type))
            })
            .collect()
    }

    /// Planning failures become ERROR-state file entries so the report
    /// shows operators which schemas never got checked.
    fn attach_planning_errors(
        &self,
        plan: &Plan,
        files: &genosub_ingest::SubmissionFiles,
        sink: &ReportSink,
    ) {
        for error in &plan.errors {
            warn!(schema = %error.schema_name, message = %error.message, "planning failed");
            let data_type = DataType::of_file_schema(&error.schema_name);
            let mut fragment = Report::new();
            for file_name in files.files_for(&error.schema_name) {
                fragment
                    .file_report_mut(&data_type, &error.schema_name, file_name)
                    .file_state = ReportState::Error;
            }
            sink.absorb(fragment);
        }
    }

    fn check_structure(
        &self,
        schema: &FileSchema,
        files: &genosub_ingest::SubmissionFiles,
        file_name: &str,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<StructureOutcome> {
        let sniff = sniff_file(path)?;
        let mut reader = TsvReader::open(path)?;
        let header = reader.read_header()?.cloned();

        let mut ctx = FileCheckContext::new(
            &self.dictionary,
            schema,
            files,
            file_name,
            header.as_ref(),
            sniff,
        );
        let chain = run_file_chain(&default_file_chain(), &mut ctx);
        let mut errors = ctx.into_errors();
        if !chain.can_continue() || !errors.is_empty() {
            return Ok(StructureOutcome::Invalid(errors));
        }
        let header_width = header.map(|row| row.fields.len()).unwrap_or(0);

        let row_checkers = default_row_chain();
        let mut rows_seen = 0u64;
        let mut stopped = false;
        while let Some(row) = reader.next_row()? {
            rows_seen += 1;
            if rows_seen % crate::internal::CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(ValidateError::Cancelled);
            }
            let mut row_ctx = RowCheckContext::new(schema, header_width, &row);
            let run = run_row_chain(&row_checkers, &mut row_ctx);
            errors.extend(row_ctx.into_errors());
            if !run.can_continue() {
                stopped = true;
                break;
            }
        }
        if !stopped {
            for checker in &row_checkers {
                checker.finish(rows_seen, &mut errors);
            }
        }
        if errors.is_empty() {
            Ok(StructureOutcome::Valid)
        } else {
            Ok(StructureOutcome::Invalid(errors))
        }
    }

    fn build_units(
        &self,
        request: &ValidationRequest,
        file_plans: &[&FilePlan],
        in_scope: &BTreeSet<DataType>,
        structurally_valid: &BTreeSet<(String, String)>,
        exclusions: &crate::exclusion::ExclusionDictionary,
        cancel: &CancelToken,
    ) -> Vec<WorkUnit> {
        let mut units = Vec::new();
        for file_plan in file_plans {
            for file_name in &file_plan.file_names {
                let key = (file_plan.schema_name.clone(), file_name.clone());
                if !structurally_valid.contains(&key) {
                    continue;
                }
                units.push(self.internal_unit(request, file_plan, file_name, cancel));
                if file_plan
                    .external
                    .iter()
                    .any(|step| matches!(step, ExternalStep::Summary { .. }))
                {
                    units.push(self.summary_unit(request, file_plan, file_name, cancel));
                }
                for step in &file_plan.external {
                    let ExternalStep::Relation(relation) = step else {
                        continue;
                    };
                    if let Some(unit) = self.relation_unit(
                        request,
                        file_plan,
                        file_name,
                        relation,
                        in_scope,
                        structurally_valid,
                        exclusions,
                        cancel,
                    ) {
                        units.push(unit);
                    }
                }
            }
        }
        units
    }

    fn internal_unit(
        &self,
        request: &ValidationRequest,
        file_plan: &FilePlan,
        file_name: &str,
        cancel: &CancelToken,
    ) -> WorkUnit {
        let dictionary = Arc::clone(&self.dictionary);
        let plan = file_plan.clone();
        let path = request.submission_dir.join(file_name);
        let file_name = file_name.to_string();
        let cancel = cancel.clone();
        WorkUnit::new(
            format!("internal {file_name}"),
            FlowType::Internal,
            move || {
                let schema = dictionary
                    .file_schema(&plan.schema_name)
                    .ok_or_else(|| ValidateError::Executor("schema vanished from plan".into()))?;
                let mut reader = TsvReader::open(&path)?;
                let outcome =
                    crate::internal::run_internal(&dictionary, schema, &plan, &mut reader, &cancel)?;
                let mut fragment = Report::new();
                let file = fragment.file_report_mut(&plan.data_type, &plan.schema_name, &file_name);
                for error in outcome.errors {
                    file.push_error(error);
                }
                Ok(UnitOutput::report_only(fragment))
            },
        )
    }

    fn summary_unit(
        &self,
        request: &ValidationRequest,
        file_plan: &FilePlan,
        file_name: &str,
        cancel: &CancelToken,
    ) -> WorkUnit {
        let plan = file_plan.clone();
        let path = request.submission_dir.join(file_name);
        let file_name = file_name.to_string();
        let cancel = cancel.clone();
        WorkUnit::new(
            format!("summary {file_name}"),
            FlowType::External,
            move || {
                let mut reader = TsvReader::open(&path)?;
                let summaries = collect_summaries(&plan, &mut reader, &cancel)?;
                Ok(UnitOutput::summaries_for(file_name, summaries))
            },
        )
    }

    /// Build the relation-check unit for one local file, or `None` when the
    /// referenced side has no structurally valid file (the file chain
    /// already reported that).
    ///
    /// Unused-key findings land on the referenced file, so they are only
    /// attached when the referenced file's data type is part of this run.
    #[allow(clippy::too_many_arguments)]
    fn relation_unit(
        &self,
        request: &ValidationRequest,
        file_plan: &FilePlan,
        file_name: &str,
        relation: &genosub_model::Relation,
        in_scope: &BTreeSet<DataType>,
        structurally_valid: &BTreeSet<(String, String)>,
        exclusions: &crate::exclusion::ExclusionDictionary,
        cancel: &CancelToken,
    ) -> Option<WorkUnit> {
        let referenced_file = structurally_valid
            .iter()
            .find(|(schema, _)| schema == &relation.other_file_schema)
            .map(|(_, file)| file.clone())?;
        let referenced_in_scope =
            in_scope.contains(&DataType::of_file_schema(&relation.other_file_schema));

        let relation = relation.clone();
        let local_schema = file_plan.schema_name.clone();
        let local_data_type = file_plan.data_type.clone();
        let local_path = request.submission_dir.join(file_name);
        let local_file = file_name.to_string();
        let referenced_path = request.submission_dir.join(&referenced_file);
        let project_key = request.project_key.clone();
        let exclusions = exclusions.clone();
        let mode = self.mode;
        let cancel = cancel.clone();

        Some(WorkUnit::new(
            format!("relation {local_schema}->{}", relation.other_file_schema),
            FlowType::External,
            move || {
                let local_fields = relation.fields.clone();
                let referenced_fields = relation.other_fields.clone();
                let local = extract_keys(&local_path, &local_fields, &cancel)?;
                let referenced = extract_keys(&referenced_path, &referenced_fields, &cancel)?;
                let check = RelationCheck {
                    relation: &relation,
                    local_file: &local_file,
                    local,
                    referenced_file: &referenced_file,
                    referenced,
                };
                let errors = check_relation(&project_key, &check, &exclusions, mode);

                let mut fragment = Report::new();
                let local_report =
                    fragment.file_report_mut(&local_data_type, &local_schema, &local_file);
                for error in errors.local {
                    local_report.push_error(error);
                }
                if referenced_in_scope && !errors.referenced.is_empty() {
                    let referenced_data_type =
                        DataType::of_file_schema(&relation.other_file_schema);
                    let referenced_report = fragment.file_report_mut(
                        &referenced_data_type,
                        &relation.other_file_schema,
                        &referenced_file,
                    );
                    for error in errors.referenced {
                        referenced_report.push_error(error);
                    }
                }
                Ok(UnitOutput::report_only(fragment))
            },
        ))
    }
}

enum StructureOutcome {
    Valid,
    Invalid(Vec<genosub_model::ValidationError>),
}

/// Stream one file and extract the key tuple of every data row, carrying
/// the analysis id alongside when the file has that column.
fn extract_keys(path: &Path, fields: &[String], cancel: &CancelToken) -> Result<Vec<KeyRow>> {
    let mut reader = TsvReader::open(path)?;
    let header = reader
        .read_header()?
        .ok_or_else(|| ValidateError::Executor("key extraction on empty file".to_string()))?
        .clone();
    let indices: Vec<Option<usize>> = fields
        .iter()
        .map(|field| {
            header
                .fields
                .iter()
                .position(|cell| cell.trim() == field.as_str())
        })
        .collect();
    let analysis_idx = header
        .fields
        .iter()
        .position(|cell| cell.trim() == ANALYSIS_ID_FIELD);

    let mut keys = Vec::new();
    let mut rows = 0u64;
    while let Some(row) = reader.next_row()? {
        rows += 1;
        if rows % crate::internal::CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }
        let tuple: Vec<String> = indices
            .iter()
            .map(|idx| {
                idx.map(|idx| row.field(idx).trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        let mut key = KeyRow::new(tuple, row.line_number);
        if let Some(idx) = analysis_idx {
            let raw = row.field(idx).trim();
            if !raw.is_empty() {
                key = key.with_analysis_id(raw);
            }
        }
        keys.push(key);
    }
    Ok(keys)
}
