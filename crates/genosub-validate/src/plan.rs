//! Dictionary-driven plan building.
//!
//! For each file schema with a matching physical file, a fixed, ordered
//! pipeline of pure build stages assembles the internal (single-file) and
//! external (cross-file) validation steps into an immutable `Plan`. Stage
//! order matters: later steps rely on earlier ones having run at execution
//! time (value-type coercion tags rows before restrictions and relations
//! read parsed values), so the stages attach steps in that same order.
//!
//! A stage failure for one schema (malformed pattern, a relation naming an
//! undeclared field) is captured as a planning error on the `Plan`; the
//! remaining schemas still get plans.

use genosub_ingest::SubmissionFiles;
use genosub_model::{
    DataType, Dictionary, FileSchema, FileSchemaRole, Relation, Restriction, SummaryType,
};
use tracing::{debug, info};

/// Which flow a step (and its error-collection wrapper) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    Internal,
    External,
}

/// One single-file validation step.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalStep {
    /// Coerce every typed cell to its declared value type, tagging rows.
    ValueTypes,
    /// The declared key fields must be unique within the file.
    UniqueKey { fields: Vec<String> },
    /// One restriction of one field.
    Restriction {
        field: String,
        restriction: Restriction,
    },
    /// Roll rows tagged invalid into the report. Always last.
    CollectErrors,
}

/// One cross-file step.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalStep {
    /// Join-based key check against the referenced schema's file.
    Relation(Relation),
    /// Field-value summary collection; reporting only, never pass/fail.
    Summary {
        field: String,
        summary: SummaryType,
    },
    /// Roll join results into the report. Always last.
    CollectErrors,
}

/// The per-schema sub-plan: independent of every other schema's sub-plan,
/// shares nothing but the append-only report sink at execution time.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub schema_name: String,
    pub data_type: DataType,
    pub file_names: Vec<String>,
    pub internal: Vec<InternalStep>,
    pub external: Vec<ExternalStep>,
}

impl FilePlan {
    fn new(schema: &FileSchema, file_names: Vec<String>) -> Self {
        Self {
            schema_name: schema.name.clone(),
            data_type: DataType::of_file_schema(&schema.name),
            file_names,
            internal: Vec::new(),
            external: Vec::new(),
        }
    }
}

/// A per-schema planning failure, kept on the plan as a file-level error so
/// unrelated schemas still validate.
#[derive(Debug, Clone)]
pub struct PlanningError {
    pub schema_name: String,
    pub message: String,
}

/// The assembled plan for one submission under one dictionary version.
#[derive(Debug, Clone)]
pub struct Plan {
    pub dictionary_version: String,
    pub file_plans: Vec<FilePlan>,
    pub errors: Vec<PlanningError>,
}

impl Plan {
    pub fn file_plan(&self, schema_name: &str) -> Option<&FilePlan> {
        self.file_plans
            .iter()
            .find(|plan| plan.schema_name == schema_name)
    }
}

type StageResult = Result<FilePlan, String>;
type Stage = fn(&Dictionary, &FileSchema, FilePlan) -> StageResult;

/// The fixed stage order. Changing it changes execution semantics; see the
/// module docs.
const STAGES: &[(&str, Stage)] = &[
    ("value-types", value_types_stage),
    ("unique-key", unique_key_stage),
    ("restrictions", restrictions_stage),
    ("relations", relations_stage),
    ("summaries", summaries_stage),
    ("error-collection", error_collection_stage),
];

/// Build the plan for every file schema with at least one matching file.
///
/// Absent schemas are logged and skipped; unsubmitted optional data types
/// simply stay NOT_VALIDATED. Pattern failures recorded during discovery
/// carry over as planning errors.
pub fn build_plan(dictionary: &Dictionary, files: &SubmissionFiles) -> Plan {
    let mut plan = Plan {
        dictionary_version: dictionary.version.clone(),
        file_plans: Vec::new(),
        errors: Vec::new(),
    };

    for (schema_name, error) in &files.pattern_errors {
        plan.errors.push(PlanningError {
            schema_name: schema_name.clone(),
            message: error.to_string(),
        });
    }

    for schema in &dictionary.file_schemas {
        if schema.role != FileSchemaRole::Submission {
            continue;
        }
        let file_names = files.files_for(&schema.name);
        if file_names.is_empty() {
            debug!(schema = %schema.name, "schema absent from submission; skipping");
            continue;
        }
        let mut file_plan = FilePlan::new(schema, file_names.to_vec());
        let mut failed = false;
        for (stage_name, stage) in STAGES {
            match stage(dictionary, schema, file_plan.clone()) {
                Ok(next) => file_plan = next,
                Err(message) => {
                    plan.errors.push(PlanningError {
                        schema_name: schema.name.clone(),
                        message: format!("{stage_name}: {message}"),
                    });
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            plan.file_plans.push(file_plan);
        }
    }

    info!(
        dictionary = %plan.dictionary_version,
        schemas = plan.file_plans.len(),
        planning_errors = plan.errors.len(),
        "plan built"
    );
    plan
}

fn value_types_stage(
    _dictionary: &Dictionary,
    _schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    plan.internal.push(InternalStep::ValueTypes);
    Ok(plan)
}

fn unique_key_stage(
    _dictionary: &Dictionary,
    schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    if schema.unique_fields.is_empty() {
        return Ok(plan);
    }
    schema
        .field_indices(&schema.unique_fields)
        .map_err(|error| error.to_string())?;
    plan.internal.push(InternalStep::UniqueKey {
        fields: schema.unique_fields.clone(),
    });
    Ok(plan)
}

fn restrictions_stage(
    dictionary: &Dictionary,
    schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    for field in &schema.fields {
        for restriction in &field.restrictions {
            match restriction {
                Restriction::Regex { pattern } => {
                    regex::Regex::new(pattern)
                        .map_err(|error| format!("field {}: {error}", field.name))?;
                }
                Restriction::Codelist { name } => {
                    if dictionary.codelist(name).is_none() {
                        return Err(format!("field {}: unknown codelist {name}", field.name));
                    }
                }
                Restriction::Required { .. } | Restriction::In { .. } => {}
            }
            plan.internal.push(InternalStep::Restriction {
                field: field.name.clone(),
                restriction: restriction.clone(),
            });
        }
    }
    Ok(plan)
}

fn relations_stage(
    dictionary: &Dictionary,
    schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    for relation in &schema.relations {
        let Some(other) = dictionary.file_schema(&relation.other_file_schema) else {
            return Err(format!(
                "relation references undeclared schema {}",
                relation.other_file_schema
            ));
        };
        schema
            .field_indices(&relation.fields)
            .map_err(|error| error.to_string())?;
        other
            .field_indices(&relation.other_fields)
            .map_err(|error| error.to_string())?;
        if relation.fields.len() != relation.other_fields.len() {
            return Err(format!(
                "relation to {} has mismatched key arity",
                relation.other_file_schema
            ));
        }
        plan.external.push(ExternalStep::Relation(relation.clone()));
    }
    Ok(plan)
}

fn summaries_stage(
    _dictionary: &Dictionary,
    schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    for field in &schema.fields {
        if let Some(summary) = field.summary_type {
            plan.external.push(ExternalStep::Summary {
                field: field.name.clone(),
                summary,
            });
        }
    }
    Ok(plan)
}

fn error_collection_stage(
    _dictionary: &Dictionary,
    _schema: &FileSchema,
    mut plan: FilePlan,
) -> StageResult {
    plan.internal.push(InternalStep::CollectErrors);
    plan.external.push(ExternalStep::CollectErrors);
    Ok(plan)
}
