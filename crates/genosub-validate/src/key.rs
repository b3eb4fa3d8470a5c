//! Relational key-integrity validation across a submission's file family.
//!
//! For every declared relation the validator co-groups the key tuples of
//! the local and referenced files and checks:
//!
//! - **orphans** (always): every local tuple must exist on the referenced
//!   side;
//! - **unreferenced keys** (bidirectional relations only): every referenced
//!   tuple must be used by at least one local tuple, reported against the
//!   referenced file;
//! - **primary-key uniqueness**: a schema's declared key tuple must be
//!   unique within its file (the first occurrence is never an error).
//!
//! The comparison is a sort-merge co-group, never a nested loop, so the
//! same work can be shipped to the batch substrate. Execution may run on a
//! single node or hash-partitioned; both modes produce the same
//! deterministic, order-independent error stream. The exclusion dictionary
//! is consulted after the join, immediately before an error would be
//! emitted.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use tracing::debug;

use genosub_model::{ErrorKind, Relation, ValidationError};

use crate::exclusion::ExclusionDictionary;

/// One extracted key occurrence: the tuple, its 1-based source line, and
/// the row's analysis id when the schema carries one (exclusion scope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub tuple: Vec<String>,
    pub line_number: u64,
    pub analysis_id: Option<String>,
}

impl KeyRow {
    pub fn new(tuple: Vec<String>, line_number: u64) -> Self {
        Self {
            tuple,
            line_number,
            analysis_id: None,
        }
    }

    #[must_use]
    pub fn with_analysis_id(mut self, analysis_id: impl Into<String>) -> Self {
        self.analysis_id = Some(analysis_id.into());
        self
    }
}

/// How the co-group is executed. Both modes are a correctness contract:
/// identical error output, whatever the partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    SingleNode,
    /// Hash-partition tuples into `n` independent co-groups.
    Partitioned(usize),
}

/// Input of one relation check: extracted keys for both sides.
pub struct RelationCheck<'a> {
    pub relation: &'a Relation,
    pub local_file: &'a str,
    pub local: Vec<KeyRow>,
    pub referenced_file: &'a str,
    pub referenced: Vec<KeyRow>,
}

/// Errors of one relation check, split by the file they attach to.
#[derive(Debug, Default)]
pub struct RelationErrors {
    /// Orphan errors, attached to the local file.
    pub local: Vec<ValidationError>,
    /// Unreferenced-key errors, attached to the referenced file.
    pub referenced: Vec<ValidationError>,
}

fn partition_of(tuple: &[String], partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    tuple.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Referenced,
}

/// Sort-merge co-group over one partition's entries.
///
/// Entries are sorted by tuple; each tuple group is scanned once for
/// presence on either side. Output order inside a partition follows the
/// sorted tuples; the caller re-sorts the concatenation, which makes the
/// result independent of partitioning.
fn co_group(
    relation: &Relation,
    entries: &mut Vec<(&KeyRow, Side)>,
    exclusions: &ExclusionDictionary,
    project_key: &str,
) -> RelationErrors {
    entries.sort_by(|a, b| a.0.tuple.cmp(&b.0.tuple).then(a.1.cmp_key().cmp(&b.1.cmp_key())));
    let mut errors = RelationErrors::default();

    let mut idx = 0;
    while idx < entries.len() {
        let group_tuple = &entries[idx].0.tuple;
        let mut end = idx;
        while end < entries.len() && &entries[end].0.tuple == group_tuple {
            end += 1;
        }
        let group = &entries[idx..end];
        let has_local = group.iter().any(|(_, side)| *side == Side::Local);
        let has_referenced = group.iter().any(|(_, side)| *side == Side::Referenced);

        if !has_referenced {
            for (row, side) in group {
                if *side != Side::Local {
                    continue;
                }
                if let Some(analysis_id) = &row.analysis_id
                    && exclusions.is_excluded(project_key, analysis_id)
                {
                    debug!(line = row.line_number, "relation miss suppressed by exclusion");
                    continue;
                }
                errors.local.push(
                    ValidationError::at_line(
                        ErrorKind::RelationViolation,
                        relation.fields.clone(),
                        row.line_number,
                    )
                    .with_value(row.tuple.join("|")),
                );
            }
        }
        if relation.bidirectional && !has_local {
            for (row, side) in group {
                if *side != Side::Referenced {
                    continue;
                }
                if let Some(analysis_id) = &row.analysis_id
                    && exclusions.is_excluded(project_key, analysis_id)
                {
                    continue;
                }
                errors.referenced.push(
                    ValidationError::at_line(
                        ErrorKind::UnusedReferencedKey,
                        relation.other_fields.clone(),
                        row.line_number,
                    )
                    .with_value(row.tuple.join("|")),
                );
            }
        }
        idx = end;
    }
    errors
}

impl Side {
    fn cmp_key(self) -> u8 {
        match self {
            Side::Local => 0,
            Side::Referenced => 1,
        }
    }
}

fn sort_errors(errors: &mut [ValidationError]) {
    errors.sort_by(|a, b| {
        a.line_number
            .cmp(&b.line_number)
            .then_with(|| a.value.cmp(&b.value))
            .then_with(|| a.field_names.cmp(&b.field_names))
    });
}

/// Check one relation. The output is deterministic and identical for every
/// execution mode.
pub fn check_relation(
    project_key: &str,
    check: &RelationCheck<'_>,
    exclusions: &ExclusionDictionary,
    mode: ExecutionMode,
) -> RelationErrors {
    let all: Vec<(&KeyRow, Side)> = check
        .local
        .iter()
        .map(|row| (row, Side::Local))
        .chain(check.referenced.iter().map(|row| (row, Side::Referenced)))
        .collect();

    let mut result = match mode {
        ExecutionMode::SingleNode => {
            let mut entries = all;
            co_group(check.relation, &mut entries, exclusions, project_key)
        }
        ExecutionMode::Partitioned(partitions) => {
            let partitions = partitions.max(1);
            let mut buckets: Vec<Vec<(&KeyRow, Side)>> = vec![Vec::new(); partitions];
            for entry in all {
                buckets[partition_of(&entry.0.tuple, partitions)].push(entry);
            }
            let partial: Vec<RelationErrors> = buckets
                .into_par_iter()
                .map(|mut bucket| co_group(check.relation, &mut bucket, exclusions, project_key))
                .collect();
            let mut merged = RelationErrors::default();
            for mut part in partial {
                merged.local.append(&mut part.local);
                merged.referenced.append(&mut part.referenced);
            }
            merged
        }
    };
    sort_errors(&mut result.local);
    sort_errors(&mut result.referenced);
    debug!(
        local_file = check.local_file,
        referenced_file = check.referenced_file,
        orphans = result.local.len(),
        unreferenced = result.referenced.len(),
        "relation checked"
    );
    result
}

/// Primary-key uniqueness within one file: every occurrence of a tuple
/// after the first is one error.
pub fn check_uniqueness(unique_fields: &[String], rows: &[KeyRow]) -> Vec<ValidationError> {
    let mut sorted: Vec<&KeyRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        a.tuple
            .cmp(&b.tuple)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    let mut errors = Vec::new();
    let mut idx = 0;
    while idx < sorted.len() {
        let tuple = &sorted[idx].tuple;
        let mut end = idx;
        while end < sorted.len() && &sorted[end].tuple == tuple {
            end += 1;
        }
        for row in &sorted[idx + 1..end] {
            errors.push(
                ValidationError::at_line(
                    ErrorKind::DuplicateKey,
                    unique_fields.to_vec(),
                    row.line_number,
                )
                .with_value(row.tuple.join("|")),
            );
        }
        idx = end;
    }
    sort_errors(&mut errors);
    errors
}
