//! Submission file discovery: matching already-listed file names against the
//! dictionary's file-schema patterns.
//!
//! Path resolution belongs to an external collaborator; this module only
//! matches names it is handed. `list_submission_files` is a thin
//! directory-listing convenience for the CLI.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use genosub_model::{Dictionary, ModelError};

use crate::error::{IngestError, Result};

/// Outcome of matching a file listing against a dictionary.
#[derive(Debug, Default)]
pub struct SubmissionFiles {
    /// Schema name → matching file names, sorted. A schema with no match is
    /// absent (unsubmitted optional data types are not an error).
    pub by_schema: BTreeMap<String, Vec<String>>,
    /// Listed names no schema pattern matched.
    pub unmatched: Vec<String>,
    /// Schemas whose pattern failed to compile; these become per-schema
    /// planning errors, not a failed run.
    pub pattern_errors: Vec<(String, ModelError)>,
}

impl SubmissionFiles {
    pub fn files_for(&self, schema_name: &str) -> &[String] {
        self.by_schema
            .get(schema_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Schemas with more than one matching physical file. The collision
    /// checker turns these into file-level errors.
    pub fn collisions(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.by_schema
            .iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(schema, files)| (schema.as_str(), files.as_slice()))
    }
}

/// Match the given file names against every schema of the dictionary.
///
/// `SUBMISSION` and `SYSTEM` roles both participate; the plan builder
/// decides what each role is used for.
pub fn match_file_schemas(dictionary: &Dictionary, file_names: &[String]) -> SubmissionFiles {
    let mut result = SubmissionFiles::default();
    let mut matched = vec![false; file_names.len()];

    for schema in &dictionary.file_schemas {
        let pattern = match schema.compiled_pattern() {
            Ok(pattern) => pattern,
            Err(error) => {
                result.pattern_errors.push((schema.name.clone(), error));
                continue;
            }
        };
        let mut files: Vec<String> = Vec::new();
        for (idx, name) in file_names.iter().enumerate() {
            if pattern.is_match(name) {
                files.push(name.clone());
                matched[idx] = true;
            }
        }
        if files.is_empty() {
            debug!(schema = %schema.name, "no file submitted for schema");
            continue;
        }
        files.sort();
        result.by_schema.insert(schema.name.clone(), files);
    }

    result.unmatched = file_names
        .iter()
        .zip(&matched)
        .filter(|(_, matched)| !**matched)
        .map(|(name, _)| name.clone())
        .collect();
    result.unmatched.sort();
    result
}

/// List plain file names in a submission directory, sorted. Hidden files and
/// subdirectories are skipped.
pub fn list_submission_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
