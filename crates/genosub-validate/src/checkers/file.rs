//! Whole-file structural checkers, in canonical chain order: header shape,
//! corruption, collision, cross-reference existence.

use genosub_model::{ErrorKind, ValidationError};

use super::{CheckVerdict, FileCheckContext, FileChecker};

/// The default file chain in its fixed canonical order. Deployments may
/// inject a different composition, but determinism requires a fixed default.
pub fn default_file_chain() -> Vec<Box<dyn FileChecker>> {
    vec![
        Box::new(HeaderChecker),
        Box::new(CorruptionChecker),
        Box::new(CollisionChecker),
        Box::new(ReferencedFileChecker),
    ]
}

/// Header presence and shape: the file's first line must declare exactly the
/// schema's fields, each once. Order is not constrained; the internal flow
/// addresses columns by name.
pub struct HeaderChecker;

impl FileChecker for HeaderChecker {
    fn name(&self) -> &'static str {
        "header"
    }

    fn check(&self, ctx: &mut FileCheckContext<'_>) -> CheckVerdict {
        let Some(header) = ctx.header else {
            ctx.emit(ValidationError::file_level(ErrorKind::EmptyFile));
            return CheckVerdict::Stop;
        };

        let mut verdict = CheckVerdict::Continue;
        let mut seen: Vec<&str> = Vec::with_capacity(header.fields.len());
        for cell in &header.fields {
            let name = cell.trim();
            if seen.contains(&name) {
                ctx.emit(
                    ValidationError::file_level(ErrorKind::InvalidHeader)
                        .with_value(format!("duplicate column: {name}")),
                );
                verdict = CheckVerdict::Stop;
            }
            seen.push(name);
        }

        let missing: Vec<String> = ctx
            .schema
            .fields
            .iter()
            .map(|field| field.name.clone())
            .filter(|name| !seen.contains(&name.as_str()))
            .collect();
        if !missing.is_empty() {
            ctx.emit(ValidationError {
                kind: ErrorKind::InvalidHeader,
                field_names: missing,
                line_number: Some(header.line_number),
                count: None,
                value: None,
            });
            verdict = CheckVerdict::Stop;
        }

        let unknown: Vec<String> = seen
            .iter()
            .filter(|name| ctx.schema.field(name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        if !unknown.is_empty() {
            ctx.emit(ValidationError {
                kind: ErrorKind::InvalidHeader,
                field_names: unknown,
                line_number: Some(header.line_number),
                count: None,
                value: None,
            });
            verdict = CheckVerdict::Stop;
        }
        verdict
    }
}

/// Corruption signals: unreadable compression containers, carriage-return
/// line termination, binary content.
pub struct CorruptionChecker;

impl FileChecker for CorruptionChecker {
    fn name(&self) -> &'static str {
        "corruption"
    }

    fn check(&self, ctx: &mut FileCheckContext<'_>) -> CheckVerdict {
        if let Some(compression) = ctx.sniff.compression {
            ctx.emit(
                ValidationError::file_level(ErrorKind::CorruptedFile)
                    .with_value(format!("unreadable {} container", compression.as_str())),
            );
            return CheckVerdict::Stop;
        }
        if ctx.sniff.nul_bytes {
            ctx.emit(
                ValidationError::file_level(ErrorKind::CorruptedFile)
                    .with_value("binary content"),
            );
            return CheckVerdict::Stop;
        }
        if ctx.sniff.carriage_returns {
            ctx.emit(
                ValidationError::file_level(ErrorKind::CorruptedFile)
                    .with_value("carriage-return line termination"),
            );
            return CheckVerdict::Stop;
        }
        CheckVerdict::Continue
    }
}

/// Two physical files matching the same schema pattern collide; neither file
/// proceeds to row-level checking.
pub struct CollisionChecker;

impl FileChecker for CollisionChecker {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn check(&self, ctx: &mut FileCheckContext<'_>) -> CheckVerdict {
        let matches = ctx.files.files_for(&ctx.schema.name);
        if matches.len() <= 1 {
            return CheckVerdict::Continue;
        }
        let others: Vec<&str> = matches
            .iter()
            .filter(|name| name.as_str() != ctx.file_name)
            .map(String::as_str)
            .collect();
        ctx.emit(
            ValidationError::file_level(ErrorKind::FileCollision)
                .with_value(format!("also matches: {}", others.join(", "))),
        );
        CheckVerdict::Stop
    }
}

/// Every relation of the schema must point at a schema with a matching file
/// present in the submission.
pub struct ReferencedFileChecker;

impl FileChecker for ReferencedFileChecker {
    fn name(&self) -> &'static str {
        "referenced-file"
    }

    fn check(&self, ctx: &mut FileCheckContext<'_>) -> CheckVerdict {
        let mut verdict = CheckVerdict::Continue;
        for relation in &ctx.schema.relations {
            if ctx.files.files_for(&relation.other_file_schema).is_empty() {
                ctx.emit(
                    ValidationError {
                        kind: ErrorKind::MissingReferencedFile,
                        field_names: relation.fields.clone(),
                        line_number: None,
                        count: None,
                        value: None,
                    }
                    .with_value(relation.other_file_schema.clone()),
                );
                verdict = CheckVerdict::Stop;
            }
        }
        verdict
    }
}
