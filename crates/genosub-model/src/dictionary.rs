//! Dictionary entities: the versioned schema a submission is validated against.
//!
//! A dictionary declares every submittable file type (`FileSchema`), the
//! ordered fields of each, the relations between file types, and the
//! codelists referenced by field restrictions. Dictionaries are immutable
//! once closed; evolving a published dictionary means cloning it under a new
//! version.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Declared value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Text,
    Integer,
    Decimal,
    Datetime,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "TEXT",
            ValueType::Integer => "INTEGER",
            ValueType::Decimal => "DECIMAL",
            ValueType::Datetime => "DATETIME",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TEXT" => Ok(ValueType::Text),
            "INTEGER" => Ok(ValueType::Integer),
            "DECIMAL" => Ok(ValueType::Decimal),
            "DATETIME" => Ok(ValueType::Datetime),
            _ => Err(format!("Unknown value type: {}", s)),
        }
    }
}

/// How a field is summarized for reporting (never pass/fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryType {
    /// Distinct-value frequency table.
    Frequency,
    /// Arithmetic mean of numeric values.
    Average,
    /// Minimum and maximum of numeric values.
    MinMax,
}

/// Whether a file schema is submitted by the project or produced by the
/// system itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileSchemaRole {
    Submission,
    System,
}

/// A single value restriction attached to a field.
///
/// Restrictions are validation rules only; they carry no biological
/// interpretation of the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Restriction {
    /// The field must carry a value on every row.
    Required {
        /// When set, the missing-value sentinel codes count as present.
        #[serde(default)]
        accept_missing_code: bool,
    },
    /// The value must match the given pattern in full.
    Regex { pattern: String },
    /// The value must be a code or term value of the named codelist.
    Codelist { name: String },
    /// The value must be one of the listed values (exact match).
    In { values: Vec<String> },
}

/// Sentinel codes a submitter may use for "value not available".
pub const MISSING_VALUE_CODES: &[&str] = &["-777", "-888", "-999"];

/// Returns true when the raw cell counts as missing: blank, or one of the
/// sentinel codes when those are accepted.
pub fn is_missing_value(raw: &str, accept_missing_code: bool) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return true;
    }
    !accept_missing_code && MISSING_VALUE_CODES.contains(&trimmed)
}

/// One field of a file schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub label: Option<String>,
    pub value_type: ValueType,
    #[serde(default)]
    pub summary_type: Option<SummaryType>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
}

impl Field {
    /// Returns the `Required` restriction if this field carries one.
    pub fn required(&self) -> Option<bool> {
        self.restrictions.iter().find_map(|r| match r {
            Restriction::Required {
                accept_missing_code,
            } => Some(*accept_missing_code),
            _ => None,
        })
    }
}

/// A declared key reference from one file schema to another.
///
/// `fields` in the owning schema must match `other_fields` in
/// `other_file_schema`. With `bidirectional` set, the inverse also holds:
/// every referenced key must be used by at least one local row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub fields: Vec<String>,
    pub other_file_schema: String,
    pub other_fields: Vec<String>,
    #[serde(default)]
    pub bidirectional: bool,
}

/// One file type within a dictionary: its name, filename pattern, ordered
/// fields, primary key, and outgoing relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSchema {
    pub name: String,
    pub label: Option<String>,
    pub role: FileSchemaRole,
    /// Regex matched against already-listed file names (not a glob; the
    /// model never touches the file system).
    pub pattern: String,
    /// Field names forming the primary key; must be unique within a file.
    #[serde(default)]
    pub unique_fields: Vec<String>,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl FileSchema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Index of each named field in declaration order, or an error naming the
    /// first field the schema does not declare.
    pub fn field_indices(&self, names: &[String]) -> Result<Vec<usize>, ModelError> {
        names
            .iter()
            .map(|name| {
                self.fields
                    .iter()
                    .position(|field| &field.name == name)
                    .ok_or_else(|| ModelError::UnknownField {
                        schema: self.name.clone(),
                        field: name.clone(),
                    })
            })
            .collect()
    }

    /// Compile the filename pattern. A malformed pattern is a planning
    /// error for this schema only, never a panic.
    pub fn compiled_pattern(&self) -> Result<Regex, ModelError> {
        Regex::new(&self.pattern).map_err(|source| ModelError::InvalidPattern {
            schema: self.name.clone(),
            source,
        })
    }

    /// Whether `file_name` matches this schema's filename pattern.
    pub fn matches(&self, file_name: &str) -> Result<bool, ModelError> {
        Ok(self.compiled_pattern()?.is_match(file_name))
    }
}

/// A named codelist: terms keyed by submission code with a display value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codelist {
    pub name: String,
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub code: String,
    pub value: String,
}

impl Codelist {
    /// A raw cell is a member when it equals a term code or term value.
    pub fn contains(&self, raw: &str) -> bool {
        self.terms
            .iter()
            .any(|term| term.code == raw || term.value == raw)
    }
}

/// Lifecycle of a dictionary version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DictionaryState {
    /// Still editable; not yet referenced by an open release.
    Opened,
    /// Published; immutable from here on.
    Closed,
}

/// A versioned, ordered collection of file schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionary {
    pub version: String,
    pub state: DictionaryState,
    #[serde(default)]
    pub codelists: Vec<Codelist>,
    pub file_schemas: Vec<FileSchema>,
}

impl Dictionary {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: DictionaryState::Opened,
            codelists: Vec::new(),
            file_schemas: Vec::new(),
        }
    }

    pub fn file_schema(&self, name: &str) -> Option<&FileSchema> {
        self.file_schemas.iter().find(|schema| schema.name == name)
    }

    pub fn codelist(&self, name: &str) -> Option<&Codelist> {
        self.codelists.iter().find(|list| list.name == name)
    }

    /// Publish this version. Closing twice is an error: a closed dictionary
    /// is immutable and must be cloned instead.
    pub fn close(&mut self) -> Result<(), ModelError> {
        if self.state == DictionaryState::Closed {
            return Err(ModelError::DictionaryClosed {
                version: self.version.clone(),
            });
        }
        self.state = DictionaryState::Closed;
        Ok(())
    }

    /// Clone this dictionary under a new, opened version. This is the only
    /// way to evolve a closed dictionary.
    pub fn clone_as(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: DictionaryState::Opened,
            codelists: self.codelists.clone(),
            file_schemas: self.file_schemas.clone(),
        }
    }
}
