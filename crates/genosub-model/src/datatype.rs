//! Logical data-type grouping of file schemas.
//!
//! The clinical core (donor, specimen, sample) forms one data type; every
//! experimental feature type (ssm, cnsm, meth, exp, ...) forms its own,
//! derived from the schema-name prefix: `ssm_m` and `ssm_p` both belong to
//! the `ssm` data type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File schema names that make up the clinical core.
const CLINICAL_CORE_SCHEMAS: &[&str] = &["donor", "specimen", "sample"];

/// Identifier of the clinical core data type.
pub const CLINICAL_CORE: &str = "clinical";

/// A logical data type: the unit of (re-)validation and report merging.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

impl DataType {
    pub fn clinical_core() -> Self {
        DataType(CLINICAL_CORE.to_string())
    }

    /// The data type a file schema belongs to.
    pub fn of_file_schema(schema_name: &str) -> Self {
        if CLINICAL_CORE_SCHEMAS.contains(&schema_name) {
            return Self::clinical_core();
        }
        let prefix = schema_name
            .split_once('_')
            .map_or(schema_name, |(prefix, _)| prefix);
        DataType(prefix.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_clinical_core(&self) -> bool {
        self.0 == CLINICAL_CORE
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        DataType(value.to_string())
    }
}
