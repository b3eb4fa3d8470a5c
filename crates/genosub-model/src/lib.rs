pub mod datatype;
pub mod dictionary;
pub mod error;
pub mod report;
pub mod submission;

pub use datatype::{CLINICAL_CORE, DataType};
pub use dictionary::{
    Codelist, Dictionary, DictionaryState, Field, FileSchema, FileSchemaRole, MISSING_VALUE_CODES,
    Relation, Restriction, SummaryType, Term, ValueType, is_missing_value,
};
pub use error::{ModelError, Result};
pub use report::{
    DataTypeReport, ErrorKind, FileReport, FileTypeReport, Report, ReportState, ValidationError,
};
pub use submission::{SignoffAuthority, Submission, SubmissionState, ValidationOutcome};
