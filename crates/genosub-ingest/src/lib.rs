pub mod discovery;
pub mod error;
pub mod tsv;

pub use discovery::{SubmissionFiles, list_submission_files, match_file_schemas};
pub use error::{IngestError, Result};
pub use tsv::{Compression, FileSniff, Row, TsvReader, sniff_bytes, sniff_file};
