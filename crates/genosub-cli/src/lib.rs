//! Shared pieces of the submission-validator CLI.

pub mod logging;
pub mod report;
pub mod summary;
pub mod types;
