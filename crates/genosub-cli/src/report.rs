//! Report payload written for downstream consumers (persistence, portal).

use serde::Serialize;

use genosub_model::Report;

pub const REPORT_SCHEMA: &str = "genosub.validation-report";
pub const REPORT_SCHEMA_VERSION: &str = "1";

/// Envelope wrapped around the report JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEnvelope {
    pub schema: &'static str,
    pub schema_version: &'static str,
    /// RFC 3339 timestamp of report generation.
    pub generated_at: String,
    pub project_key: String,
    pub release: String,
    pub report: Report,
}

impl ReportEnvelope {
    pub fn new(project_key: impl Into<String>, release: impl Into<String>, report: Report) -> Self {
        Self {
            schema: REPORT_SCHEMA,
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            project_key: project_key.into(),
            release: release.into(),
            report,
        }
    }
}
