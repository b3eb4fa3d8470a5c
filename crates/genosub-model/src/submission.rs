//! Submission state machine and the report merge contract.
//!
//! One `Submission` exists per (release, project). Validation moves it
//! through `QUEUED → VALIDATING → {VALID, INVALID, ERROR}`; re-validation of
//! a subset of data types merges new results without discarding findings for
//! untouched types. `VALID → SIGNED_OFF` is a separate, user-triggered
//! transition gated on an external authorization collaborator.

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;
use crate::error::ModelError;
use crate::report::{Report, ReportState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    NotValidated,
    Queued,
    Validating,
    Valid,
    Invalid,
    Error,
    SignedOff,
}

/// How a validation run ended, from the executing collaborator's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    /// All requested stages ran to completion.
    Completed,
    /// Cancelled cooperatively between row batches.
    Aborted,
    /// Infrastructure failure (unreadable file, substrate failure).
    Failed,
}

/// Authorization collaborator consulted before signoff. Not part of this
/// core; the web layer supplies an implementation.
pub trait SignoffAuthority {
    fn may_sign_off(&self, project_key: &str) -> bool;
}

/// One project's data for one release.
///
/// Superseded, never mutated, when a new release opens: the next release
/// creates a fresh `Submission` for the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub project_key: String,
    pub release_name: String,
    pub state: SubmissionState,
    pub report: Report,
}

impl Submission {
    pub fn new(project_key: impl Into<String>, release_name: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            release_name: release_name.into(),
            state: SubmissionState::NotValidated,
            report: Report::new(),
        }
    }

    /// Enqueue for validation. Allowed from any settled state; a queued or
    /// in-flight submission cannot be queued again.
    pub fn queue(&mut self) -> Result<(), ModelError> {
        match self.state {
            SubmissionState::NotValidated
            | SubmissionState::Valid
            | SubmissionState::Invalid
            | SubmissionState::Error => {
                self.state = SubmissionState::Queued;
                Ok(())
            }
            from => Err(ModelError::InvalidTransition {
                from,
                to: SubmissionState::Queued,
            }),
        }
    }

    pub fn start_validation(&mut self) -> Result<(), ModelError> {
        match self.state {
            SubmissionState::Queued => {
                self.state = SubmissionState::Validating;
                Ok(())
            }
            from => Err(ModelError::InvalidTransition {
                from,
                to: SubmissionState::Validating,
            }),
        }
    }

    /// Merge a finished run's report and settle the submission state.
    ///
    /// Only entries for `validated_data_types` are replaced by entries from
    /// `new_report`; every other entry is carried over unchanged from the
    /// previous report. On an `Aborted` or `Failed` outcome none of the
    /// in-flight data types may end VALID — a VALID entry among the
    /// requested types is demoted to ERROR, and the submission state becomes
    /// ERROR regardless of the merged tree.
    pub fn finish_validation(
        &mut self,
        validated_data_types: &[DataType],
        outcome: ValidationOutcome,
        new_report: &Report,
    ) -> Result<(), ModelError> {
        if self.state != SubmissionState::Validating {
            return Err(ModelError::InvalidTransition {
                from: self.state,
                to: SubmissionState::Valid,
            });
        }
        let mut merged = self.report.merged(new_report, validated_data_types);
        if outcome != ValidationOutcome::Completed {
            for entry in &mut merged.data_type_reports {
                if validated_data_types.contains(&entry.data_type)
                    && entry.data_type_state == ReportState::Valid
                {
                    entry.data_type_state = ReportState::Error;
                }
            }
            self.report = merged;
            self.state = SubmissionState::Error;
            return Ok(());
        }
        self.state = match merged.overall_state() {
            ReportState::Error => SubmissionState::Error,
            ReportState::Invalid => SubmissionState::Invalid,
            ReportState::Valid => SubmissionState::Valid,
            ReportState::NotValidated => SubmissionState::NotValidated,
        };
        self.report = merged;
        Ok(())
    }

    /// User-triggered signoff; only a VALID submission qualifies, and the
    /// authorization collaborator must agree.
    pub fn sign_off(&mut self, authority: &dyn SignoffAuthority) -> Result<(), ModelError> {
        if self.state != SubmissionState::Valid {
            return Err(ModelError::InvalidTransition {
                from: self.state,
                to: SubmissionState::SignedOff,
            });
        }
        if !authority.may_sign_off(&self.project_key) {
            return Err(ModelError::SignoffDenied {
                project_key: self.project_key.clone(),
            });
        }
        self.state = SubmissionState::SignedOff;
        Ok(())
    }
}
