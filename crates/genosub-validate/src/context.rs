//! Shared run context: the append-only report sink and the cooperative
//! cancellation token.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use genosub_model::{DataType, Report, ValidationError};

/// Append-only report sink shared by concurrent workers.
///
/// Appends are additive merges; two workers writing errors for different
/// files never overwrite each other, and appends for the same file report
/// are serialized by the lock.
#[derive(Debug, Default)]
pub struct ReportSink {
    report: Mutex<Report>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a file report node exists without attaching errors.
    pub fn touch(&self, data_type: &DataType, file_type: &str, file_name: &str) {
        let mut report = self.report.lock().expect("report sink lock");
        report.file_report_mut(data_type, file_type, file_name);
    }

    pub fn append(
        &self,
        data_type: &DataType,
        file_type: &str,
        file_name: &str,
        error: ValidationError,
    ) {
        let mut report = self.report.lock().expect("report sink lock");
        report
            .file_report_mut(data_type, file_type, file_name)
            .push_error(error);
    }

    pub fn append_all<I>(&self, data_type: &DataType, file_type: &str, file_name: &str, errors: I)
    where
        I: IntoIterator<Item = ValidationError>,
    {
        let mut report = self.report.lock().expect("report sink lock");
        let file = report.file_report_mut(data_type, file_type, file_name);
        for error in errors {
            file.push_error(error);
        }
    }

    /// Mark a file as fully checked; no errors so far means VALID.
    pub fn mark_checked(&self, data_type: &DataType, file_type: &str, file_name: &str) {
        let mut report = self.report.lock().expect("report sink lock");
        report
            .file_report_mut(data_type, file_type, file_name)
            .mark_checked();
    }

    /// Additively merge a whole report fragment produced by a work unit.
    pub fn absorb(&self, fragment: Report) {
        let mut report = self.report.lock().expect("report sink lock");
        report.absorb(fragment);
    }

    /// Finish: derive aggregate states bottom-up and yield the report.
    pub fn into_report(self) -> Report {
        let mut report = self.report.into_inner().expect("report sink lock");
        report.derive_states();
        report
    }
}

/// Cooperative cancellation flag, checked between row batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
