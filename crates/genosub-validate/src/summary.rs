//! Field-value summary collection: per-field frequency or numeric
//! statistics gathered for reporting. Summaries never pass or fail a file.

use std::collections::BTreeMap;

use serde::Serialize;

use genosub_ingest::TsvReader;
use genosub_model::{SummaryType, is_missing_value};

use crate::context::CancelToken;
use crate::error::{Result, ValidateError};
use crate::internal::CANCEL_CHECK_INTERVAL;
use crate::plan::{ExternalStep, FilePlan};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SummaryValue {
    Frequency(BTreeMap<String, u64>),
    MinMaxAvg { min: f64, max: f64, avg: f64 },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub field: String,
    pub populated: u64,
    pub missing: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SummaryValue>,
}

struct Accumulator {
    summary: SummaryType,
    populated: u64,
    missing: u64,
    frequencies: BTreeMap<String, u64>,
    min: f64,
    max: f64,
    sum: f64,
    numeric_count: u64,
}

impl Accumulator {
    fn new(summary: SummaryType) -> Self {
        Self {
            summary,
            populated: 0,
            missing: 0,
            frequencies: BTreeMap::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            numeric_count: 0,
        }
    }

    fn observe(&mut self, raw: &str) {
        if is_missing_value(raw, false) {
            self.missing += 1;
            return;
        }
        self.populated += 1;
        match self.summary {
            SummaryType::Frequency => {
                *self.frequencies.entry(raw.to_string()).or_default() += 1;
            }
            SummaryType::Average | SummaryType::MinMax => {
                if let Ok(value) = raw.parse::<f64>() {
                    self.numeric_count += 1;
                    self.sum += value;
                    self.min = self.min.min(value);
                    self.max = self.max.max(value);
                }
            }
        }
    }

    fn finish(self, field: String) -> FieldSummary {
        let value = match self.summary {
            SummaryType::Frequency => Some(SummaryValue::Frequency(self.frequencies)),
            SummaryType::Average | SummaryType::MinMax => {
                if self.numeric_count == 0 {
                    None
                } else {
                    Some(SummaryValue::MinMaxAvg {
                        min: self.min,
                        max: self.max,
                        avg: self.sum / self.numeric_count as f64,
                    })
                }
            }
        };
        FieldSummary {
            field,
            populated: self.populated,
            missing: self.missing,
            value,
        }
    }
}

/// Stream the file once and collect every summary step of the plan.
pub fn collect_summaries(
    plan: &FilePlan,
    reader: &mut TsvReader,
    cancel: &CancelToken,
) -> Result<Vec<FieldSummary>> {
    let fields: Vec<(String, SummaryType)> = plan
        .external
        .iter()
        .filter_map(|step| match step {
            ExternalStep::Summary { field, summary } => Some((field.clone(), *summary)),
            _ => None,
        })
        .collect();
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    let header = reader
        .read_header()?
        .ok_or_else(|| ValidateError::Executor("summary flow on empty file".to_string()))?
        .clone();
    let columns: Vec<(String, Option<usize>, SummaryType)> = fields
        .into_iter()
        .map(|(field, summary)| {
            let idx = header.fields.iter().position(|cell| cell.trim() == field);
            (field, idx, summary)
        })
        .collect();

    let mut accumulators: Vec<Accumulator> = columns
        .iter()
        .map(|(_, _, summary)| Accumulator::new(*summary))
        .collect();

    let mut rows = 0u64;
    while let Some(row) = reader.next_row()? {
        rows += 1;
        if rows % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }
        for ((_, idx, _), accumulator) in columns.iter().zip(&mut accumulators) {
            let raw = idx.map(|idx| row.field(idx).trim()).unwrap_or("");
            accumulator.observe(raw);
        }
    }

    Ok(columns
        .into_iter()
        .zip(accumulators)
        .map(|((field, _, _), accumulator)| accumulator.finish(field))
        .collect())
}
