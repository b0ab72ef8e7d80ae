//! Labeled training data.
//!
//! Accepted inputs are a JSON array of objects or JSON Lines (one object per
//! line, blank lines skipped). Every object holds the applicant fields plus a
//! [`LABEL_FIELD`] entry: `"good"` / `"bad"` or `0` / `1`, where `bad` (1) is
//! the default outcome.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{ApplicantRecord, ValidationError};
use super::schema::LABEL_FIELD;

// =============================================================================
// Label
// =============================================================================

/// Binary credit outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Good,
    Bad,
}

impl Label {
    /// Regression target used by the classifier: `bad` is the positive class.
    #[inline]
    pub fn target(self) -> f32 {
        match self {
            Label::Good => 0.0,
            Label::Bad => 1.0,
        }
    }

    #[inline]
    pub fn is_bad(self) -> bool {
        matches!(self, Label::Bad)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Good => "good",
            Label::Bad => "bad",
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "good" | "0" => Some(Label::Good),
                "bad" | "1" => Some(Label::Bad),
                _ => None,
            },
            Value::Number(n) => match n.as_f64() {
                Some(v) if v == 0.0 => Some(Label::Good),
                Some(v) if v == 1.0 => Some(Label::Bad),
                _ => None,
            },
            _ => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// DatasetError
// =============================================================================

/// Failure to load labeled data.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON at line {line}: {message}")]
    Json { line: usize, message: String },

    #[error("row {row} has no `{LABEL_FIELD}` label")]
    MissingLabel { row: usize },

    #[error("row {row} has invalid label {value}")]
    InvalidLabel { row: usize, value: String },

    #[error("row {row}: {source}")]
    InvalidRecord {
        row: usize,
        #[source]
        source: ValidationError,
    },

    #[error("dataset is empty")]
    Empty,
}

// =============================================================================
// LabeledDataset
// =============================================================================

/// Records paired with their outcomes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabeledDataset {
    records: Vec<ApplicantRecord>,
    labels: Vec<Label>,
}

impl LabeledDataset {
    /// Create a dataset from parallel vectors.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ.
    pub fn new(records: Vec<ApplicantRecord>, labels: Vec<Label>) -> Self {
        assert_eq!(
            records.len(),
            labels.len(),
            "records and labels must have equal length"
        );
        Self { records, labels }
    }

    /// Load from a file. JSON arrays and JSON Lines are both accepted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse from text. A leading `[` selects the JSON array form.
    pub fn from_json_str(text: &str) -> Result<Self, DatasetError> {
        let trimmed = text.trim_start();
        let rows: Vec<(usize, Value)> = if trimmed.starts_with('[') {
            let values: Vec<Value> =
                serde_json::from_str(trimmed).map_err(|e| DatasetError::Json {
                    line: e.line(),
                    message: e.to_string(),
                })?;
            values.into_iter().enumerate().collect()
        } else {
            let mut rows = Vec::new();
            for (line_no, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value: Value = serde_json::from_str(line).map_err(|e| DatasetError::Json {
                    line: line_no + 1,
                    message: e.to_string(),
                })?;
                rows.push((rows.len(), value));
            }
            rows
        };

        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for (row, value) in rows {
            let (record, label) = parse_row(row, value)?;
            records.push(record);
            labels.push(label);
        }
        Ok(Self { records, labels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[ApplicantRecord] {
        &self.records
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Labels as classifier targets (`bad` = 1.0).
    pub fn targets(&self) -> Vec<f32> {
        self.labels.iter().map(|l| l.target()).collect()
    }

    /// Number of `bad` outcomes.
    pub fn n_bad(&self) -> usize {
        self.labels.iter().filter(|l| l.is_bad()).count()
    }

    /// Number of `good` outcomes.
    pub fn n_good(&self) -> usize {
        self.len() - self.n_bad()
    }

    /// Subset by row indices, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Iterate over `(record, label)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ApplicantRecord, Label)> {
        self.records.iter().zip(self.labels.iter().copied())
    }
}

fn parse_row(row: usize, value: Value) -> Result<(ApplicantRecord, Label), DatasetError> {
    let mut map: Map<String, Value> = match value {
        Value::Object(map) => map,
        other => {
            return Err(DatasetError::InvalidRecord {
                row,
                source: ValidationError::NotAnObject(match other {
                    Value::Array(_) => "array",
                    Value::String(_) => "string",
                    Value::Number(_) => "number",
                    Value::Bool(_) => "boolean",
                    _ => "null",
                }),
            });
        }
    };

    let raw_label = map
        .remove(LABEL_FIELD)
        .ok_or(DatasetError::MissingLabel { row })?;
    let label = Label::from_json(&raw_label).ok_or_else(|| DatasetError::InvalidLabel {
        row,
        value: raw_label.to_string(),
    })?;

    let record = ApplicantRecord::from_json_map(&map)
        .map_err(|source| DatasetError::InvalidRecord { row, source })?;
    Ok((record, label))
}
