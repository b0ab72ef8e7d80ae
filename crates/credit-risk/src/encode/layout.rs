//! Encoded feature layout.
//!
//! The column order is fully determined by the field table and the learned
//! vocabularies:
//!
//! 1. one standardized column per numeric field, in field-table order;
//! 2. per categorical field, in field-table order, one one-hot column per
//!    known category (sorted) followed by a `<field>=__unseen__` column.
//!
//! The layout hash is a CRC32 over [`LAYOUT_VERSION`] and the column names,
//! so two encoders agree on a hash only if their vectors have the same column
//! order. Scaling parameters are not covered; encoders fitted on different
//! data may share a hash and still produce different values.

use std::ops::Range;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::data::schema::{FieldKind, LAYOUT_VERSION};

/// Suffix of the reserved unseen-category column.
pub const UNSEEN_CATEGORY: &str = "__unseen__";

/// What a column encodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Category { value: String },
    Unseen,
}

/// One encoded column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field: String,
    pub kind: ColumnKind,
}

/// Contiguous columns produced by one input field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldGroup {
    pub field: &'static str,
    pub kind: FieldKind,
    pub columns: Range<usize>,
}

/// Ordered encoded columns plus their grouping by input field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureLayout {
    columns: Vec<Column>,
    groups: Vec<FieldGroup>,
    hash: u32,
}

impl FeatureLayout {
    pub(crate) fn new(columns: Vec<Column>, groups: Vec<FieldGroup>) -> Self {
        let hash = compute_layout_hash(columns.iter().map(|c| c.name.as_str()));
        Self { columns, groups, hash }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in encoding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Field groups in encoding order.
    #[inline]
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// Group that owns the given column.
    pub fn group_of(&self, column: usize) -> Option<&FieldGroup> {
        self.groups.iter().find(|g| g.columns.contains(&column))
    }
}

/// Column name for a numeric field.
pub(crate) fn numeric_column_name(field: &str) -> String {
    field.to_string()
}

/// Column name for a categorical value.
pub(crate) fn category_column_name(field: &str, value: &str) -> String {
    format!("{field}={value}")
}

/// CRC32 of the layout version and column names.
pub fn compute_layout_hash<'a>(names: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[LAYOUT_VERSION]);
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}
