//! Applicant field layout.
//!
//! [`CREDIT_FIELDS`] is the authoritative list of input fields and the order in
//! which the encoder reads them. Reordering, adding or removing a field
//! requires bumping [`LAYOUT_VERSION`]; artifacts record the layout version and
//! refuse to load under a different one.

use serde::{Deserialize, Serialize};

/// Version of the field table below.
pub const LAYOUT_VERSION: u8 = 1;

/// Name of the label column in training data.
pub const LABEL_FIELD: &str = "class";

/// How a raw field is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Finite number, standardized by the encoder.
    Numeric,
    /// Free-form string, one-hot encoded against a learned vocabulary.
    Categorical,
}

impl FieldKind {
    /// Returns true for numeric fields.
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Numeric)
    }

    /// Returns true for categorical fields.
    #[inline]
    pub fn is_categorical(self) -> bool {
        matches!(self, FieldKind::Categorical)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Numeric => f.write_str("numeric"),
            FieldKind::Categorical => f.write_str("categorical"),
        }
    }
}

/// A single entry of the field table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn numeric(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Numeric }
    }

    const fn categorical(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Categorical }
    }
}

/// Number of input fields.
pub const N_FIELDS: usize = 20;

/// Input fields in canonical order.
pub const CREDIT_FIELDS: [FieldSpec; N_FIELDS] = [
    FieldSpec::categorical("checking_status"),
    FieldSpec::numeric("duration"),
    FieldSpec::categorical("credit_history"),
    FieldSpec::categorical("purpose"),
    FieldSpec::numeric("credit_amount"),
    FieldSpec::categorical("savings_status"),
    FieldSpec::categorical("employment"),
    FieldSpec::numeric("installment_commitment"),
    FieldSpec::categorical("personal_status"),
    FieldSpec::categorical("other_parties"),
    FieldSpec::numeric("residence_since"),
    FieldSpec::categorical("property_magnitude"),
    FieldSpec::numeric("age"),
    FieldSpec::categorical("other_payment_plans"),
    FieldSpec::categorical("housing"),
    FieldSpec::numeric("existing_credits"),
    FieldSpec::categorical("job"),
    FieldSpec::numeric("num_dependents"),
    FieldSpec::categorical("own_telephone"),
    FieldSpec::categorical("foreign_worker"),
];

/// Look up a field by name.
pub fn field(name: &str) -> Option<&'static FieldSpec> {
    CREDIT_FIELDS.iter().find(|f| f.name == name)
}

/// Position of a field in [`CREDIT_FIELDS`].
pub fn field_index(name: &str) -> Option<usize> {
    CREDIT_FIELDS.iter().position(|f| f.name == name)
}

/// Numeric fields, in table order.
pub fn numeric_fields() -> impl Iterator<Item = &'static FieldSpec> {
    CREDIT_FIELDS.iter().filter(|f| f.kind.is_numeric())
}

/// Categorical fields, in table order.
pub fn categorical_fields() -> impl Iterator<Item = &'static FieldSpec> {
    CREDIT_FIELDS.iter().filter(|f| f.kind.is_categorical())
}
