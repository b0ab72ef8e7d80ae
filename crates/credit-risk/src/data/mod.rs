//! Applicant records, labeled datasets and splits.

pub mod dataset;
pub mod record;
pub mod schema;
pub mod split;

pub use dataset::{DatasetError, Label, LabeledDataset};
pub use record::{ApplicantRecord, RawValue, ValidationError};
pub use schema::{
    CREDIT_FIELDS, FieldKind, FieldSpec, LABEL_FIELD, LAYOUT_VERSION, N_FIELDS, categorical_fields,
    field, field_index, numeric_fields,
};
pub use split::{SplitIndices, stratified_k_fold, stratified_split};
