//! Feature encoding.
//!
//! [`FeatureEncoder`] is fitted once on training records and then frozen into
//! the artifact. Encoding is pure: the same record and encoder always produce
//! a bit-identical [`FeatureVector`].

mod encoder;
mod layout;
mod scaler;
mod vocab;

pub use encoder::{
    CategoricalState, Encoded, EncoderError, EncoderState, FeatureEncoder, FeatureVector,
    NumericState, UnseenCategoryWarning,
};
pub use layout::{Column, ColumnKind, FeatureLayout, FieldGroup, UNSEEN_CATEGORY, compute_layout_hash};
pub use scaler::{ExtrapolationPolicy, NumericScaler};
pub use vocab::{CategoryCode, CategoryCounts, Vocabulary};
