//! Record → feature vector encoding.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::record::{ApplicantRecord, ValidationError};
use crate::data::schema::{FieldKind, categorical_fields, numeric_fields};

use super::layout::{
    Column, ColumnKind, FeatureLayout, FieldGroup, UNSEEN_CATEGORY, category_column_name,
    numeric_column_name,
};
use super::scaler::{ExtrapolationPolicy, NumericScaler};
use super::vocab::{CategoryCode, CategoryCounts, Vocabulary};

// =============================================================================
// State
// =============================================================================

/// Learned parameters of one numeric field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericState {
    pub field: String,
    pub scaler: NumericScaler,
}

/// Learned parameters of one categorical field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoricalState {
    pub field: String,
    pub vocabulary: Vocabulary,
    /// Most frequent training value, used to impute missing training values.
    pub mode: String,
}

/// Everything the encoder learns at fit time.
///
/// Fields are stored in field-table order and checked against the table when
/// an encoder is rebuilt from state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    pub numeric: Vec<NumericState>,
    pub categorical: Vec<CategoricalState>,
    pub min_category_count: usize,
}

// =============================================================================
// Errors and outcomes
// =============================================================================

/// Failure to fit an encoder or rebuild one from state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncoderError {
    #[error("cannot fit encoder on zero records")]
    EmptyInput,

    #[error("field `{field}` has no observed values")]
    NoObservedValues { field: String },

    #[error(transparent)]
    InvalidValue(#[from] ValidationError),

    #[error("encoder state does not match the field table: {0}")]
    StateMismatch(String),
}

/// A categorical value that was routed to the unseen bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnseenCategoryWarning {
    pub field: String,
    pub value: String,
}

impl std::fmt::Display for UnseenCategoryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unseen category {:?} for field `{}`, encoded as {}",
            self.value, self.field, UNSEEN_CATEGORY
        )
    }
}

/// Encoded features, tied to the layout that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
    layout_hash: u32,
}

impl FeatureVector {
    pub(crate) fn new(values: Vec<f32>, layout_hash: u32) -> Self {
        Self { values, layout_hash }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

/// Result of encoding one record for inference.
#[derive(Clone, Debug, PartialEq)]
pub struct Encoded {
    pub vector: FeatureVector,
    /// Categorical values that fell into the unseen bucket.
    pub unseen: Vec<UnseenCategoryWarning>,
    /// Numeric fields whose raw value lay outside the training range.
    pub extrapolated: Vec<&'static str>,
}

// =============================================================================
// FeatureEncoder
// =============================================================================

/// Deterministic encoder from [`ApplicantRecord`] to [`FeatureVector`].
///
/// # Example
///
/// ```
/// use credit_risk::encode::FeatureEncoder;
/// use credit_risk::testing::{sample_record, synthetic_credit_dataset};
///
/// let data = synthetic_credit_dataset(200, 1);
/// let encoder = FeatureEncoder::fit(data.records(), 1).unwrap();
/// let encoded = encoder.encode(&sample_record()).unwrap();
/// assert_eq!(encoded.vector.len(), encoder.n_features());
/// ```
#[derive(Clone, Debug)]
pub struct FeatureEncoder {
    state: EncoderState,
    layout: FeatureLayout,
    /// Start column of each categorical field.
    offsets: Vec<usize>,
}

impl FeatureEncoder {
    /// Learn vocabularies and scaling from training records.
    ///
    /// Missing values are skipped when computing statistics. Categories seen
    /// fewer than `min_category_count` times are left out of the vocabulary
    /// and therefore share the unseen column.
    pub fn fit(records: &[ApplicantRecord], min_category_count: usize) -> Result<Self, EncoderError> {
        if records.is_empty() {
            return Err(EncoderError::EmptyInput);
        }

        let mut numeric = Vec::new();
        for spec in numeric_fields() {
            let mut values = Vec::with_capacity(records.len());
            for record in records {
                if let Some(v) = record.numeric(spec.name)? {
                    values.push(v);
                }
            }
            let scaler = NumericScaler::fit(&values).ok_or_else(|| EncoderError::NoObservedValues {
                field: spec.name.to_string(),
            })?;
            numeric.push(NumericState {
                field: spec.name.to_string(),
                scaler,
            });
        }

        let mut categorical = Vec::new();
        for spec in categorical_fields() {
            let mut counts = CategoryCounts::new();
            for record in records {
                if let Some(v) = record.categorical(spec.name)? {
                    counts.add(&v);
                }
            }
            let mode = counts
                .mode()
                .ok_or_else(|| EncoderError::NoObservedValues {
                    field: spec.name.to_string(),
                })?
                .to_string();
            categorical.push(CategoricalState {
                field: spec.name.to_string(),
                vocabulary: counts.into_vocabulary(min_category_count),
                mode,
            });
        }

        let encoder = Self::from_state(EncoderState {
            numeric,
            categorical,
            min_category_count,
        })?;
        debug!(
            n_records = records.len(),
            n_features = encoder.n_features(),
            layout_hash = %format!("{:08x}", encoder.layout_hash()),
            "fitted feature encoder"
        );
        Ok(encoder)
    }

    /// Rebuild an encoder from persisted state, validating it against the
    /// field table.
    pub fn from_state(state: EncoderState) -> Result<Self, EncoderError> {
        let expected_numeric: Vec<&str> = numeric_fields().map(|f| f.name).collect();
        let got_numeric: Vec<&str> = state.numeric.iter().map(|n| n.field.as_str()).collect();
        if expected_numeric != got_numeric {
            return Err(EncoderError::StateMismatch(format!(
                "numeric fields {got_numeric:?}, expected {expected_numeric:?}"
            )));
        }
        let expected_cat: Vec<&str> = categorical_fields().map(|f| f.name).collect();
        let got_cat: Vec<&str> = state.categorical.iter().map(|c| c.field.as_str()).collect();
        if expected_cat != got_cat {
            return Err(EncoderError::StateMismatch(format!(
                "categorical fields {got_cat:?}, expected {expected_cat:?}"
            )));
        }
        for n in &state.numeric {
            if !n.scaler.is_valid() {
                return Err(EncoderError::StateMismatch(format!(
                    "invalid scaling parameters for `{}`",
                    n.field
                )));
            }
        }
        for c in &state.categorical {
            if !c.vocabulary.is_sorted() {
                return Err(EncoderError::StateMismatch(format!(
                    "vocabulary of `{}` is not sorted",
                    c.field
                )));
            }
        }

        let (layout, offsets) = build_layout(&state);
        Ok(Self {
            state,
            layout,
            offsets,
        })
    }

    #[inline]
    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    #[inline]
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.layout.n_features()
    }

    #[inline]
    pub fn layout_hash(&self) -> u32 {
        self.layout.hash()
    }

    /// Encode a complete record, extrapolating out-of-range numerics.
    pub fn encode(&self, record: &ApplicantRecord) -> Result<Encoded, ValidationError> {
        self.encode_with(record, ExtrapolationPolicy::Extrapolate)
    }

    /// Encode a complete record.
    ///
    /// Every field must be present. Unknown categories do not fail: they are
    /// encoded in the unseen column, logged and reported on the outcome.
    pub fn encode_with(
        &self,
        record: &ApplicantRecord,
        policy: ExtrapolationPolicy,
    ) -> Result<Encoded, ValidationError> {
        let mut values = vec![0.0f32; self.n_features()];
        let mut unseen = Vec::new();
        let mut extrapolated = Vec::new();

        for (col, (spec, state)) in numeric_fields().zip(&self.state.numeric).enumerate() {
            let x = record.numeric(spec.name)?.ok_or_else(|| missing(spec.name))?;
            if state.scaler.is_outside(x) {
                extrapolated.push(spec.name);
            }
            values[col] = state.scaler.transform(x, policy);
        }

        for ((spec, state), &offset) in categorical_fields()
            .zip(&self.state.categorical)
            .zip(&self.offsets)
        {
            let value = record.categorical(spec.name)?.ok_or_else(|| missing(spec.name))?;
            let code = state.vocabulary.lookup(&value);
            if code.is_unseen() {
                let warning = UnseenCategoryWarning {
                    field: spec.name.to_string(),
                    value: value.into_owned(),
                };
                warn!(field = %warning.field, value = %warning.value, "{warning}");
                unseen.push(warning);
            }
            values[column_of(offset, &state.vocabulary, code)] = 1.0;
        }

        Ok(Encoded {
            vector: FeatureVector::new(values, self.layout_hash()),
            unseen,
            extrapolated,
        })
    }

    /// Encode a training record, imputing missing numerics with the training
    /// median and missing categoricals with the training mode.
    pub fn encode_imputed(&self, record: &ApplicantRecord) -> Result<FeatureVector, ValidationError> {
        let mut values = vec![0.0f32; self.n_features()];
        self.fill_imputed(record, &mut values)?;
        Ok(FeatureVector::new(values, self.layout_hash()))
    }

    fn fill_imputed(&self, record: &ApplicantRecord, out: &mut [f32]) -> Result<(), ValidationError> {
        for (col, (spec, state)) in numeric_fields().zip(&self.state.numeric).enumerate() {
            let x = record.numeric(spec.name)?.unwrap_or(state.scaler.median);
            out[col] = state.scaler.transform(x, ExtrapolationPolicy::Extrapolate);
        }
        for ((spec, state), &offset) in categorical_fields()
            .zip(&self.state.categorical)
            .zip(&self.offsets)
        {
            let code = match record.categorical(spec.name)? {
                Some(value) => state.vocabulary.lookup(&value),
                None => state.vocabulary.lookup(&state.mode),
            };
            out[column_of(offset, &state.vocabulary, code)] = 1.0;
        }
        Ok(())
    }

    /// Encode many training records into a feature-major matrix
    /// `[n_features, n_samples]`, imputing missing values.
    pub fn encode_matrix(&self, records: &[ApplicantRecord]) -> Result<Array2<f32>, ValidationError> {
        let rows: Vec<FeatureVector> = records
            .par_iter()
            .map(|r| self.encode_imputed(r))
            .collect::<Result<_, _>>()?;

        let mut matrix = Array2::<f32>::zeros((self.n_features(), records.len()));
        for (sample, row) in rows.iter().enumerate() {
            for (feature, &v) in row.as_slice().iter().enumerate() {
                matrix[[feature, sample]] = v;
            }
        }
        Ok(matrix)
    }

    /// Kind of the field that owns a column.
    pub fn column_kind(&self, column: usize) -> Option<FieldKind> {
        self.layout.group_of(column).map(|g| g.kind)
    }
}

#[inline]
fn column_of(offset: usize, vocabulary: &Vocabulary, code: CategoryCode) -> usize {
    match code {
        CategoryCode::Known(c) => offset + c as usize,
        CategoryCode::Unseen => offset + vocabulary.len(),
    }
}

fn missing(field: &str) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
}

fn build_layout(state: &EncoderState) -> (FeatureLayout, Vec<usize>) {
    let mut columns = Vec::new();
    let mut groups = Vec::new();
    let mut offsets = Vec::with_capacity(state.categorical.len());

    for spec in numeric_fields() {
        let start = columns.len();
        columns.push(Column {
            name: numeric_column_name(spec.name),
            field: spec.name.to_string(),
            kind: ColumnKind::Numeric,
        });
        groups.push(FieldGroup {
            field: spec.name,
            kind: FieldKind::Numeric,
            columns: start..columns.len(),
        });
    }

    for (spec, cat) in categorical_fields().zip(&state.categorical) {
        let start = columns.len();
        offsets.push(start);
        for value in cat.vocabulary.categories() {
            columns.push(Column {
                name: category_column_name(spec.name, value),
                field: spec.name.to_string(),
                kind: ColumnKind::Category {
                    value: value.clone(),
                },
            });
        }
        columns.push(Column {
            name: category_column_name(spec.name, UNSEEN_CATEGORY),
            field: spec.name.to_string(),
            kind: ColumnKind::Unseen,
        });
        groups.push(FieldGroup {
            field: spec.name,
            kind: FieldKind::Categorical,
            columns: start..columns.len(),
        });
    }

    (FeatureLayout::new(columns, groups), offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::N_FIELDS;
    use crate::testing::{sample_record, synthetic_credit_dataset};

    fn fitted() -> FeatureEncoder {
        let data = synthetic_credit_dataset(300, 3);
        FeatureEncoder::fit(data.records(), 1).unwrap()
    }

    #[test]
    fn layout_starts_with_numeric_columns() {
        let encoder = fitted();
        let names: Vec<&str> = encoder.layout().names().take(7).collect();
        assert_eq!(
            names,
            [
                "duration",
                "credit_amount",
                "installment_commitment",
                "residence_since",
                "age",
                "existing_credits",
                "num_dependents"
            ]
        );
        assert_eq!(encoder.layout().groups().len(), N_FIELDS);
    }

    #[test]
    fn each_categorical_group_ends_with_unseen() {
        let encoder = fitted();
        for group in encoder.layout().groups() {
            if group.kind.is_categorical() {
                let last = &encoder.layout().columns()[group.columns.end - 1];
                assert_eq!(last.kind, ColumnKind::Unseen);
                assert_eq!(last.name, format!("{}=__unseen__", group.field));
            }
        }
    }

    #[test]
    fn one_hot_per_categorical_group() {
        let encoder = fitted();
        let v = encoder.encode(&sample_record()).unwrap().vector;
        for group in encoder.layout().groups() {
            if group.kind.is_categorical() {
                let hot: f32 = v.as_slice()[group.columns.clone()].iter().sum();
                assert_eq!(hot, 1.0, "field {}", group.field);
            }
        }
    }

    #[test]
    fn unseen_category_uses_reserved_column() {
        let encoder = fitted();
        let record = sample_record().with("purpose", "space travel");
        let encoded = encoder.encode(&record).unwrap();
        assert_eq!(encoded.unseen.len(), 1);
        assert_eq!(encoded.unseen[0].field, "purpose");
        let idx = encoder
            .layout()
            .names()
            .position(|n| n == "purpose=__unseen__")
            .unwrap();
        assert_eq!(encoded.vector.as_slice()[idx], 1.0);
    }

    #[test]
    fn inference_requires_all_fields() {
        let encoder = fitted();
        let err = encoder.encode(&sample_record().without("housing")).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "housing".into() });
    }

    #[test]
    fn training_imputes_missing_values() {
        let encoder = fitted();
        let full = sample_record()
            .with("age", encoder.state().numeric[4].scaler.median)
            .with("housing", encoder.state().categorical[9].mode.clone());
        let partial = sample_record().without("age").without("housing");
        assert_eq!(
            encoder.encode_imputed(&partial).unwrap(),
            encoder.encode(&full).unwrap().vector
        );
    }

    #[test]
    fn extrapolated_fields_are_reported() {
        let encoder = fitted();
        let encoded = encoder.encode(&sample_record().with("age", 150)).unwrap();
        assert_eq!(encoded.extrapolated, vec!["age"]);

        let clamped = encoder
            .encode_with(&sample_record().with("age", 150), ExtrapolationPolicy::Clamp)
            .unwrap();
        let max_age = encoder.state().numeric[4].scaler.max;
        let at_max = encoder.encode(&sample_record().with("age", max_age)).unwrap();
        assert_eq!(clamped.vector, at_max.vector);
    }

    #[test]
    fn matrix_is_feature_major() {
        let data = synthetic_credit_dataset(50, 9);
        let encoder = FeatureEncoder::fit(data.records(), 1).unwrap();
        let matrix = encoder.encode_matrix(data.records()).unwrap();
        assert_eq!(matrix.dim(), (encoder.n_features(), 50));
        let row7 = encoder.encode_imputed(&data.records()[7]).unwrap();
        assert_eq!(matrix.column(7).to_vec(), row7.into_vec());
    }

    #[test]
    fn from_state_rejects_reordered_fields() {
        let encoder = fitted();
        let mut state = encoder.state().clone();
        state.numeric.swap(0, 1);
        assert!(matches!(
            FeatureEncoder::from_state(state),
            Err(EncoderError::StateMismatch(_))
        ));
    }

    #[test]
    fn fit_on_empty_input_fails() {
        assert_eq!(
            FeatureEncoder::fit(&[], 1).unwrap_err(),
            EncoderError::EmptyInput
        );
    }
}
