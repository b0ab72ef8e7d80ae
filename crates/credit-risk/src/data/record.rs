//! Raw applicant records.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{CREDIT_FIELDS, FieldKind};

// =============================================================================
// RawValue
// =============================================================================

/// A raw field value as received from the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    fn type_name(&self) -> &'static str {
        match self {
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Text(_) => "string",
        }
    }

    /// Numeric view of the value. Strings are parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Categorical view of the value. Numbers render to their decimal form.
    pub fn as_category(&self) -> Cow<'_, str> {
        match self {
            RawValue::Text(s) => Cow::Borrowed(s.as_str()),
            RawValue::Int(v) => Cow::Owned(v.to_string()),
            RawValue::Float(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(value as i64)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// A record that cannot be scored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("required field `{field}` is missing")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}, got {found}")]
    WrongType {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("field `{field}` must be finite, got {value}")]
    NonFinite { field: String, value: f64 },

    #[error("invalid JSON record: {0}")]
    Json(String),
}

// =============================================================================
// ApplicantRecord
// =============================================================================

/// Immutable mapping of field name to raw value.
///
/// Construction never fails on missing fields; completeness is checked by
/// [`ApplicantRecord::validate`] (inference) or tolerated through imputation
/// (training). Fields not in the layout are kept but ignored by the encoder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantRecord {
    values: BTreeMap<String, RawValue>,
}

impl ApplicantRecord {
    /// Build a record from `(name, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy of this record with one field replaced.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Return a copy of this record without the named field.
    pub fn without(mut self, name: &str) -> Self {
        self.values.remove(name);
        self
    }

    /// Parse a JSON object. `null` values count as missing.
    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut values = BTreeMap::new();
        for (key, value) in map {
            let raw = match value {
                Value::Null => continue,
                Value::String(s) => RawValue::Text(s.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => RawValue::Int(i),
                    None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                    // Only layout fields are typed; anything else is dropped.
                    match super::schema::field(key) {
                        Some(spec) => {
                            return Err(ValidationError::WrongType {
                                field: key.clone(),
                                expected: spec.kind,
                                found: json_type_name(value),
                            });
                        }
                        None => continue,
                    }
                }
            };
            values.insert(key.clone(), raw);
        }
        Ok(Self { values })
    }

    /// Parse any JSON value that must be an object.
    pub fn from_json_value(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Self::from_json_map(map),
            other => Err(ValidationError::NotAnObject(json_type_name(other))),
        }
    }

    /// Parse a JSON document holding one object.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ValidationError::Json(e.to_string()))?;
        Self::from_json_value(&value)
    }

    /// Raw value of a field, if present.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    /// Number of fields present (including ones outside the layout).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Numeric value of a field.
    ///
    /// Returns `Ok(None)` when the field is absent.
    pub fn numeric(&self, name: &str) -> Result<Option<f64>, ValidationError> {
        let Some(raw) = self.values.get(name) else {
            return Ok(None);
        };
        let value = raw.as_f64().ok_or_else(|| ValidationError::WrongType {
            field: name.to_string(),
            expected: FieldKind::Numeric,
            found: raw.type_name(),
        })?;
        if !value.is_finite() {
            return Err(ValidationError::NonFinite {
                field: name.to_string(),
                value,
            });
        }
        Ok(Some(value))
    }

    /// Categorical value of a field.
    ///
    /// Returns `Ok(None)` when the field is absent.
    pub fn categorical(&self, name: &str) -> Result<Option<Cow<'_, str>>, ValidationError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(RawValue::Float(v)) if !v.is_finite() => Err(ValidationError::NonFinite {
                field: name.to_string(),
                value: *v,
            }),
            Some(raw) => Ok(Some(raw.as_category())),
        }
    }

    /// Check that every layout field is present and well-typed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for spec in CREDIT_FIELDS.iter() {
            let present = match spec.kind {
                FieldKind::Numeric => self.numeric(spec.name)?.is_some(),
                FieldKind::Categorical => self.categorical(spec.name)?.is_some(),
            };
            if !present {
                return Err(ValidationError::MissingField {
                    field: spec.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Convert back to a JSON object.
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    RawValue::Int(i) => Value::from(*i),
                    RawValue::Float(f) => Value::from(*f),
                    RawValue::Text(s) => Value::from(s.as_str()),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
