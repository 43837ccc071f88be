//! raw.rs
//! Loosely-specified field definitions, as written by model authors.

use crate::equation::EquationRef;
use crate::error::{ComposeError, Result};
use std::collections::BTreeMap;

/// One attribute value: plain data, or an equation defined in Rust.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Json(serde_json::Value),
    Equation(EquationRef),
}

impl From<serde_json::Value> for RawValue {
    fn from(v: serde_json::Value) -> Self { RawValue::Json(v) }
}

impl From<EquationRef> for RawValue {
    fn from(eq: EquationRef) -> Self { RawValue::Equation(eq) }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self { RawValue::Json(serde_json::json!(v)) }
}

impl From<Vec<f64>> for RawValue {
    fn from(v: Vec<f64>) -> Self { RawValue::Json(serde_json::json!(v)) }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self { RawValue::Json(serde_json::Value::String(v.to_string())) }
}

/// A field definition: either a bare value/equation or an attribute map.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Bare(RawValue),
    Attributes(BTreeMap<String, RawValue>),
}

impl RawField {
    pub fn attributes() -> Self {
        RawField::Attributes(BTreeMap::new())
    }

    /// Sets an attribute. A bare definition is first promoted to `value` or
    /// `equation`, matching how the normalizer would expand it.
    pub fn set(self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        let mut attrs = match self {
            RawField::Attributes(attrs) => attrs,
            RawField::Bare(bare) => {
                let k = if matches!(bare, RawValue::Equation(_)) { "equation" } else { "value" };
                BTreeMap::from([(k.to_string(), bare)])
            }
        };
        attrs.insert(key.into(), value.into());
        RawField::Attributes(attrs)
    }
}

impl From<RawValue> for RawField {
    fn from(v: RawValue) -> Self {
        match v {
            RawValue::Json(serde_json::Value::Object(map)) => {
                RawField::Attributes(map.into_iter().map(|(k, v)| (k, RawValue::Json(v))).collect())
            }
            other => RawField::Bare(other),
        }
    }
}

impl From<serde_json::Value> for RawField {
    fn from(v: serde_json::Value) -> Self { RawValue::from(v).into() }
}

impl From<EquationRef> for RawField {
    fn from(eq: EquationRef) -> Self { RawField::Bare(RawValue::Equation(eq)) }
}

impl From<f64> for RawField {
    fn from(v: f64) -> Self { RawValue::from(v).into() }
}

impl From<Vec<f64>> for RawField {
    fn from(v: Vec<f64>) -> Self { RawValue::from(v).into() }
}

impl From<&str> for RawField {
    fn from(v: &str) -> Self { RawValue::from(v).into() }
}

/// A raw field pool: category name -> field name -> definition.
///
/// Category names are not validated here; that is the normalizer's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLogics {
    categories: BTreeMap<String, BTreeMap<String, RawField>>,
}

impl RawLogics {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, category: impl Into<String>, name: impl Into<String>, field: impl Into<RawField>) {
        self.categories.entry(category.into()).or_default().insert(name.into(), field.into());
    }

    /// Builder form of [`RawLogics::insert`].
    pub fn with(mut self, category: impl Into<String>, name: impl Into<String>, field: impl Into<RawField>) -> Self {
        self.insert(category, name, field);
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, RawField>)> {
        self.categories.iter()
    }

    pub fn into_categories(self) -> BTreeMap<String, BTreeMap<String, RawField>> {
        self.categories
    }

    pub fn get(&self, category: &str, name: &str) -> Option<&RawField> {
        self.categories.get(category)?.get(name)
    }

    /// Reads the `logics` object of a model file.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(categories) = value else {
            return Err(ComposeError::InvalidAttribute {
                field: "logics".into(),
                key: "logics".into(),
                reason: "expected an object of categories".into(),
            });
        };
        let mut logics = RawLogics::new();
        for (category, fields) in categories {
            let serde_json::Value::Object(fields) = fields else {
                return Err(ComposeError::InvalidAttribute {
                    field: category.clone(),
                    key: "logics".into(),
                    reason: "expected an object of fields".into(),
                });
            };
            for (name, def) in fields {
                logics.insert(category.clone(), name, def);
            }
        }
        Ok(logics)
    }
}
