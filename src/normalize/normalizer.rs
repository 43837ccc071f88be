//! normalizer.rs
//! Turns raw, possibly shorthand or misspelled definitions into a strict field pool.

use super::raw::{RawField, RawLogics, RawValue};
use super::synonyms::{CategoryMatch, Synonyms, CANONICAL_KEYS, SYNONYMS};
use crate::config::DuplicatePolicy;
use crate::equation::{EquationRef, Expression};
use crate::error::{ComposeError, Result};
use crate::notice::{Notice, NoticeKind};
use crate::store::{Category, Field, FieldBody, FieldPool, Metadata, Shape, ShapeGroup, Value};
use serde_json::json;
use std::collections::BTreeMap;

type Attributes = BTreeMap<String, RawValue>;

/// The outcome of normalizing one raw model.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub pool: FieldPool,
    /// The canonical raw form. Normalizing it again is a no-op.
    pub logics: RawLogics,
    pub notices: Vec<Notice>,
}

pub struct Normalizer {
    duplicates: DuplicatePolicy,
    synonyms: &'static Synonyms,
}

impl Default for Normalizer {
    fn default() -> Self { Self::new(DuplicatePolicy::default()) }
}

impl Normalizer {
    pub fn new(duplicates: DuplicatePolicy) -> Self {
        Self { duplicates, synonyms: &SYNONYMS }
    }

    pub fn normalize(&self, raw: RawLogics) -> Result<Normalized> {
        let (logics, notices) = self.canonicalize(raw)?;

        let mut pool = FieldPool::new();
        for (category, fields) in logics.categories() {
            // Canonical by construction.
            let Some(category) = Category::from_canonical(category) else { continue };
            for (name, field) in fields {
                if let RawField::Attributes(attrs) = field {
                    pool.insert(build_field(category, name, attrs)?);
                }
            }
        }

        tracing::debug!(fields = pool.len(), notices = notices.len(), "normalized field pool");
        Ok(Normalized { pool, logics, notices })
    }

    /// Rewrites `raw` into canonical form: canonical category and key names,
    /// expanded shorthand, parsed equations, consistent size groups and
    /// defaulted metadata. Duplicate names are resolved by the configured policy.
    pub fn canonicalize(&self, raw: RawLogics) -> Result<(RawLogics, Vec<Notice>)> {
        let mut notices = Vec::new();

        // 1. Resolve category names
        let mut groups = Vec::new();
        for (name, fields) in raw.into_categories() {
            let matched = self.synonyms.category(&name).ok_or_else(|| ComposeError::Category {
                category: name.clone(),
                known: self.synonyms.known_categories(),
            })?;
            if let CategoryMatch::Alias(category) = matched {
                notices.push(Notice::new(
                    NoticeKind::CategorySynonym,
                    None,
                    format!("Category '{}' is an alias; use '{}' instead", name, category),
                ));
            }
            groups.push((matched, name, fields));
        }

        // Precedence: category order, canonical spelling before aliases.
        groups.sort_by(|(a, a_name, _), (b, b_name, _)| {
            let key = |m: &CategoryMatch, n: &String| (m.category(), matches!(m, CategoryMatch::Alias(_)), n.clone());
            key(a, a_name).cmp(&key(b, b_name))
        });

        // 2. Canonicalize each field, resolving duplicate names
        let mut placed: BTreeMap<String, Category> = BTreeMap::new();
        let mut out: BTreeMap<Category, BTreeMap<String, Attributes>> = BTreeMap::new();

        for (matched, _, fields) in groups {
            let category = matched.category();
            for (name, field) in fields {
                // A definition that loses is never canonicalized.
                let previous = placed.get(&name).copied();
                match (previous, self.duplicates) {
                    (Some(previous), DuplicatePolicy::KeepFirst) => {
                        notices.push(duplicate_notice(&name, previous, category, previous));
                        continue;
                    }
                    (Some(previous), DuplicatePolicy::Reject) => {
                        return Err(ComposeError::DuplicateField {
                            field: name,
                            categories: vec![previous.to_string(), category.to_string()],
                        });
                    }
                    _ => {}
                }

                let attrs = self.canonical_field(category, &name, field, &mut notices)?;
                if let Some(previous) = previous {
                    notices.push(duplicate_notice(&name, previous, category, category));
                    if let Some(bucket) = out.get_mut(&previous) {
                        bucket.remove(&name);
                    }
                }
                placed.insert(name.clone(), category);
                out.entry(category).or_default().insert(name, attrs);
            }
        }

        // 3. Back to raw form
        let mut logics = RawLogics::new();
        for (category, fields) in out {
            for (name, attrs) in fields {
                logics.insert(category.as_str(), name, RawField::Attributes(attrs));
            }
        }
        Ok((logics, notices))
    }

    fn canonical_field(
        &self,
        category: Category,
        name: &str,
        field: RawField,
        notices: &mut Vec<Notice>,
    ) -> Result<Attributes> {
        // 1. Expand shorthand
        let mut attrs = match field {
            RawField::Attributes(attrs) => attrs,
            RawField::Bare(value) => BTreeMap::from([(bare_key(category, &value).to_string(), value)]),
        };

        // 2. Repair aliased keys
        let aliases: Vec<String> = attrs.keys().filter(|k| self.synonyms.key(k).is_some()).cloned().collect();
        for alias in aliases {
            let (Some(canonical), Some(value)) = (self.synonyms.key(&alias), attrs.remove(&alias)) else { continue };
            if attrs.contains_key(canonical) {
                notices.push(Notice::new(
                    NoticeKind::KeySynonym,
                    Some(name),
                    format!(
                        "Field '{}' in category '{}' sets both '{}' and its alias '{}'; the alias is ignored",
                        name, category, canonical, alias
                    ),
                ));
            } else {
                notices.push(Notice::new(
                    NoticeKind::KeySynonym,
                    Some(name),
                    format!("Field '{}' in category '{}' uses '{}'; use '{}' instead", name, category, alias, canonical),
                ));
                attrs.insert(canonical.to_string(), value);
            }
        }

        // 3. Equations written as text
        if category.is_computed() {
            if let Some(RawValue::Json(source)) = attrs.get("equation") {
                let equation = parse_equation(name, source)?;
                attrs.insert("equation".to_string(), RawValue::Equation(equation));
            }
        }

        // 4. Required attributes
        match category {
            Category::SizeGroup => complete_size_group(name, &mut attrs)?,
            _ => {
                let key = category.required_key();
                if matches!(attrs.get(key), None | Some(RawValue::Json(serde_json::Value::Null))) {
                    return Err(ComposeError::Schema {
                        field: name.to_string(),
                        category: category.to_string(),
                        missing: key.to_string(),
                        required: Category::required_catalogue(),
                    });
                }
            }
        }

        // 5. Metadata defaults
        attrs.entry("comment".to_string()).or_insert_with(|| RawValue::from(""));
        attrs.entry("units".to_string()).or_insert_with(|| RawValue::from("unknown"));
        Ok(attrs)
    }
}

fn duplicate_notice(name: &str, previous: Category, current: Category, kept: Category) -> Notice {
    Notice::new(
        NoticeKind::DuplicateField,
        Some(name),
        format!("Field '{}' is defined both as {} and as {}; keeping the {} definition", name, previous, current, kept),
    )
}

fn bare_key(category: Category, value: &RawValue) -> &'static str {
    match (category, value) {
        (Category::SizeGroup, RawValue::Json(serde_json::Value::Array(_))) => "list",
        (c, _) if c.is_computed() => "equation",
        _ => "value",
    }
}

fn invalid(field: &str, key: &str, reason: impl Into<String>) -> ComposeError {
    ComposeError::InvalidAttribute { field: field.to_string(), key: key.to_string(), reason: reason.into() }
}

fn parse_equation(name: &str, source: &serde_json::Value) -> Result<EquationRef> {
    let parsed = match source {
        serde_json::Value::String(expr) => EquationRef::parse(expr),
        serde_json::Value::Object(map) => {
            let expr = map
                .get("expr")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid(name, "equation", "missing 'expr' text"))?;
            match map.get("args") {
                None => EquationRef::parse(expr),
                Some(serde_json::Value::Array(args)) => {
                    let args = args
                        .iter()
                        .map(|a| a.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid(name, "equation", "'args' must be a list of names"))?;
                    Expression::with_arguments(args, expr).map(EquationRef::new)
                }
                Some(_) => return Err(invalid(name, "equation", "'args' must be a list of names")),
            }
        }
        _ => return Err(invalid(name, "equation", "expected an expression or {args, expr}")),
    };
    parsed.map_err(|source| ComposeError::Equation { field: name.to_string(), source })
}

/// Largest size group a count alone may ask for.
pub const MAX_SIZE_GROUP: usize = 1 << 20;

fn as_count(value: &serde_json::Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64).map(|f| f as u64)
}

fn label_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Makes `value` (count) and `list` (labels) both present and consistent.
fn complete_size_group(name: &str, attrs: &mut Attributes) -> Result<()> {
    let count = match attrs.get("value") {
        None => None,
        Some(RawValue::Json(v)) => {
            let n = as_count(v).ok_or_else(|| invalid(name, "value", "expected a non-negative integer count"))?;
            let n = usize::try_from(n)
                .ok()
                .filter(|n| *n <= MAX_SIZE_GROUP)
                .ok_or_else(|| invalid(name, "value", format!("count {} exceeds the limit of {}", n, MAX_SIZE_GROUP)))?;
            Some(n)
        }
        Some(RawValue::Equation(_)) => return Err(invalid(name, "value", "expected a count, found an equation")),
    };
    let labels = match attrs.get("list") {
        None => None,
        Some(RawValue::Json(serde_json::Value::Array(items))) => Some(items.iter().map(label_text).collect::<Vec<_>>()),
        Some(_) => return Err(invalid(name, "list", "expected a list of labels")),
    };

    let labels = match (count, labels) {
        (Some(n), Some(labels)) if n != labels.len() => {
            return Err(ComposeError::DimensionMismatch { group: name.to_string(), count: n, listed: labels.len() });
        }
        (_, Some(labels)) => labels,
        (Some(n), None) => (0..n).map(|i| i.to_string()).collect(),
        (None, None) => {
            return Err(ComposeError::Schema {
                field: name.to_string(),
                category: Category::SizeGroup.to_string(),
                missing: Category::SizeGroup.required_key().to_string(),
                required: Category::required_catalogue(),
            });
        }
    };

    attrs.insert("value".to_string(), RawValue::Json(json!(labels.len())));
    attrs.insert("list".to_string(), RawValue::Json(json!(labels)));
    Ok(())
}

fn json_attr<'a>(name: &str, key: &str, attrs: &'a Attributes) -> Result<Option<&'a serde_json::Value>> {
    match attrs.get(key) {
        None | Some(RawValue::Json(serde_json::Value::Null)) => Ok(None),
        Some(RawValue::Json(v)) => Ok(Some(v)),
        Some(RawValue::Equation(_)) => Err(invalid(name, key, "expected data, found an equation")),
    }
}

fn value_attr(name: &str, key: &str, attrs: &Attributes) -> Result<Option<Value>> {
    json_attr(name, key, attrs)?
        .map(|v| serde_json::from_value::<Value>(v.clone()).map_err(|e| invalid(name, key, e.to_string())))
        .transpose()
}

fn text_attr(name: &str, key: &str, attrs: &Attributes) -> Result<Option<String>> {
    Ok(json_attr(name, key, attrs)?.map(label_text))
}

fn shape_attr(name: &str, attrs: &Attributes) -> Result<Option<Shape>> {
    let Some(size) = json_attr(name, "size", attrs)? else { return Ok(None) };
    let dims: Vec<String> = match size {
        serde_json::Value::Array(items) => items.iter().map(label_text).collect(),
        serde_json::Value::String(s) => vec![s.clone()],
        _ => return Err(invalid(name, "size", "expected a list of size-group names")),
    };
    let group = ShapeGroup::from_rank(dims.len())
        .ok_or_else(|| invalid(name, "size", format!("rank {} is not supported", dims.len())))?;
    Ok(Some(Shape::new(group, &dims)))
}

/// Builds the typed field from canonical attributes.
fn build_field(category: Category, name: &str, attrs: &Attributes) -> Result<Field> {
    let equation = || match attrs.get("equation") {
        Some(RawValue::Equation(eq)) => Ok(eq.clone()),
        _ => Err(invalid(name, "equation", "expected an equation")),
    };

    let body = match category {
        Category::Parameter => FieldBody::Parameter { value: value_attr(name, "value", attrs)? },
        Category::StateVariable => FieldBody::StateVariable { equation: equation()? },
        Category::DifferentialVariable => FieldBody::DifferentialVariable {
            equation: equation()?,
            initial: value_attr(name, "initial", attrs)?,
        },
        Category::SizeGroup => {
            let labels = match json_attr(name, "list", attrs)? {
                Some(serde_json::Value::Array(items)) => items.iter().map(label_text).collect(),
                _ => Vec::new(),
            };
            FieldBody::SizeGroup { labels }
        }
    };

    let defaults = Metadata::default();
    let metadata = Metadata {
        comment: text_attr(name, "comment", attrs)?.unwrap_or(defaults.comment),
        units: text_attr(name, "units", attrs)?.unwrap_or(defaults.units),
        definition: text_attr(name, "definition", attrs)?.unwrap_or(defaults.definition),
        symbol: text_attr(name, "symbol", attrs)?.unwrap_or(defaults.symbol),
        extra: attrs
            .iter()
            .filter(|(k, _)| !CANONICAL_KEYS.contains(&k.as_str()))
            .filter_map(|(k, v)| match v {
                RawValue::Json(j) => Some((k.clone(), j.clone())),
                RawValue::Equation(_) => None,
            })
            .collect(),
    };

    // Size groups are dimensions themselves and carry no sector axis.
    let shape = match category {
        Category::SizeGroup => Some(Shape::scalar()),
        _ => shape_attr(name, attrs)?,
    };

    Ok(Field { name: name.to_string(), body, metadata, shape, dependencies: None })
}
