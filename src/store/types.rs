use crate::equation::EquationRef;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The canonical category a field belongs to.
///
/// Declaration order is the precedence used when one name is defined under
/// several categories and the first definition wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Parameter,
    StateVariable,
    DifferentialVariable,
    SizeGroup,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Parameter,
        Category::StateVariable,
        Category::DifferentialVariable,
        Category::SizeGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Parameter => "parameter",
            Category::StateVariable => "state_variable",
            Category::DifferentialVariable => "differential_variable",
            Category::SizeGroup => "size_group",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// State and differential variables carry an equation.
    pub fn is_computed(&self) -> bool {
        matches!(self, Category::StateVariable | Category::DifferentialVariable)
    }

    /// The attribute a field of this category cannot do without.
    pub fn required_key(&self) -> &'static str {
        match self {
            Category::Parameter => "value",
            Category::StateVariable | Category::DifferentialVariable => "equation",
            Category::SizeGroup => "value or list",
        }
    }

    /// Catalogue of required keys for every category, for error messages.
    pub fn required_catalogue() -> String {
        Self::ALL
            .iter()
            .map(|c| format!("{}: {}", c.as_str(), c.required_key()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal numeric value: a scalar, a per-sector vector or a per-sector-pair matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{}", v),
            Value::Vector(v) => write!(f, "{:?}", v),
            Value::Matrix(m) => write!(f, "{:?}", m),
        }
    }
}

/// Tensor rank class of a field relative to the declared sector sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeGroup {
    Scalar,
    Vector,
    Matrix,
}

impl ShapeGroup {
    pub const ALL: [ShapeGroup; 3] = [ShapeGroup::Scalar, ShapeGroup::Vector, ShapeGroup::Matrix];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeGroup::Scalar => "scalar",
            ShapeGroup::Vector => "vector",
            ShapeGroup::Matrix => "matrix",
        }
    }

    pub fn from_rank(rank: usize) -> Option<Self> {
        match rank {
            0 => Some(ShapeGroup::Scalar),
            1 => Some(ShapeGroup::Vector),
            2 => Some(ShapeGroup::Matrix),
            _ => None,
        }
    }
}

/// A concrete shape: the group plus the size-group names of each axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub group: ShapeGroup,
    pub dims: SmallVec<[String; 2]>,
}

impl Shape {
    pub fn scalar() -> Self {
        Self { group: ShapeGroup::Scalar, dims: SmallVec::new() }
    }

    pub fn new(group: ShapeGroup, dims: &[String]) -> Self {
        Self { group, dims: dims.iter().cloned().collect() }
    }
}

/// Descriptive attributes. Always filled after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub comment: String,
    pub units: String,
    pub definition: String,
    pub symbol: String,
    /// Unrecognized attributes, passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            comment: String::new(),
            units: "unknown".to_string(),
            definition: String::new(),
            symbol: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// The formal arguments of a computed field, partitioned by what they name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependencies {
    /// Parameters and size groups: constant for the whole run.
    pub parameter_names: BTreeSet<String>,
    /// Differential variables: the integrated state.
    pub state_names: BTreeSet<String>,
    /// State variables: other computed equations.
    pub equation_names: BTreeSet<String>,
    /// Only ever filled in permissive mode.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_names: BTreeSet<String>,
}

impl ResolvedDependencies {
    pub fn contains(&self, name: &str) -> bool {
        self.parameter_names.contains(name)
            || self.state_names.contains(name)
            || self.equation_names.contains(name)
            || self.unresolved_names.contains(name)
    }
}

/// What a field is, with the attributes only that kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBody {
    /// `value` is `None` only for parameters synthesized by the broadcaster.
    Parameter { value: Option<Value> },
    StateVariable { equation: EquationRef },
    DifferentialVariable { equation: EquationRef, initial: Option<Value> },
    /// The count is `labels.len()`.
    SizeGroup { labels: Vec<String> },
}

/// The atomic unit of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub body: FieldBody,
    pub metadata: Metadata,
    pub shape: Option<Shape>,
    pub dependencies: Option<ResolvedDependencies>,
}

impl Field {
    pub fn new(name: impl Into<String>, body: FieldBody) -> Self {
        Self { name: name.into(), body, metadata: Metadata::default(), shape: None, dependencies: None }
    }

    pub fn category(&self) -> Category {
        match self.body {
            FieldBody::Parameter { .. } => Category::Parameter,
            FieldBody::StateVariable { .. } => Category::StateVariable,
            FieldBody::DifferentialVariable { .. } => Category::DifferentialVariable,
            FieldBody::SizeGroup { .. } => Category::SizeGroup,
        }
    }

    pub fn equation(&self) -> Option<&EquationRef> {
        match &self.body {
            FieldBody::StateVariable { equation } | FieldBody::DifferentialVariable { equation, .. } => Some(equation),
            _ => None,
        }
    }

    pub fn shape_group(&self) -> Option<ShapeGroup> {
        self.shape.as_ref().map(|s| s.group)
    }

    /// One-line description used in conflict reports.
    pub fn describe(&self) -> String {
        match &self.body {
            FieldBody::Parameter { value: Some(v) } => format!("parameter value={}", v),
            FieldBody::Parameter { value: None } => "parameter (no value)".to_string(),
            FieldBody::StateVariable { equation } => format!("state_variable {:?}", equation),
            FieldBody::DifferentialVariable { equation, .. } => format!("differential_variable {:?}", equation),
            FieldBody::SizeGroup { labels } => format!("size_group {:?}", labels),
        }
    }
}
