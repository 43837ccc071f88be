//! Shape assignment: which fields are scalars, per-sector vectors or
//! per-sector-pair matrices, and over which size groups.

pub mod broadcaster;

pub use broadcaster::Broadcaster;

use crate::store::{Shape, ShapeGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which names go in which shape group. An omitted group (`None`) means
/// "every field not placed elsewhere".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDeclaration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalar: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<BTreeSet<String>>,
}

impl ShapeDeclaration {
    pub fn new() -> Self { Self::default() }

    /// Declares `names` as members of `group`, adding to any earlier members.
    pub fn with<I, S>(mut self, group: ShapeGroup, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.slot_mut(group);
        slot.get_or_insert_with(BTreeSet::new).extend(names.into_iter().map(Into::into));
        self
    }

    pub fn group(&self, group: ShapeGroup) -> Option<&BTreeSet<String>> {
        match group {
            ShapeGroup::Scalar => self.scalar.as_ref(),
            ShapeGroup::Vector => self.vector.as_ref(),
            ShapeGroup::Matrix => self.matrix.as_ref(),
        }
    }

    fn slot_mut(&mut self, group: ShapeGroup) -> &mut Option<BTreeSet<String>> {
        match group {
            ShapeGroup::Scalar => &mut self.scalar,
            ShapeGroup::Vector => &mut self.vector,
            ShapeGroup::Matrix => &mut self.matrix,
        }
    }

    /// The group receiving every undeclared field: the first omitted one, or
    /// scalar when all three are declared.
    pub fn complement(&self) -> ShapeGroup {
        ShapeGroup::ALL.into_iter().find(|g| self.group(*g).is_none()).unwrap_or(ShapeGroup::Scalar)
    }
}

/// The size groups spanning each shape group's axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionMap {
    pub scalar: Vec<String>,
    pub vector: Vec<String>,
    pub matrix: Vec<String>,
}

impl Default for DimensionMap {
    fn default() -> Self {
        Self {
            scalar: Vec::new(),
            vector: vec!["Nprod".to_string()],
            matrix: vec!["Nprod".to_string(), "Nprod".to_string()],
        }
    }
}

impl DimensionMap {
    pub fn dims(&self, group: ShapeGroup) -> &[String] {
        match group {
            ShapeGroup::Scalar => &self.scalar,
            ShapeGroup::Vector => &self.vector,
            ShapeGroup::Matrix => &self.matrix,
        }
    }

    pub fn shape(&self, group: ShapeGroup) -> Shape {
        Shape::new(group, self.dims(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement_is_first_omitted_group() {
        assert_eq!(ShapeDeclaration::new().complement(), ShapeGroup::Scalar);

        let decl = ShapeDeclaration::new().with(ShapeGroup::Scalar, ["a"]);
        assert_eq!(decl.complement(), ShapeGroup::Vector);

        let all = decl.with(ShapeGroup::Vector, ["b"]).with(ShapeGroup::Matrix, Vec::<String>::new());
        assert_eq!(all.complement(), ShapeGroup::Scalar);
    }

    #[test]
    fn test_declaration_from_json() {
        let decl: ShapeDeclaration = serde_json::from_str(r#"{"vector": ["p", "w"]}"#).unwrap();
        assert!(decl.scalar.is_none());
        assert_eq!(decl.group(ShapeGroup::Vector).map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_partial_dimension_map_keeps_defaults() {
        let dims: DimensionMap = serde_json::from_str(r#"{"vector": ["Regions"]}"#).unwrap();
        assert_eq!(dims.vector, ["Regions"]);
        assert_eq!(dims.matrix, ["Nprod", "Nprod"]);
    }
}
