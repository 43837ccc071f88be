//! summary.rs
//! Human- and machine-readable views of a composed pool.

use crate::store::{Category, Field, FieldBody, FieldPool, ResolvedDependencies, Shape, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

/// The descriptive part of one field, for printing or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub kind: Category,
    pub units: String,
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub definition: String,
    pub shape: Option<Shape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<ResolvedDependencies>,
}

impl From<&Field> for FieldSummary {
    fn from(field: &Field) -> Self {
        let value = match &field.body {
            FieldBody::Parameter { value } => value.clone(),
            FieldBody::DifferentialVariable { initial, .. } => initial.clone(),
            FieldBody::SizeGroup { labels } => Some(Value::Scalar(labels.len() as f64)),
            FieldBody::StateVariable { .. } => None,
        };
        Self {
            name: field.name.clone(),
            kind: field.category(),
            units: field.metadata.units.clone(),
            comment: field.metadata.comment.clone(),
            definition: field.metadata.definition.clone(),
            shape: field.shape.clone(),
            value,
            arguments: field.equation().map(|eq| eq.arguments().to_vec()).unwrap_or_default(),
            dependencies: field.dependencies.clone(),
        }
    }
}

/// One summary per field, grouped by category then ordered by name.
pub fn summarize(pool: &FieldPool) -> Vec<FieldSummary> {
    pool.fields().map(FieldSummary::from).collect()
}

/// Renders the fields `target` reads, recursively, as an indented tree.
/// A field already printed is shown as a reference to its first level.
pub fn format_dependency_tree(pool: &FieldPool, target: &str) -> String {
    let mut tree = Tree { pool, first_seen: HashMap::new(), output: String::new() };

    match pool.get(target) {
        Some(field) => {
            let _ = writeln!(tree.output, "DEPENDENCY TREE for field '{}':", field.name);
            let _ = writeln!(tree.output, "--------------------------------------------------");
            tree.visit(field, 1, "");
        }
        None => {
            let _ = writeln!(tree.output, "Error: no field named '{}'", target);
        }
    }
    tree.output
}

struct Tree<'a> {
    pool: &'a FieldPool,
    first_seen: HashMap<&'a str, usize>,
    output: String,
}

impl<'a> Tree<'a> {
    fn visit(&mut self, field: &'a Field, level: usize, prefix: &str) {
        if let Some(&level_seen) = self.first_seen.get(field.name.as_str()) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, field.name, level_seen);
            return;
        }
        self.first_seen.insert(field.name.as_str(), level);

        let header = format!("[L{}] {}", level, field.name);
        match &field.body {
            FieldBody::Parameter { value: Some(v) } => {
                let _ = writeln!(self.output, "{}{} -> Param({})", prefix, header, v);
            }
            FieldBody::Parameter { value: None } => {
                let _ = writeln!(self.output, "{}{} -> Param(unset)", prefix, header);
            }
            FieldBody::SizeGroup { labels } => {
                let _ = writeln!(self.output, "{}{} -> Size({})", prefix, header, labels.len());
            }
            FieldBody::StateVariable { equation } | FieldBody::DifferentialVariable { equation, .. } => {
                let marker = if field.category() == Category::DifferentialVariable { " [d/dt]" } else { "" };
                let formula = equation.source().map(str::to_string).unwrap_or_else(|| equation.arguments().join(", "));
                let _ = writeln!(self.output, "{}{}{} = {}", prefix, header, marker, formula);

                let pool = self.pool;
                let children: Vec<&'a Field> = equation.arguments().iter().filter_map(|a| pool.get(a)).collect();
                let stem = prefix.replace("`--", "   ").replace("|--", "|  ");
                for (i, &child) in children.iter().enumerate() {
                    let connector = if i == children.len() - 1 { "`--" } else { "|--" };
                    self.visit(child, level + 1, &format!("{}{}", stem, connector));
                }
            }
        }
    }
}
