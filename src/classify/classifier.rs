//! classifier.rs
//! Partitions the formal arguments of every computed field by the category
//! of the field each argument names.

use crate::config::Strictness;
use crate::error::{ComposeError, Result};
use crate::notice::{Notice, NoticeKind};
use crate::store::{Category, Field, FieldPool, ResolvedDependencies};

/// Resolves equation arguments against a pool.
///
/// Like a linter pass, it walks every computed field; the result is stored on
/// the field, so running it again on an unchanged pool changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyClassifier {
    strictness: Strictness,
}

impl DependencyClassifier {
    pub fn new(strictness: Strictness) -> Self {
        Self { strictness }
    }

    /// Classifies every state and differential variable of `pool` in place.
    pub fn classify(&self, pool: &mut FieldPool) -> Result<Vec<Notice>> {
        let mut notices = Vec::new();
        let mut resolved = Vec::new();

        // Resolve against the unchanged pool, then write back.
        for field in pool.fields().filter(|f| f.category().is_computed()) {
            resolved.push((field.name.clone(), self.resolve(field, pool, &mut notices)?));
        }

        let count = resolved.len();
        for (name, deps) in resolved {
            if let Some(field) = pool.get_mut(&name) {
                field.dependencies = Some(deps);
            }
        }
        tracing::debug!(classified = count, "classified dependencies");
        Ok(notices)
    }

    /// Classifies the arguments of one field.
    pub fn resolve(
        &self,
        field: &Field,
        pool: &FieldPool,
        notices: &mut Vec<Notice>,
    ) -> Result<ResolvedDependencies> {
        let mut deps = ResolvedDependencies::default();
        let Some(equation) = field.equation() else { return Ok(deps) };

        for argument in equation.arguments() {
            let bucket = match pool.category_of(argument) {
                Some(Category::Parameter | Category::SizeGroup) => &mut deps.parameter_names,
                Some(Category::DifferentialVariable) => &mut deps.state_names,
                Some(Category::StateVariable) => &mut deps.equation_names,
                None => match self.strictness {
                    Strictness::Strict => {
                        return Err(ComposeError::UnresolvedDependency {
                            field: field.name.clone(),
                            argument: argument.clone(),
                        });
                    }
                    Strictness::Permissive => {
                        notices.push(Notice::new(
                            NoticeKind::UnresolvedArgument,
                            Some(&field.name),
                            format!("Argument '{}' of field '{}' does not name any field", argument, field.name),
                        ));
                        &mut deps.unresolved_names
                    }
                },
            };
            bucket.insert(argument.clone());
        }
        Ok(deps)
    }
}
