//! engine.rs
//! Name-by-name merge of two normalized pools.

use super::report::{ChangeEntry, ChangeKind, MergeConflict, MergeReport};
use super::MergeOptions;
use crate::error::{ComposeError, Result};
use crate::store::{Field, FieldPool};

enum Action {
    Insert(Field, ChangeKind),
    Conflict(MergeConflict),
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    options: MergeOptions,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merges `donor` into `recipient`, visiting donor names in lexicographic order.
    ///
    /// In strict mode any conflict fails the merge before the recipient is touched.
    /// Merged fields lose their classification; re-run the classifier afterwards.
    pub fn merge(&self, recipient: &mut FieldPool, donor: FieldPool) -> Result<MergeReport> {
        let mut fields: Vec<Field> = donor.into_fields().collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));

        // 1. Plan every name against the untouched recipient
        let actions: Vec<Action> = fields.into_iter().map(|field| self.plan(recipient, field)).collect();

        let conflicts: Vec<MergeConflict> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Conflict(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        for conflict in &conflicts {
            tracing::warn!(field = %conflict.field, "merge conflict: {}", conflict);
        }
        if self.options.strict && !conflicts.is_empty() {
            return Err(ComposeError::MergeConflict { conflicts });
        }

        // 2. Apply
        let mut report = MergeReport { conflicts, changes: Vec::new() };
        for action in actions {
            let Action::Insert(mut field, kind) = action else { continue };
            if self.options.record_changes {
                report.changes.push(ChangeEntry { field: field.name.clone(), category: field.category(), kind });
            }
            field.dependencies = None;
            recipient.insert(field);
        }

        tracing::debug!(
            conflicts = report.conflicts.len(),
            changes = report.changes.len(),
            fields = recipient.len(),
            "merged pools"
        );
        Ok(report)
    }

    fn plan(&self, recipient: &FieldPool, field: Field) -> Action {
        let Some(existing) = recipient.get(&field.name) else {
            return Action::Insert(field, ChangeKind::Added);
        };

        let from = existing.category();
        let same_category = from == field.category();
        if same_category && same_definition(existing, &field) {
            return Action::Unchanged;
        }

        if self.options.override_existing {
            let kind = if same_category { ChangeKind::Replaced } else { ChangeKind::Moved { from } };
            return Action::Insert(field, kind);
        }

        Action::Conflict(MergeConflict {
            field: field.name.clone(),
            recipient_category: from,
            donor_category: field.category(),
            recipient_definition: existing.describe(),
            donor_definition: field.describe(),
        })
    }
}

/// Equal bodies, metadata and shapes; classification is ignored.
fn same_definition(a: &Field, b: &Field) -> bool {
    a.body == b.body && a.metadata == b.metadata && a.shape == b.shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::EquationRef;
    use crate::store::{Category, FieldBody, Value};
    use rstest::rstest;

    fn param(name: &str, v: f64) -> Field {
        Field::new(name, FieldBody::Parameter { value: Some(Value::Scalar(v)) })
    }

    fn state(name: &str, expr: &str) -> Field {
        Field::new(name, FieldBody::StateVariable { equation: EquationRef::parse(expr).unwrap() })
    }

    fn engine(override_existing: bool, strict: bool) -> MergeEngine {
        MergeEngine::new(MergeOptions { override_existing, strict, record_changes: true })
    }

    #[test]
    fn test_disjoint_donor_is_copied_in() {
        let mut recipient: FieldPool = [param("a", 1.0)].into_iter().collect();
        let donor: FieldPool = [param("b", 2.0), state("c", "a + b")].into_iter().collect();

        let report = engine(true, false).merge(&mut recipient, donor).unwrap();
        assert!(report.is_clean());
        assert_eq!(recipient.len(), 3);
        let added: Vec<&str> = report.changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(added, ["b", "c"]);
        assert!(report.changes.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn test_override_moves_across_categories() {
        let mut recipient: FieldPool = [param("delta", 0.05)].into_iter().collect();
        let donor: FieldPool = [state("delta", "0.05 * 2")].into_iter().collect();

        let report = engine(true, false).merge(&mut recipient, donor).unwrap();
        assert_eq!(recipient.category_of("delta"), Some(Category::StateVariable));
        assert_eq!(recipient.category(Category::Parameter).count(), 0);
        assert_eq!(report.changes[0].kind, ChangeKind::Moved { from: Category::Parameter });
    }

    #[rstest]
    #[case(param("k", 2.0), Category::Parameter)]
    #[case(state("k", "3"), Category::StateVariable)]
    fn test_without_override_recipient_wins(#[case] donor_field: Field, #[case] donor_category: Category) {
        let mut recipient: FieldPool = [param("k", 1.0)].into_iter().collect();
        let donor: FieldPool = [donor_field].into_iter().collect();

        let report = engine(false, false).merge(&mut recipient, donor).unwrap();
        assert_eq!(recipient.get("k").unwrap().body, FieldBody::Parameter { value: Some(Value::Scalar(1.0)) });
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].donor_category, donor_category);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_strict_conflicts_leave_recipient_untouched() {
        let mut recipient: FieldPool = [param("k", 1.0)].into_iter().collect();
        let before = recipient.clone();
        let donor: FieldPool = [param("k", 2.0), param("new", 0.0)].into_iter().collect();

        let err = engine(false, true).merge(&mut recipient, donor).unwrap_err();
        assert_eq!(recipient, before);
        match err {
            ComposeError::MergeConflict { conflicts } => {
                assert_eq!(conflicts[0].field, "k");
                assert!(conflicts[0].to_string().contains("value=2"), "Msg: {}", conflicts[0]);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_identical_definitions_are_not_conflicts() {
        let mut recipient: FieldPool = [param("k", 1.0)].into_iter().collect();
        let donor: FieldPool = [param("k", 1.0)].into_iter().collect();
        let report = engine(false, true).merge(&mut recipient, donor).unwrap();
        assert!(report.is_clean());
        assert!(report.changes.is_empty());
    }
}
