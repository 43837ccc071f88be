//! report.rs
//! What a merge did, and what it refused to do.

use crate::store::Category;
use serde::Serialize;
use std::fmt;

/// A name clash the merge left unresolved because overriding was off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub field: String,
    pub recipient_category: Category,
    pub donor_category: Category,
    pub recipient_definition: String,
    pub donor_definition: String,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field '{}' is a {} in the recipient ({}) and a {} in the donor ({})",
            self.field, self.recipient_category, self.recipient_definition, self.donor_category, self.donor_definition
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Replaced,
    Moved { from: Category },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub field: String,
    /// The category the field ends up in.
    pub category: Category,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub conflicts: Vec<MergeConflict>,
    /// Only filled when change recording is on.
    pub changes: Vec<ChangeEntry>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Appends another merge's outcome, for chains of donors.
    pub fn extend(&mut self, other: MergeReport) {
        self.conflicts.extend(other.conflicts);
        self.changes.extend(other.changes);
    }
}
