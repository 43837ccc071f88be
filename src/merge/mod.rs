//! Merging a donor pool into a recipient pool.

pub mod engine;
pub mod report;

pub use engine::MergeEngine;
pub use report::{ChangeEntry, ChangeKind, MergeConflict, MergeReport};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Donor definitions replace (or move) the recipient's on a name clash.
    #[serde(rename = "override")]
    pub override_existing: bool,
    /// Any conflict fails the merge instead of being reported.
    pub strict: bool,
    /// Fill `MergeReport::changes`.
    pub record_changes: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { override_existing: true, strict: false, record_changes: false }
    }
}
