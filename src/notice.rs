//! Non-fatal diagnostics surfaced to the caller.

use serde::Serialize;
use std::fmt;

/// The specific category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// An attribute key was written with a known alias.
    KeySynonym,
    /// A category was written with a known alias.
    CategorySynonym,
    /// A name was defined more than once; one definition was dropped.
    DuplicateField,
    /// The broadcaster created a field that was only referenced.
    SynthesizedField,
    /// A shape refers to a dimension name that is defined, but not as a size group.
    DimensionNotSizeGroup,
    /// A permissive-mode argument that names no field.
    UnresolvedArgument,
    /// A preset refers to a field the model does not define.
    UnknownPresetField,
}

/// A structured warning. Every notice is also emitted through `tracing::warn!`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub field: Option<String>,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, field: Option<&str>, message: String) -> Self {
        tracing::warn!(kind = ?kind, field = field.unwrap_or(""), "{}", message);
        Self { kind, field: field.map(str::to_string), message }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
