//! Field schema normalization: raw, loosely-written definitions in, a strict
//! field pool plus notices out.

pub mod normalizer;
pub mod raw;
pub mod synonyms;

pub use normalizer::{Normalized, Normalizer};
pub use raw::{RawField, RawLogics, RawValue};
pub use synonyms::{CategoryMatch, Synonyms, SYNONYMS};
