//! synonyms.rs
//! Process-wide, read-only tables of category and attribute-key aliases.

use crate::store::Category;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Attribute keys the normalizer understands.
pub const CANONICAL_KEYS: [&str; 9] =
    ["value", "equation", "initial", "definition", "comment", "units", "symbol", "size", "list"];

const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("equation", &["func", "function", "f", "funcs"]),
    ("initial", &["init", "ini"]),
    ("value", &["val"]),
    ("definition", &["def"]),
    ("comment", &["com"]),
    ("units", &["unit", "Units", "Unit"]),
    ("symbol", &["Symbol", "symb", "latex"]),
    ("list", &["labels"]),
];

const CATEGORY_ALIASES: &[(Category, &[&str])] = &[
    (Category::Parameter, &["parameters", "param"]),
    (Category::StateVariable, &["statevar", "statevars", "state", "state_variables"]),
    (
        Category::DifferentialVariable,
        &["differential", "differentials", "ODEs", "ode", "diff", "differential_variables"],
    ),
    (Category::SizeGroup, &["size", "sizes", "size_groups"]),
];

pub static SYNONYMS: LazyLock<Synonyms> = LazyLock::new(Synonyms::builtin);

/// How a category name was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    Canonical(Category),
    Alias(Category),
}

impl CategoryMatch {
    pub fn category(&self) -> Category {
        match *self {
            CategoryMatch::Canonical(c) | CategoryMatch::Alias(c) => c,
        }
    }
}

#[derive(Debug)]
pub struct Synonyms {
    categories: HashMap<&'static str, Category>,
    keys: HashMap<&'static str, &'static str>,
}

impl Synonyms {
    fn builtin() -> Self {
        let categories = CATEGORY_ALIASES
            .iter()
            .flat_map(|&(cat, aliases)| aliases.iter().map(move |&a| (a, cat)))
            .collect();
        let keys = KEY_ALIASES
            .iter()
            .flat_map(|&(canon, aliases)| aliases.iter().map(move |&a| (a, canon)))
            .collect();
        Self { categories, keys }
    }

    pub fn category(&self, name: &str) -> Option<CategoryMatch> {
        if let Some(cat) = Category::from_canonical(name) {
            return Some(CategoryMatch::Canonical(cat));
        }
        self.categories.get(name).map(|&c| CategoryMatch::Alias(c))
    }

    /// The canonical key an alias stands for; `None` for canonical or unknown keys.
    pub fn key(&self, name: &str) -> Option<&'static str> {
        self.keys.get(name).copied()
    }

    /// Human-readable list of accepted category names, for error messages.
    pub fn known_categories(&self) -> String {
        CATEGORY_ALIASES
            .iter()
            .map(|(cat, aliases)| format!("{} ({})", cat.as_str(), aliases.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
