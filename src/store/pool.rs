use super::types::{Category, Field};
use std::collections::BTreeMap;

/// All fields of a model, partitioned by category.
///
/// A name lives in at most one category: inserting a field whose name is
/// already present under another category moves it. The reverse index
/// (`name -> category`) is kept in step with the partition and iterates in
/// lexicographic order, which the merge engine relies on for stable reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPool {
    categories: BTreeMap<Category, BTreeMap<String, Field>>,
    index: BTreeMap<String, Category>,
}

impl FieldPool {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.index.len() }
    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Inserts a field, returning whatever previously held that name in any category.
    pub fn insert(&mut self, field: Field) -> Option<Field> {
        let previous = self.remove(&field.name);
        let category = field.category();
        self.index.insert(field.name.clone(), category);
        self.categories.entry(category).or_default().insert(field.name.clone(), field);
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let category = self.index.remove(name)?;
        let bucket = self.categories.get_mut(&category)?;
        let removed = bucket.remove(name);
        if bucket.is_empty() {
            self.categories.remove(&category);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        let category = self.index.get(name)?;
        self.categories.get(category)?.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        let category = self.index.get(name)?;
        self.categories.get_mut(category)?.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn category_of(&self, name: &str) -> Option<Category> {
        self.index.get(name).copied()
    }

    /// The reverse index: every name with its category, in name order.
    pub fn index(&self) -> &BTreeMap<String, Category> {
        &self.index
    }

    /// Names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.index.keys()
    }

    /// The fields of one category, in name order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &Field> {
        self.categories.get(&category).into_iter().flat_map(|b| b.values())
    }

    /// Every field, grouped by category then ordered by name.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.categories.values().flat_map(|b| b.values())
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.categories.values_mut().flat_map(|b| b.values_mut())
    }

    /// Consumes the pool, yielding fields grouped by category then ordered by name.
    pub fn into_fields(self) -> impl Iterator<Item = Field> {
        self.categories.into_values().flat_map(|b| b.into_values())
    }

    /// Names of every state and differential variable.
    pub fn computed_names(&self) -> Vec<String> {
        self.fields().filter(|f| f.category().is_computed()).map(|f| f.name.clone()).collect()
    }
}

impl FromIterator<Field> for FieldPool {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut pool = FieldPool::new();
        for field in iter {
            pool.insert(field);
        }
        pool
    }
}
