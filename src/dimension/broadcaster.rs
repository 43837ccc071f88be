//! broadcaster.rs
//! Assigns every field exactly one shape and makes sure each dimension it
//! spans exists as a size group.

use super::{DimensionMap, ShapeDeclaration};
use crate::error::{ComposeError, Result};
use crate::notice::{Notice, NoticeKind};
use crate::store::{Category, Field, FieldBody, FieldPool, Shape, ShapeGroup};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    dims: DimensionMap,
}

impl Broadcaster {
    pub fn new(dims: DimensionMap) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &DimensionMap {
        &self.dims
    }

    /// Applies `decl` to a freshly normalized pool.
    ///
    /// Fields that already carry a shape (an explicit `size` attribute, or a
    /// size group) count as placed and are left out of the complement.
    pub fn broadcast(&self, pool: &mut FieldPool, decl: &ShapeDeclaration) -> Result<Vec<Notice>> {
        let undefined = self.place(pool, decl)?;
        let mut notices = self.synthesize(pool, undefined);
        notices.extend(self.ensure_dimensions(pool));
        Ok(notices)
    }

    /// Shapes a donor pool ahead of a merge without adding anything to it.
    ///
    /// Declared names the donor leaves undefined come back with their shapes,
    /// to be synthesized only if the merged pool still lacks them. Missing
    /// dimensions are left to [`Broadcaster::complete`].
    pub fn broadcast_donor(&self, pool: &mut FieldPool, decl: &ShapeDeclaration) -> Result<BTreeMap<String, Shape>> {
        self.place(pool, decl)
    }

    /// Adds a valueless parameter for each declared name `pool` does not define.
    pub fn synthesize(&self, pool: &mut FieldPool, declared: BTreeMap<String, Shape>) -> Vec<Notice> {
        let mut notices = Vec::new();
        for (name, shape) in declared {
            if pool.contains(&name) {
                continue;
            }
            notices.push(Notice::new(
                NoticeKind::SynthesizedField,
                Some(&name),
                format!("Field '{}' is declared in a shape group but not defined; adding it as a parameter", name),
            ));
            let mut field = Field::new(name, FieldBody::Parameter { value: None });
            field.shape = Some(shape);
            pool.insert(field);
        }
        notices
    }

    /// Shapes every defined field and returns the declared names `pool` lacks.
    fn place(&self, pool: &mut FieldPool, decl: &ShapeDeclaration) -> Result<BTreeMap<String, Shape>> {
        // 1. Collect every placement, explicit or declared
        let mut placements: BTreeMap<String, BTreeSet<ShapeGroup>> = BTreeMap::new();
        for field in pool.fields() {
            if let Some(group) = field.shape_group() {
                placements.entry(field.name.clone()).or_default().insert(group);
            }
        }
        for group in ShapeGroup::ALL {
            for name in decl.group(group).into_iter().flatten() {
                placements.entry(name.clone()).or_default().insert(group);
            }
        }

        // 2. A name may sit in one group only
        if let Some((name, groups)) = placements.iter().find(|(_, groups)| groups.len() > 1) {
            return Err(ComposeError::AmbiguousShape {
                field: name.clone(),
                groups: groups.iter().map(|g| g.as_str().to_string()).collect(),
            });
        }

        // 3. Shapes for everything not yet shaped
        let complement = decl.complement();
        for field in pool.fields_mut() {
            if field.shape.is_some() {
                continue;
            }
            let group = placements
                .get(&field.name)
                .and_then(|groups| groups.iter().next().copied())
                .unwrap_or(complement);
            field.shape = Some(self.dims.shape(group));
        }

        // 4. Declared but never defined
        let undefined = placements
            .into_iter()
            .filter(|(name, _)| !pool.contains(name))
            .filter_map(|(name, groups)| groups.into_iter().next().map(|g| (name, self.dims.shape(g))))
            .collect();

        tracing::debug!(fields = pool.len(), complement = complement.as_str(), "broadcast shapes");
        Ok(undefined)
    }

    /// Completes a pool after a merge: unshaped fields become scalars and any
    /// dimension referenced by a shape gets a size group.
    pub fn complete(&self, pool: &mut FieldPool) -> Vec<Notice> {
        for field in pool.fields_mut() {
            if field.shape.is_none() {
                field.shape = Some(Shape::scalar());
            }
        }
        self.ensure_dimensions(pool)
    }

    fn ensure_dimensions(&self, pool: &mut FieldPool) -> Vec<Notice> {
        let referenced: BTreeSet<String> = pool
            .fields()
            .filter_map(|f| f.shape.as_ref())
            .flat_map(|s| s.dims.iter().cloned())
            .collect();

        let mut notices = Vec::new();
        for dim in referenced {
            match pool.category_of(&dim) {
                Some(Category::SizeGroup) => {}
                Some(other) => notices.push(Notice::new(
                    NoticeKind::DimensionNotSizeGroup,
                    Some(&dim),
                    format!("Dimension '{}' is used in a shape but defined as a {}", dim, other),
                )),
                None => {
                    notices.push(Notice::new(
                        NoticeKind::SynthesizedField,
                        Some(&dim),
                        format!("Dimension '{}' is used in a shape but not defined; adding a size group of 1", dim),
                    ));
                    let mut group = Field::new(dim, FieldBody::SizeGroup { labels: vec!["0".to_string()] });
                    group.shape = Some(Shape::scalar());
                    pool.insert(group);
                }
            }
        }
        notices
    }
}
