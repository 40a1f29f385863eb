//! Business key resolution between record streams
//!
//! Input rows name their parents by author-assigned business keys (assay
//! number, assay + specimen number, ...). As parent rows are accepted their
//! business keys are registered against the surrogate keys just allocated;
//! child streams resolve through the same map.
//!
//! Two lookups exist on purpose. [`CrossReferenceResolver::resolve`] is the
//! tolerant one and returns `None` for an unknown key.
//! [`CrossReferenceResolver::require`] is used for parents the data model
//! demands: a parent that was seen but rejected drops the child, a parent
//! never seen at all is a fatal batch integrity error.

use std::collections::{HashMap, HashSet};

use crate::error::{LoadError, Result};
use crate::model::EntityKind;

/// An author-supplied identifier, possibly composite
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessKey(Vec<String>);

impl BusinessKey {
    pub fn new(key: &str) -> Self {
        Self(vec![key.trim().to_string()])
    }

    pub fn composite(parts: &[&str]) -> Self {
        Self(parts.iter().map(|p| p.trim().to_string()).collect())
    }

    /// Extend with one more part (assay → assay:specimen)
    pub fn child(&self, part: &str) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.trim().to_string());
        Self(parts)
    }
}

impl std::fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Outcome of a strict parent lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Found(i64),
    /// The parent row existed but was rejected or dropped
    Rejected,
}

#[derive(Debug, Default)]
pub struct CrossReferenceResolver {
    registered: HashMap<EntityKind, HashMap<BusinessKey, i64>>,
    rejected: HashMap<EntityKind, HashSet<BusinessKey>>,
}

impl CrossReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityKind, key: BusinessKey, surrogate: i64) {
        self.registered.entry(entity).or_default().insert(key, surrogate);
    }

    pub fn resolve(&self, entity: EntityKind, key: &BusinessKey) -> Option<i64> {
        self.registered.get(&entity).and_then(|m| m.get(key)).copied()
    }

    pub fn is_registered(&self, entity: EntityKind, key: &BusinessKey) -> bool {
        self.resolve(entity, key).is_some()
    }

    /// Remember that a row with `key` was seen and not accepted
    pub fn mark_rejected(&mut self, entity: EntityKind, key: BusinessKey) {
        self.rejected.entry(entity).or_default().insert(key);
    }

    pub fn was_rejected(&self, entity: EntityKind, key: &BusinessKey) -> bool {
        self.rejected.get(&entity).is_some_and(|s| s.contains(key))
    }

    /// Strict lookup of a mandatory `parent` of a `child` row at `line`
    pub fn require(
        &self,
        parent: EntityKind,
        key: &BusinessKey,
        child: EntityKind,
        line: u64,
    ) -> Result<Parent> {
        if let Some(surrogate) = self.resolve(parent, key) {
            return Ok(Parent::Found(surrogate));
        }
        if self.was_rejected(parent, key) {
            return Ok(Parent::Rejected);
        }
        Err(LoadError::MissingParent {
            parent,
            child,
            key: key.to_string(),
            line,
        })
    }

    /// Registered business keys of `entity`, sorted
    pub fn keys_of(&self, entity: EntityKind) -> Vec<(&BusinessKey, i64)> {
        let mut keys: Vec<(&BusinessKey, i64)> = self
            .registered
            .get(&entity)
            .map(|m| m.iter().map(|(k, v)| (k, *v)).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
