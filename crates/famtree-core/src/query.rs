//! # Relationship Query Engine
//!
//! Read-only resolution of parents, siblings, spouses, children and ancestor
//! roots over a [`RecordStore`].
//!
//! - Queries never fail on missing relationships: absence is an empty list
//!   or a `None` field, and an unknown subject reads as "no relationships".
//! - Results follow store order.
//! - The ancestor walk is an explicit stack, visits the mother's line fully
//!   before the father's, and reports a true cycle as `DataIntegrity`.

use crate::primitives::MAX_GENERATIONS;
use crate::{FamilyId, FamtreeError, IndividualId, PartialDate, RecordStore};
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::BTreeSet;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Parents of an individual, resolved through its `FAMILY_CHILD` reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Parents {
    pub mother: Option<IndividualId>,
    pub father: Option<IndividualId>,
    pub family: Option<FamilyId>,
}

/// The other children of an individual's parent family.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Siblings {
    pub siblings: Vec<IndividualId>,
    pub family: Option<FamilyId>,
}

/// One spousal relationship. All fields are `None` when unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpouseLink {
    pub spouse: Option<IndividualId>,
    pub family: Option<FamilyId>,
    pub marriage: Option<PartialDate>,
    pub divorce: Option<PartialDate>,
}

// =============================================================================
// QUERY DISPATCH
// =============================================================================

/// Relationship queries in data form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Parents(IndividualId),
    Siblings(IndividualId),
    Spouses(IndividualId),
    Children {
        individual: IndividualId,
        family: Option<FamilyId>,
    },
    AncestorRoots(IndividualId),
}

impl Query {
    /// The individual the query is about.
    #[must_use]
    pub fn subject(&self) -> &IndividualId {
        match self {
            Self::Parents(id)
            | Self::Siblings(id)
            | Self::Spouses(id)
            | Self::AncestorRoots(id)
            | Self::Children { individual: id, .. } => id,
        }
    }
}

/// Result of [`QueryEngine::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Parents(Parents),
    Siblings(Siblings),
    Spouses { spouses: Vec<SpouseLink> },
    Children { children: Vec<IndividualId> },
    AncestorRoots { roots: Vec<IndividualId> },
}

// =============================================================================
// QUERY ENGINE
// =============================================================================

enum Frame {
    Enter(IndividualId),
    Exit(IndividualId),
}

/// Read-only view over a store.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a RecordStore,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Run a query in data form.
    pub fn execute(&self, query: &Query) -> Result<QueryResult, FamtreeError> {
        Ok(match query {
            Query::Parents(id) => QueryResult::Parents(self.parents(id)),
            Query::Siblings(id) => QueryResult::Siblings(self.siblings(id)),
            Query::Spouses(id) => QueryResult::Spouses {
                spouses: self.spouses(id),
            },
            Query::Children { individual, family } => QueryResult::Children {
                children: self.children(individual, family.as_ref()),
            },
            Query::AncestorRoots(id) => QueryResult::AncestorRoots {
                roots: self.ancestor_roots(id)?.into_iter().collect(),
            },
        })
    }

    /// Mother, father and the family joining them to `id`.
    #[must_use]
    pub fn parents(&self, id: &IndividualId) -> Parents {
        let family = self
            .store
            .individual(id)
            .and_then(|individual| individual.child_family())
            .and_then(|family_id| self.store.family(family_id));

        match family {
            Some(family) => Parents {
                mother: family.wife().cloned(),
                father: family.husband().cloned(),
                family: Some(family.id().clone()),
            },
            None => Parents::default(),
        }
    }

    /// Every other child of `id`'s parent family, in family order.
    #[must_use]
    pub fn siblings(&self, id: &IndividualId) -> Siblings {
        let family = self
            .store
            .individual(id)
            .and_then(|individual| individual.child_family())
            .and_then(|family_id| self.store.family(family_id));

        match family {
            Some(family) => Siblings {
                siblings: family
                    .children()
                    .iter()
                    .filter(|child| *child != id)
                    .cloned()
                    .collect(),
                family: Some(family.id().clone()),
            },
            None => Siblings::default(),
        }
    }

    /// The partner of `id` in `family`, or in its first spousal family.
    ///
    /// The partner is whoever holds the slot opposite `id`'s slot. If that
    /// slot is empty, or `id` is not a spouse there, every field is `None`.
    #[must_use]
    pub fn spouse(&self, id: &IndividualId, family: Option<&FamilyId>) -> SpouseLink {
        let Some(individual) = self.store.individual(id) else {
            return SpouseLink::default();
        };
        let Some(family) = family
            .or_else(|| individual.spouse_families().first())
            .and_then(|family_id| self.store.family(family_id))
        else {
            return SpouseLink::default();
        };

        match family
            .partner_of(id)
            .filter(|partner| self.store.contains_individual(partner))
        {
            Some(partner) => SpouseLink {
                spouse: Some(partner.clone()),
                family: Some(family.id().clone()),
                marriage: family.marriage.as_ref().and_then(|e| e.date.clone()),
                divorce: family.divorce.as_ref().and_then(|e| e.date.clone()),
            },
            None => SpouseLink::default(),
        }
    }

    /// One entry per `FAMILY_SPOUSE` reference of `id`, in reference order.
    #[must_use]
    pub fn spouses(&self, id: &IndividualId) -> Vec<SpouseLink> {
        self.store
            .individual(id)
            .map(|individual| {
                individual
                    .spouse_families()
                    .iter()
                    .map(|family| self.spouse(id, Some(family)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Children of `id` across all its spousal families, or just `family`.
    ///
    /// Families where `id` is not a spouse contribute nothing.
    #[must_use]
    pub fn children(&self, id: &IndividualId, family: Option<&FamilyId>) -> Vec<IndividualId> {
        let Some(individual) = self.store.individual(id) else {
            return Vec::new();
        };
        let families: Vec<&FamilyId> = match family {
            Some(family) => vec![family],
            None => individual.spouse_families().iter().collect(),
        };

        let mut children: IndexSet<IndividualId> = IndexSet::new();
        for family in families
            .into_iter()
            .filter_map(|family_id| self.store.family(family_id))
            .filter(|family| family.slot_of(id).is_some())
        {
            children.extend(family.children().iter().cloned());
        }
        children.into_iter().collect()
    }

    /// The set of ancestors of `id` with no resolvable parent.
    ///
    /// An individual with no known parents is its own root. Shared ancestors
    /// (pedigree collapse) are walked once. An individual that is its own
    /// ancestor fails with `DataIntegrity`, as does a lineage that still has
    /// parents beyond `MAX_GENERATIONS` generations.
    pub fn ancestor_roots(&self, id: &IndividualId) -> Result<IndexSet<IndividualId>, FamtreeError> {
        let mut roots = IndexSet::new();
        self.walk_ancestors(id, |ancestor, is_root| {
            if is_root {
                roots.insert(ancestor.clone());
            }
        })?;
        Ok(roots)
    }

    /// Every ancestor of `id` (excluding `id`), mother's line first.
    pub fn ancestors(&self, id: &IndividualId) -> Result<Vec<IndividualId>, FamtreeError> {
        let mut ancestors = Vec::new();
        self.walk_ancestors(id, |ancestor, _| {
            if ancestor != id {
                ancestors.push(ancestor.clone());
            }
        })?;
        Ok(ancestors)
    }

    /// Resolvable parents of `id`, mother first.
    fn resolvable_parents(&self, id: &IndividualId) -> Vec<IndividualId> {
        let parents = self.parents(id);
        [parents.mother, parents.father]
            .into_iter()
            .flatten()
            .filter(|parent| self.store.contains_individual(parent))
            .collect()
    }

    /// Depth-first upward walk, calling `visit(individual, is_root)` once per
    /// distinct individual in pre-order.
    fn walk_ancestors(
        &self,
        start: &IndividualId,
        mut visit: impl FnMut(&IndividualId, bool),
    ) -> Result<(), FamtreeError> {
        if !self.store.contains_individual(start) {
            return Ok(());
        }

        let mut stack = vec![Frame::Enter(start.clone())];
        let mut path: BTreeSet<IndividualId> = BTreeSet::new();
        let mut done: BTreeSet<IndividualId> = BTreeSet::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(current) => {
                    if path.contains(&current) {
                        return Err(FamtreeError::DataIntegrity(format!(
                            "{current} is recorded as their own ancestor"
                        )));
                    }
                    if done.contains(&current) {
                        continue;
                    }

                    let parents = self.resolvable_parents(&current);
                    if path.len() >= MAX_GENERATIONS && !parents.is_empty() {
                        return Err(FamtreeError::DataIntegrity(format!(
                            "{current} lies deeper than {MAX_GENERATIONS} generations"
                        )));
                    }
                    visit(&current, parents.is_empty());

                    if parents.is_empty() {
                        done.insert(current);
                        continue;
                    }
                    path.insert(current.clone());
                    stack.push(Frame::Exit(current));
                    // Father is pushed first so the mother's line is walked first.
                    for parent in parents.into_iter().rev() {
                        stack.push(Frame::Enter(parent));
                    }
                }
                Frame::Exit(current) => {
                    path.remove(&current);
                    done.insert(current);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
