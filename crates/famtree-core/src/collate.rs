//! # Collation
//!
//! Copy a connected subset of a store into a new store, for family-history
//! export. Records are deep-copied and appended at most once, so repeated or
//! overlapping inclusions are harmless. [`Collator::finish`] then drops
//! every reference that points outside the subset, so the result satisfies
//! the same invariants as any other store.
//!
//! Walks are depth-first with an explicit stack:
//! - ancestors: self, parent family, then the mother's line before the father's
//! - descendants: self, then per spousal family: the family, the spouse, and
//!   each child's descendants in store order

use crate::primitives::MAX_GENERATIONS;
use crate::{FamilyId, FamtreeError, IndividualId, QueryEngine, RecordStore};
use std::collections::BTreeSet;

enum Task {
    Individual(IndividualId, usize),
    SpouseFamily(IndividualId, FamilyId, usize),
}

/// Builds a collated store from a source store.
#[derive(Debug)]
pub struct Collator<'a> {
    source: &'a RecordStore,
    target: RecordStore,
    include_siblings: bool,
    ancestors_seen: BTreeSet<IndividualId>,
    descendants_seen: BTreeSet<IndividualId>,
}

impl<'a> Collator<'a> {
    /// Start an empty collation over `source`.
    #[must_use]
    pub fn new(source: &'a RecordStore) -> Self {
        Self::with_target(source, RecordStore::new())
    }

    /// Collate into an existing target store.
    #[must_use]
    pub fn with_target(source: &'a RecordStore, target: RecordStore) -> Self {
        Self {
            source,
            target,
            include_siblings: false,
            ancestors_seen: BTreeSet::new(),
            descendants_seen: BTreeSet::new(),
        }
    }

    /// Also copy the siblings of every individual visited by ancestor and
    /// descendant walks.
    #[must_use]
    pub fn include_siblings(mut self, include: bool) -> Self {
        self.include_siblings = include;
        self
    }

    fn copy_individual(&mut self, id: &IndividualId) {
        if let Some(individual) = self.source.individual(id) {
            self.target.append_individual(individual);
        }
    }

    fn copy_family(&mut self, id: &FamilyId) {
        if let Some(family) = self.source.family(id) {
            self.target.append_family(family);
        }
    }

    /// Copy the other children of `id`'s parent family.
    pub fn add_siblings(&mut self, id: &IndividualId) -> Result<&mut Self, FamtreeError> {
        self.source.get_individual(id)?;
        let siblings = QueryEngine::new(self.source).siblings(id).siblings;
        for sibling in &siblings {
            self.copy_individual(sibling);
        }
        Ok(self)
    }

    /// Copy `id`, its parent family, and recursively every ancestor.
    pub fn add_ancestors(&mut self, id: &IndividualId) -> Result<&mut Self, FamtreeError> {
        self.source.get_individual(id)?;
        let query = QueryEngine::new(self.source);

        let mut stack = vec![(id.clone(), 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if !self.ancestors_seen.insert(current.clone()) {
                continue;
            }
            self.copy_individual(&current);
            if self.include_siblings {
                self.add_siblings(&current)?;
            }

            let parents = query.parents(&current);
            if let Some(family) = &parents.family {
                self.copy_family(family);
            }
            if depth < MAX_GENERATIONS {
                let next = depth.saturating_add(1);
                // Mother popped first.
                for parent in [parents.father, parents.mother].into_iter().flatten() {
                    stack.push((parent, next));
                }
            }
        }
        Ok(self)
    }

    /// Copy `id`, every spousal family with its spouse, and recursively
    /// every child's descendants.
    pub fn add_descendants(&mut self, id: &IndividualId) -> Result<&mut Self, FamtreeError> {
        let source = self.source;
        source.get_individual(id)?;

        let mut stack = vec![Task::Individual(id.clone(), 0)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Individual(current, depth) => {
                    if !self.descendants_seen.insert(current.clone()) {
                        continue;
                    }
                    let Some(individual) = source.individual(&current) else {
                        continue;
                    };
                    self.copy_individual(&current);
                    if self.include_siblings {
                        self.add_siblings(&current)?;
                    }
                    for family in individual.spouse_families().iter().rev() {
                        stack.push(Task::SpouseFamily(current.clone(), family.clone(), depth));
                    }
                }
                Task::SpouseFamily(owner, family_id, depth) => {
                    let Some(family) = source.family(&family_id) else {
                        continue;
                    };
                    self.copy_family(&family_id);
                    if let Some(spouse) = family.partner_of(&owner) {
                        self.copy_individual(spouse);
                    }
                    if depth < MAX_GENERATIONS {
                        let next = depth.saturating_add(1);
                        for child in family.children().iter().rev() {
                            stack.push(Task::Individual(child.clone(), next));
                        }
                    }
                }
            }
        }
        Ok(self)
    }

    /// Copy the immediate family of `id`: itself, siblings, parents and their
    /// family, and each spousal family with spouse and children.
    pub fn add_family_members(&mut self, id: &IndividualId) -> Result<&mut Self, FamtreeError> {
        let source = self.source;
        let individual = source.get_individual(id)?;
        self.copy_individual(id);
        self.add_siblings(id)?;

        let parents = QueryEngine::new(source).parents(id);
        for parent in [&parents.mother, &parents.father].into_iter().flatten() {
            self.copy_individual(parent);
        }
        if let Some(family) = &parents.family {
            self.copy_family(family);
        }

        for family_id in individual.spouse_families() {
            let Some(family) = source.family(family_id) else {
                continue;
            };
            self.copy_family(family_id);
            if let Some(spouse) = family.partner_of(id) {
                self.copy_individual(spouse);
            }
            for child in family.children() {
                self.copy_individual(child);
            }
        }
        Ok(self)
    }

    /// Detach references leaving the subset and return the collated store.
    #[must_use]
    pub fn finish(mut self) -> RecordStore {
        self.target.detach_dangling();
        self.target
    }
}

/// Collate `id` and its ancestors into a new store.
pub fn collate_ancestors(
    source: &RecordStore,
    id: &IndividualId,
    include_siblings: bool,
) -> Result<RecordStore, FamtreeError> {
    let mut collator = Collator::new(source).include_siblings(include_siblings);
    collator.add_ancestors(id)?;
    Ok(collator.finish())
}

/// Collate `id` and its descendants into a new store.
pub fn collate_descendants(
    source: &RecordStore,
    id: &IndividualId,
    include_siblings: bool,
) -> Result<RecordStore, FamtreeError> {
    let mut collator = Collator::new(source).include_siblings(include_siblings);
    collator.add_descendants(id)?;
    Ok(collator.finish())
}

/// Collate the siblings of `id` into a new store.
pub fn collate_siblings(
    source: &RecordStore,
    id: &IndividualId,
) -> Result<RecordStore, FamtreeError> {
    let mut collator = Collator::new(source);
    collator.add_siblings(id)?;
    Ok(collator.finish())
}

/// Collate the immediate family of `id` into a new store.
pub fn collate_family_members(
    source: &RecordStore,
    id: &IndividualId,
) -> Result<RecordStore, FamtreeError> {
    let mut collator = Collator::new(source);
    collator.add_family_members(id)?;
    Ok(collator.finish())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IntegrityEngine, Sex};

    fn id(s: &str) -> IndividualId {
        IndividualId::new(s)
    }

    /// Three generations:
    /// I001 + I002 -> I003, I004; I003 + I005 -> I006; I007 unrelated.
    fn three_generations() -> RecordStore {
        let mut store = RecordStore::new();
        for _ in 0..7 {
            store.create_individual();
        }
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Male)).expect("sex");
        IntegrityEngine::set_sex(&mut store, &id("I003"), Some(Sex::Male)).expect("sex");
        IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I003"), None).expect("child");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I004"), None).expect("child");
        IntegrityEngine::set_spouse(&mut store, &id("I003"), &id("I005"), None).expect("pair");
        IntegrityEngine::set_child(&mut store, &id("I003"), &id("I006"), None).expect("child");
        store
    }

    fn ids(store: &RecordStore) -> Vec<String> {
        store.individuals().map(|i| i.id().to_string()).collect()
    }

    #[test]
    fn ancestors_walk_mother_first() {
        let source = three_generations();
        let collated = collate_ancestors(&source, &id("I006"), false).expect("collate");

        assert_eq!(ids(&collated), vec!["I006", "I005", "I003", "I002", "I001"]);
        collated.verify_integrity().expect("consistent");
        // I004 was not collated, so F001 only lists I003.
        let family = collated.family(&FamilyId::new("F001")).expect("parent family");
        assert_eq!(family.children(), &[id("I003")]);
    }

    #[test]
    fn ancestors_with_siblings() {
        let source = three_generations();
        let collated = collate_ancestors(&source, &id("I006"), true).expect("collate");
        assert!(collated.contains_individual(&id("I004")));
        collated.verify_integrity().expect("consistent");
    }

    #[test]
    fn descendants_include_spouses_and_children() {
        let source = three_generations();
        let collated = collate_descendants(&source, &id("I001"), false).expect("collate");

        assert_eq!(
            ids(&collated),
            vec!["I001", "I002", "I003", "I005", "I006", "I004"]
        );
        assert!(!collated.contains_individual(&id("I007")));
        collated.verify_integrity().expect("consistent");
    }

    #[test]
    fn family_members_are_immediate() {
        let source = three_generations();
        let collated = collate_family_members(&source, &id("I003")).expect("collate");

        assert_eq!(
            ids(&collated),
            vec!["I003", "I004", "I002", "I001", "I005", "I006"]
        );
        collated.verify_integrity().expect("consistent");
    }

    #[test]
    fn repeated_inclusion_is_idempotent() {
        let source = three_generations();
        let mut collator = Collator::new(&source);
        collator.add_descendants(&id("I003")).expect("collate");
        collator.add_descendants(&id("I003")).expect("collate");
        collator.add_ancestors(&id("I003")).expect("collate");
        let collated = collator.finish();

        assert_eq!(collated.individual_count(), 5);
        assert_eq!(collated.family_count(), 2);
        collated.verify_integrity().expect("consistent");
    }

    #[test]
    fn siblings_only_are_detached() {
        let source = three_generations();
        let collated = collate_siblings(&source, &id("I003")).expect("collate");

        assert_eq!(ids(&collated), vec!["I004"]);
        assert!(
            collated
                .individual(&id("I004"))
                .is_some_and(|i| i.child_family().is_none())
        );
    }

    #[test]
    fn missing_root_is_not_found() {
        let source = three_generations();
        let result = collate_descendants(&source, &id("I404"), false);
        assert!(matches!(result, Err(FamtreeError::IndividualNotFound(_))));
    }
}
