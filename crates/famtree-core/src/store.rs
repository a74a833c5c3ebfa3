//! # Record Store
//!
//! The canonical collection of Individual and Family records.
//!
//! Records are kept in `IndexMap`s so iteration follows insertion (document)
//! order, which is what "store order" means throughout the crate. Two derived
//! indexes are maintained on every mutation:
//!
//! - `memberships`: individual -> families naming it as husband, wife or child
//! - `referrers`: family -> individuals holding a `FAMILY_SPOUSE` or
//!   `FAMILY_CHILD` reference to it
//!
//! so that relationship resolution never rescans the whole store.
//!
//! The reference-editing primitives here are crate-private and infallible.
//! They are the building blocks of the [`IntegrityEngine`](crate::IntegrityEngine),
//! which validates first and only then calls them.

use crate::formats::StoreDocument;
use crate::primitives::MAX_RECORDS;
use crate::{Family, FamilyId, FamtreeError, Individual, IndividualId, Slot};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// INDEX HELPERS
// =============================================================================

fn index_insert<K: Ord + Clone, V: Ord>(index: &mut BTreeMap<K, BTreeSet<V>>, key: &K, value: V) {
    index.entry(key.clone()).or_default().insert(value);
}

fn index_remove<K: Ord, V: Ord>(index: &mut BTreeMap<K, BTreeSet<V>>, key: &K, value: &V) {
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

// =============================================================================
// RECORD STORE
// =============================================================================

/// The in-memory record store.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    individuals: IndexMap<IndividualId, Individual>,
    families: IndexMap<FamilyId, Family>,

    /// Individual -> families that list it as husband, wife or child.
    memberships: BTreeMap<IndividualId, BTreeSet<FamilyId>>,

    /// Family -> individuals that reference it.
    referrers: BTreeMap<FamilyId, BTreeSet<IndividualId>>,
}

impl PartialEq for RecordStore {
    /// Two stores are equal when they hold the same records in the same order.
    fn eq(&self, other: &Self) -> bool {
        self.individuals.len() == other.individuals.len()
            && self.families.len() == other.families.len()
            && self.individuals.iter().eq(other.individuals.iter())
            && self.families.iter().eq(other.families.iter())
    }
}

impl RecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Build a store from a loaded document.
    ///
    /// Rejects duplicate ids and references that are dangling or one-sided
    /// with `DataIntegrity`. Families that name nobody are dropped.
    pub fn from_document(document: StoreDocument) -> Result<Self, FamtreeError> {
        let total = document
            .individuals
            .len()
            .saturating_add(document.families.len());
        if total > MAX_RECORDS {
            return Err(FamtreeError::DataIntegrity(format!(
                "document holds {total} records, limit is {MAX_RECORDS}"
            )));
        }

        let mut store = Self::new();
        for individual in document.individuals {
            if store.individuals.contains_key(&individual.id) {
                return Err(FamtreeError::DataIntegrity(format!(
                    "duplicate individual id {}",
                    individual.id
                )));
            }
            store.individuals.insert(individual.id.clone(), individual);
        }
        for family in document.families {
            if store.families.contains_key(&family.id) {
                return Err(FamtreeError::DataIntegrity(format!(
                    "duplicate family id {}",
                    family.id
                )));
            }
            store.families.insert(family.id.clone(), family);
        }

        store.reindex();
        store.verify_references()?;
        store.sweep_empty_families();
        Ok(store)
    }

    /// Snapshot the store as a document, in store order.
    #[must_use]
    pub fn to_document(&self) -> StoreDocument {
        StoreDocument {
            individuals: self.individuals.values().cloned().collect(),
            families: self.families.values().cloned().collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// The lowest unused individual id.
    #[must_use]
    pub fn next_individual_id(&self) -> IndividualId {
        (1..)
            .map(IndividualId::numbered)
            .find(|id| !self.individuals.contains_key(id))
            .unwrap_or_else(|| IndividualId::numbered(u32::MAX))
    }

    /// The lowest unused family id.
    #[must_use]
    pub fn next_family_id(&self) -> FamilyId {
        (1..)
            .map(FamilyId::numbered)
            .find(|id| !self.families.contains_key(id))
            .unwrap_or_else(|| FamilyId::numbered(u32::MAX))
    }

    /// Create a bare individual with the lowest unused id.
    pub fn create_individual(&mut self) -> IndividualId {
        let id = self.next_individual_id();
        self.individuals
            .insert(id.clone(), Individual::new(id.clone()));
        id
    }

    /// Create a family with the lowest unused id.
    ///
    /// With an owner, the owner is placed in the slot matching their sex
    /// (wife for `F`, husband otherwise) and gains a `FAMILY_SPOUSE`
    /// reference to the new family.
    ///
    /// Without an owner the family is an empty placeholder. It breaks the
    /// no-empty-family invariant, so [`verify_integrity`](Self::verify_integrity)
    /// reports it, until a member is linked into it by id or
    /// [`IntegrityEngine::collect_empty_families`](crate::IntegrityEngine::collect_empty_families)
    /// removes it.
    pub fn create_family(&mut self, owner: Option<&IndividualId>) -> Result<FamilyId, FamtreeError> {
        let slot = match owner {
            Some(owner_id) => {
                let owner = self.get_individual(owner_id)?;
                Some(match owner.sex {
                    Some(sex) => Slot::for_sex(sex),
                    None => Slot::Husband,
                })
            }
            None => None,
        };

        let id = self.insert_family();
        if let (Some(owner_id), Some(slot)) = (owner, slot) {
            self.set_slot(&id, slot, Some(owner_id.clone()));
            self.add_spouse_ref(owner_id, &id);
        }
        Ok(id)
    }

    /// Allocate and insert an empty family.
    ///
    /// Callers must attach a member before returning control.
    pub(crate) fn insert_family(&mut self) -> FamilyId {
        let id = self.next_family_id();
        self.families.insert(id.clone(), Family::new(id.clone()));
        id
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn individual(&self, id: &IndividualId) -> Option<&Individual> {
        self.individuals.get(id)
    }

    #[must_use]
    pub fn family(&self, id: &FamilyId) -> Option<&Family> {
        self.families.get(id)
    }

    /// Get an individual, failing with `IndividualNotFound`.
    pub fn get_individual(&self, id: &IndividualId) -> Result<&Individual, FamtreeError> {
        self.individuals
            .get(id)
            .ok_or_else(|| FamtreeError::IndividualNotFound(id.clone()))
    }

    /// Get a family, failing with `FamilyNotFound`.
    pub fn get_family(&self, id: &FamilyId) -> Result<&Family, FamtreeError> {
        self.families
            .get(id)
            .ok_or_else(|| FamtreeError::FamilyNotFound(id.clone()))
    }

    /// Mutable access to an individual's descriptive fields.
    pub fn individual_mut(&mut self, id: &IndividualId) -> Result<&mut Individual, FamtreeError> {
        self.individuals
            .get_mut(id)
            .ok_or_else(|| FamtreeError::IndividualNotFound(id.clone()))
    }

    /// Mutable access to a family's descriptive fields.
    pub fn family_mut(&mut self, id: &FamilyId) -> Result<&mut Family, FamtreeError> {
        self.families
            .get_mut(id)
            .ok_or_else(|| FamtreeError::FamilyNotFound(id.clone()))
    }

    #[must_use]
    pub fn contains_individual(&self, id: &IndividualId) -> bool {
        self.individuals.contains_key(id)
    }

    #[must_use]
    pub fn contains_family(&self, id: &FamilyId) -> bool {
        self.families.contains_key(id)
    }

    /// All individuals in store order.
    pub fn individuals(&self) -> impl Iterator<Item = &Individual> {
        self.individuals.values()
    }

    /// All families in store order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    #[must_use]
    pub fn individual_count(&self) -> usize {
        self.individuals.len()
    }

    #[must_use]
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty() && self.families.is_empty()
    }

    /// Families naming `id` as husband, wife or child, ordered by id.
    pub fn memberships(&self, id: &IndividualId) -> impl Iterator<Item = &FamilyId> {
        self.memberships.get(id).into_iter().flatten()
    }

    /// Position of an individual in store order.
    #[must_use]
    pub fn position(&self, id: &IndividualId) -> Option<usize> {
        self.individuals.get_index_of(id)
    }

    /// The individual before `id` in store order, else the one after it.
    #[must_use]
    pub fn adjacent_individual(&self, id: &IndividualId) -> Option<IndividualId> {
        let index = self.individuals.get_index_of(id)?;
        let neighbour = match index.checked_sub(1) {
            Some(previous) => self.individuals.get_index(previous),
            None => self.individuals.get_index(index.saturating_add(1)),
        };
        neighbour.map(|(id, _)| id.clone())
    }

    // -------------------------------------------------------------------------
    // Add-if-absent (collation targets)
    // -------------------------------------------------------------------------

    /// Append a copy of `individual` unless its id is already present.
    ///
    /// References are copied verbatim and may dangle until
    /// [`detach_dangling`](Self::detach_dangling) is called.
    pub fn append_individual(&mut self, individual: &Individual) -> bool {
        if self.individuals.contains_key(&individual.id) {
            return false;
        }
        for family in &individual.family_spouse {
            index_insert(&mut self.referrers, family, individual.id.clone());
        }
        if let Some(family) = &individual.family_child {
            index_insert(&mut self.referrers, family, individual.id.clone());
        }
        self.individuals
            .insert(individual.id.clone(), individual.clone());
        true
    }

    /// Append a copy of `family` unless its id is already present.
    pub fn append_family(&mut self, family: &Family) -> bool {
        if self.families.contains_key(&family.id) {
            return false;
        }
        for member in family.members() {
            index_insert(&mut self.memberships, member, family.id.clone());
        }
        self.families.insert(family.id.clone(), family.clone());
        true
    }

    /// Drop every reference to a record that is not in this store, then
    /// remove families left naming nobody. Returns the number of
    /// references dropped.
    pub fn detach_dangling(&mut self) -> usize {
        let mut dropped = 0usize;

        let families = &self.families;
        for individual in self.individuals.values_mut() {
            let before = individual.family_spouse.len();
            individual.family_spouse.retain(|f| families.contains_key(f));
            dropped = dropped.saturating_add(before.saturating_sub(individual.family_spouse.len()));

            if individual
                .family_child
                .as_ref()
                .is_some_and(|f| !families.contains_key(f))
            {
                individual.family_child = None;
                dropped = dropped.saturating_add(1);
            }
        }

        let individuals = &self.individuals;
        for family in self.families.values_mut() {
            for slot in [&mut family.husband, &mut family.wife] {
                if slot.as_ref().is_some_and(|i| !individuals.contains_key(i)) {
                    *slot = None;
                    dropped = dropped.saturating_add(1);
                }
            }
            let before = family.children.len();
            family.children.retain(|c| individuals.contains_key(c));
            dropped = dropped.saturating_add(before.saturating_sub(family.children.len()));
        }

        self.reindex();
        self.sweep_empty_families();
        dropped
    }

    // -------------------------------------------------------------------------
    // Integrity checks
    // -------------------------------------------------------------------------

    /// Check every structural invariant of the store.
    ///
    /// - references resolve in both directions
    /// - no family is empty
    /// - a child appears in exactly its `FAMILY_CHILD` family, once
    pub fn verify_integrity(&self) -> Result<(), FamtreeError> {
        self.verify_references()?;
        if let Some(family) = self.families.values().find(|f| f.is_empty()) {
            return Err(FamtreeError::DataIntegrity(format!(
                "family {} is empty",
                family.id
            )));
        }
        Ok(())
    }

    fn verify_references(&self) -> Result<(), FamtreeError> {
        let integrity = |msg: String| Err(FamtreeError::DataIntegrity(msg));

        for individual in self.individuals.values() {
            let mut seen = BTreeSet::new();
            for family_id in &individual.family_spouse {
                if !seen.insert(family_id) {
                    return integrity(format!(
                        "{} lists spouse family {family_id} twice",
                        individual.id
                    ));
                }
                let Some(family) = self.families.get(family_id) else {
                    return integrity(format!(
                        "{} references missing family {family_id}",
                        individual.id
                    ));
                };
                if family.slot_of(&individual.id).is_none() {
                    return integrity(format!(
                        "{} claims to be a spouse in {family_id}, which does not list it",
                        individual.id
                    ));
                }
            }
            if let Some(family_id) = &individual.family_child {
                let Some(family) = self.families.get(family_id) else {
                    return integrity(format!(
                        "{} references missing family {family_id}",
                        individual.id
                    ));
                };
                if !family.has_child(&individual.id) {
                    return integrity(format!(
                        "{} claims to be a child in {family_id}, which does not list it",
                        individual.id
                    ));
                }
            }
        }

        for family in self.families.values() {
            if family.husband.is_some() && family.husband == family.wife {
                return integrity(format!("{} has the same husband and wife", family.id));
            }
            for spouse in family.husband.iter().chain(family.wife.iter()) {
                let Some(individual) = self.individuals.get(spouse) else {
                    return integrity(format!(
                        "{} references missing individual {spouse}",
                        family.id
                    ));
                };
                if !individual.family_spouse.contains(&family.id) {
                    return integrity(format!(
                        "{} lists {spouse} as spouse without a matching FAMILY_SPOUSE",
                        family.id
                    ));
                }
            }
            let mut seen = BTreeSet::new();
            for child in &family.children {
                if !seen.insert(child) {
                    return integrity(format!("{} lists child {child} twice", family.id));
                }
                let Some(individual) = self.individuals.get(child) else {
                    return integrity(format!(
                        "{} references missing individual {child}",
                        family.id
                    ));
                };
                if individual.family_child.as_ref() != Some(&family.id) {
                    return integrity(format!(
                        "{} lists {child} as child without a matching FAMILY_CHILD",
                        family.id
                    ));
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reference primitives (crate-private, infallible)
    // -------------------------------------------------------------------------

    /// Rebuild both derived indexes from the records.
    pub(crate) fn reindex(&mut self) {
        self.memberships.clear();
        self.referrers.clear();
        for family in self.families.values() {
            for member in family.members() {
                index_insert(&mut self.memberships, member, family.id.clone());
            }
        }
        for individual in self.individuals.values() {
            for family in individual
                .family_spouse
                .iter()
                .chain(individual.family_child.iter())
            {
                index_insert(&mut self.referrers, family, individual.id.clone());
            }
        }
    }

    pub(crate) fn add_spouse_ref(&mut self, individual: &IndividualId, family: &FamilyId) {
        if let Some(record) = self.individuals.get_mut(individual) {
            if !record.family_spouse.contains(family) {
                record.family_spouse.push(family.clone());
            }
            index_insert(&mut self.referrers, family, individual.clone());
        }
    }

    pub(crate) fn remove_spouse_ref(&mut self, individual: &IndividualId, family: &FamilyId) {
        if let Some(record) = self.individuals.get_mut(individual) {
            record.family_spouse.retain(|f| f != family);
            if record.family_child.as_ref() != Some(family) {
                index_remove(&mut self.referrers, family, individual);
            }
        }
    }

    pub(crate) fn set_child_ref(&mut self, individual: &IndividualId, family: Option<&FamilyId>) {
        let Some(record) = self.individuals.get_mut(individual) else {
            return;
        };
        let previous = std::mem::replace(&mut record.family_child, family.cloned());
        if let Some(previous) = previous {
            if !record.family_spouse.contains(&previous) {
                index_remove(&mut self.referrers, &previous, individual);
            }
        }
        if let Some(family) = family {
            index_insert(&mut self.referrers, family, individual.clone());
        }
    }

    /// Put `occupant` into a spouse slot, returning whoever was displaced.
    ///
    /// Only the family side changes; the caller fixes `FAMILY_SPOUSE`.
    pub(crate) fn set_slot(
        &mut self,
        family: &FamilyId,
        slot: Slot,
        occupant: Option<IndividualId>,
    ) -> Option<IndividualId> {
        let record = self.families.get_mut(family)?;
        let target = match slot {
            Slot::Husband => &mut record.husband,
            Slot::Wife => &mut record.wife,
        };
        let previous = std::mem::replace(target, occupant.clone());
        if let Some(previous) = &previous {
            if !record.mentions(previous) {
                index_remove(&mut self.memberships, previous, family);
            }
        }
        if let Some(occupant) = occupant {
            index_insert(&mut self.memberships, &occupant, family.clone());
        }
        previous
    }

    /// Append a child entry unless already present.
    pub(crate) fn push_child(&mut self, family: &FamilyId, child: &IndividualId) {
        if let Some(record) = self.families.get_mut(family) {
            if !record.children.contains(child) {
                record.children.push(child.clone());
            }
            index_insert(&mut self.memberships, child, family.clone());
        }
    }

    pub(crate) fn remove_child_entry(&mut self, family: &FamilyId, child: &IndividualId) {
        if let Some(record) = self.families.get_mut(family) {
            record.children.retain(|c| c != child);
            if !record.mentions(child) {
                index_remove(&mut self.memberships, child, family);
            }
        }
    }

    /// Remove a family and every reference to it. Returns the removed record.
    pub(crate) fn remove_family(&mut self, family: &FamilyId) -> Option<Family> {
        let record = self.families.shift_remove(family)?;

        for individual in self.referrers.remove(family).into_iter().flatten() {
            if let Some(referrer) = self.individuals.get_mut(&individual) {
                referrer.family_spouse.retain(|f| f != family);
                if referrer.family_child.as_ref() == Some(family) {
                    referrer.family_child = None;
                }
            }
        }
        for member in record.members() {
            index_remove(&mut self.memberships, member, family);
        }
        Some(record)
    }

    /// Remove an individual and every reference to it. Returns the removed
    /// record and the families it was stripped from, ordered by id.
    pub(crate) fn remove_individual(
        &mut self,
        individual: &IndividualId,
    ) -> Option<(Individual, Vec<FamilyId>)> {
        let record = self.individuals.shift_remove(individual)?;

        let touched: Vec<FamilyId> = self
            .memberships
            .remove(individual)
            .into_iter()
            .flatten()
            .collect();
        for family_id in &touched {
            if let Some(family) = self.families.get_mut(family_id) {
                if family.husband.as_ref() == Some(individual) {
                    family.husband = None;
                }
                if family.wife.as_ref() == Some(individual) {
                    family.wife = None;
                }
                family.children.retain(|c| c != individual);
            }
        }
        for family in record
            .family_spouse
            .iter()
            .chain(record.family_child.iter())
        {
            index_remove(&mut self.referrers, family, individual);
        }
        Some((record, touched))
    }

    /// Remove every family that names nobody. Returns the removed ids.
    pub(crate) fn sweep_empty_families(&mut self) -> Vec<FamilyId> {
        let empty: Vec<FamilyId> = self
            .families
            .values()
            .filter(|f| f.is_empty())
            .map(|f| f.id.clone())
            .collect();
        for family in &empty {
            self.remove_family(family);
        }
        empty
    }
}

// =============================================================================
// TESTS
// =============================================================================
