//! # Integrity Engine
//!
//! Relationship mutations that keep both sides of every reference in step.
//!
//! Every operation runs in two phases:
//! 1. **Validate**: resolve ids, choose the family to use, work out slot and
//!    sex assignments. Any failure returns here with the store untouched.
//! 2. **Apply**: call the infallible [`RecordStore`] primitives.
//!
//! ## Family reuse
//!
//! Setting a relationship first reuses a family implied by either party
//! (the child's `FAMILY_CHILD`, a parent's or spouse's `FAMILY_SPOUSE`) and
//! only creates a new family when none fits.
//!
//! ## Cleanup
//!
//! - A family left with no husband, wife or children is removed.
//! - A family that loses its last spouse through a deletion is
//!   dissolved: its children lose their `FAMILY_CHILD` reference.
//!
//! ## Sex inference
//!
//! Once a pairing makes one side's sex known, every spouse reachable through
//! unknown-sex pairings is assigned the alternating sex and moved to the
//! matching husband/wife slot. Pairings that would put the same known sex on
//! both sides are rejected with `InvalidRelationship`.

use crate::primitives::MAX_ATTRIBUTE_VALUE_LENGTH;
use crate::{
    FamilyAttribute, FamilyId, FamtreeError, Individual, IndividualAttribute, IndividualId,
    RecordStore, Sex, Slot,
};
use std::collections::{BTreeMap, VecDeque};

fn invalid(message: String) -> FamtreeError {
    FamtreeError::InvalidRelationship(message)
}

/// Sex writes implied by an operation, keyed by individual.
type SexAssignments = BTreeMap<IndividualId, Sex>;

/// The IntegrityEngine groups every structural mutation of the store.
pub struct IntegrityEngine;

impl IntegrityEngine {
    // =========================================================================
    // SPOUSES
    // =========================================================================

    /// Pair `a` and `b` as spouses, returning the family that joins them.
    ///
    /// Without an explicit family, reuses a family both already share, else
    /// a spousal family of `a` (then `b`) with a free partner slot, else
    /// creates one. Repeating the call re-resolves to the same family.
    pub fn set_spouse(
        store: &mut RecordStore,
        a: &IndividualId,
        b: &IndividualId,
        family: Option<&FamilyId>,
    ) -> Result<FamilyId, FamtreeError> {
        let sex_a = store.get_individual(a)?.sex;
        let sex_b = store.get_individual(b)?.sex;
        if let Some(family) = family {
            store.get_family(family)?;
        }
        if a == b {
            return Err(invalid(format!("{a} cannot be their own spouse")));
        }
        if let (Some(x), Some(y)) = (sex_a, sex_b) {
            if x == y {
                return Err(invalid(format!("{a} and {b} both have sex {x}")));
            }
        }

        let chosen = match family {
            Some(family) => Some(family.clone()),
            None => Self::union_family(store, a, b),
        };
        if let Some(family_id) = &chosen {
            let family = store.get_family(family_id)?;
            for who in [a, b] {
                if family.has_child(who) {
                    return Err(invalid(format!("{who} is a child in {family_id}")));
                }
            }
        }

        let resolved_a = sex_a.or(sex_b.map(Sex::opposite));
        let slot_a = match resolved_a {
            Some(sex) => Slot::for_sex(sex),
            None => match chosen.as_ref().and_then(|f| store.family(f)) {
                Some(family)
                    if family.slot_of(a) == Some(Slot::Wife)
                        || family.slot_of(b) == Some(Slot::Husband) =>
                {
                    Slot::Wife
                }
                _ => Slot::Husband,
            },
        };

        let assignments = match resolved_a {
            Some(sex) => Self::implied_sexes(store, a, sex, chosen.as_ref(), &[(a, b)])?,
            None => SexAssignments::new(),
        };

        // Apply
        let family_id = chosen.unwrap_or_else(|| store.insert_family());
        let first = store.set_slot(&family_id, slot_a, Some(a.clone()));
        let second = store.set_slot(&family_id, slot_a.other(), Some(b.clone()));
        for displaced in [first, second].into_iter().flatten() {
            if &displaced != a && &displaced != b {
                store.remove_spouse_ref(&displaced, &family_id);
            }
        }
        store.add_spouse_ref(a, &family_id);
        store.add_spouse_ref(b, &family_id);
        Self::apply_sexes(store, &assignments);

        Ok(family_id)
    }

    /// A family both spouses already share, else an open spousal family of
    /// either side.
    fn union_family(store: &RecordStore, a: &IndividualId, b: &IndividualId) -> Option<FamilyId> {
        let first = store.individual(a)?;
        let second = store.individual(b)?;

        if let Some(shared) = first
            .family_spouse
            .iter()
            .find(|f| second.family_spouse.contains(f))
        {
            return Some(shared.clone());
        }

        let open = |who: &Individual| {
            who.family_spouse
                .iter()
                .find(|f| {
                    store
                        .family(f)
                        .is_some_and(|family| family.partner_of(&who.id).is_none())
                })
                .cloned()
        };
        open(first).or_else(|| open(second))
    }

    /// Unlink an individual from a spousal family (default: the first).
    ///
    /// Returns the family unlinked from, or `None` if there was none.
    /// The family is removed only if it is left with no husband, wife or
    /// children.
    pub fn remove_spouse(
        store: &mut RecordStore,
        individual: &IndividualId,
        family: Option<&FamilyId>,
    ) -> Result<Option<FamilyId>, FamtreeError> {
        let record = store.get_individual(individual)?;
        let target = match family {
            Some(family_id) => {
                if store.get_family(family_id)?.slot_of(individual).is_none() {
                    return Err(invalid(format!(
                        "{individual} is not a spouse in {family_id}"
                    )));
                }
                family_id.clone()
            }
            None => match record.family_spouse.first() {
                Some(family_id) => family_id.clone(),
                None => return Ok(None),
            },
        };

        if let Some(slot) = store.family(&target).and_then(|f| f.slot_of(individual)) {
            store.set_slot(&target, slot, None);
        }
        store.remove_spouse_ref(individual, &target);
        Self::settle(store, &target, false);
        Ok(Some(target))
    }

    // =========================================================================
    // PARENTS & CHILDREN
    // =========================================================================

    /// Make `father` the husband of `child`'s parent family.
    pub fn set_father(
        store: &mut RecordStore,
        child: &IndividualId,
        father: &IndividualId,
    ) -> Result<FamilyId, FamtreeError> {
        Self::set_parent(store, child, father, Slot::Husband)
    }

    /// Make `mother` the wife of `child`'s parent family.
    pub fn set_mother(
        store: &mut RecordStore,
        child: &IndividualId,
        mother: &IndividualId,
    ) -> Result<FamilyId, FamtreeError> {
        Self::set_parent(store, child, mother, Slot::Wife)
    }

    fn set_parent(
        store: &mut RecordStore,
        child: &IndividualId,
        parent: &IndividualId,
        slot: Slot,
    ) -> Result<FamilyId, FamtreeError> {
        let role = match slot {
            Slot::Husband => "father",
            Slot::Wife => "mother",
        };
        let child_record = store.get_individual(child)?;
        let parent_record = store.get_individual(parent)?;
        if child == parent {
            return Err(invalid(format!("{child} cannot be their own {role}")));
        }
        if let Some(sex) = parent_record.sex {
            if Slot::for_sex(sex) != slot {
                return Err(invalid(format!(
                    "{parent} has sex {sex} and cannot be the {role} of {child}"
                )));
            }
        }

        let existing = child_record.family_child.clone();
        let chosen = existing.clone().or_else(|| {
            parent_record
                .family_spouse
                .iter()
                .find(|f| store.family(f).and_then(|family| family.slot_of(parent)) == Some(slot))
                .cloned()
        });

        let mut partner = None;
        if let Some(family_id) = &chosen {
            let family = store.get_family(family_id)?;
            if family.has_child(parent) {
                return Err(invalid(format!("{parent} is a child in {family_id}")));
            }
            if family.slot_of(child).is_some() {
                return Err(invalid(format!("{child} is a spouse in {family_id}")));
            }
            partner = family.slot(slot.other()).filter(|p| *p != parent).cloned();
        }
        let extra: Vec<(&IndividualId, &IndividualId)> =
            partner.iter().map(|p| (parent, p)).collect();
        let assignments = Self::implied_sexes(store, parent, slot.sex(), chosen.as_ref(), &extra)?;

        // Apply
        let family_id = chosen.unwrap_or_else(|| store.insert_family());
        if store.family(&family_id).and_then(|f| f.slot_of(parent)) == Some(slot.other()) {
            store.set_slot(&family_id, slot.other(), None);
        }
        Self::place(store, &family_id, slot, parent);
        Self::apply_sexes(store, &assignments);
        if existing.is_none() {
            store.push_child(&family_id, child);
            store.set_child_ref(child, Some(&family_id));
        }
        Ok(family_id)
    }

    /// Record `child` as a child of `parent`, returning the family used.
    ///
    /// Without an explicit family, reuses the child's current family if
    /// `parent` is a spouse there, else the parent's first spousal family,
    /// else the child's current family (joining it as a parent), else a new
    /// family. A child already in another family is moved. Repeating the
    /// call never duplicates the child entry.
    pub fn set_child(
        store: &mut RecordStore,
        parent: &IndividualId,
        child: &IndividualId,
        family: Option<&FamilyId>,
    ) -> Result<FamilyId, FamtreeError> {
        let parent_record = store.get_individual(parent)?;
        let child_record = store.get_individual(child)?;
        if let Some(family_id) = family {
            store.get_family(family_id)?;
        }
        if parent == child {
            return Err(invalid(format!("{child} cannot be their own parent")));
        }

        let parent_sex = parent_record.sex;
        let current = child_record.family_child.clone();
        let chosen = match family {
            Some(family_id) => Some(family_id.clone()),
            None => current
                .clone()
                .filter(|f| store.family(f).is_some_and(|fam| fam.slot_of(parent).is_some()))
                .or_else(|| parent_record.family_spouse.first().cloned())
                .or_else(|| current.clone()),
        };

        let (slot, partner) = match &chosen {
            Some(family_id) => {
                let family = store.get_family(family_id)?;
                if family.has_child(parent) {
                    return Err(invalid(format!("{parent} is a child in {family_id}")));
                }
                if family.slot_of(child).is_some() {
                    return Err(invalid(format!("{child} is a spouse in {family_id}")));
                }
                let slot = match (family.slot_of(parent), parent_sex) {
                    (Some(slot), _) => slot,
                    (None, Some(sex)) => Slot::for_sex(sex),
                    (None, None) => match (family.husband(), family.wife()) {
                        (None, _) => Slot::Husband,
                        (_, None) => Slot::Wife,
                        _ => {
                            return Err(invalid(format!(
                                "both parent slots of {family_id} are taken and {parent} has no recorded sex"
                            )));
                        }
                    },
                };
                (slot, family.slot(slot.other()).filter(|p| *p != parent).cloned())
            }
            None => (parent_sex.map_or(Slot::Husband, Slot::for_sex), None),
        };

        let partner_sex = partner
            .as_ref()
            .and_then(|p| store.individual(p))
            .and_then(Individual::sex);
        let extra: Vec<(&IndividualId, &IndividualId)> =
            partner.iter().map(|p| (parent, p)).collect();
        let assignments = match parent_sex.or(partner_sex.map(Sex::opposite)) {
            Some(sex) => Self::implied_sexes(store, parent, sex, chosen.as_ref(), &extra)?,
            None => SexAssignments::new(),
        };

        // Apply
        let family_id = chosen.unwrap_or_else(|| store.insert_family());
        if let Some(previous) = current.filter(|f| *f != family_id) {
            store.remove_child_entry(&previous, child);
            store.set_child_ref(child, None);
            Self::settle(store, &previous, false);
        }
        Self::place(store, &family_id, slot, parent);
        Self::apply_sexes(store, &assignments);
        store.push_child(&family_id, child);
        store.set_child_ref(child, Some(&family_id));
        Ok(family_id)
    }

    /// Detach an individual from its parent family.
    ///
    /// Returns the family it was detached from, or `None` if it had none.
    pub fn remove_parents(
        store: &mut RecordStore,
        individual: &IndividualId,
    ) -> Result<Option<FamilyId>, FamtreeError> {
        let Some(family_id) = store.get_individual(individual)?.family_child.clone() else {
            return Ok(None);
        };
        Self::detach_child(store, &family_id, individual);
        Ok(Some(family_id))
    }

    /// Detach `child` from its parent family, provided `parent` is a
    /// spouse in that family.
    pub fn remove_child(
        store: &mut RecordStore,
        parent: &IndividualId,
        child: &IndividualId,
    ) -> Result<FamilyId, FamtreeError> {
        store.get_individual(parent)?;
        let family_id = store
            .get_individual(child)?
            .family_child
            .clone()
            .filter(|f| store.family(f).is_some_and(|fam| fam.slot_of(parent).is_some()))
            .ok_or_else(|| invalid(format!("{child} is not a child of {parent}")))?;

        Self::detach_child(store, &family_id, child);
        Ok(family_id)
    }

    fn detach_child(store: &mut RecordStore, family: &FamilyId, child: &IndividualId) {
        store.remove_child_entry(family, child);
        store.set_child_ref(child, None);
        Self::settle(store, family, false);
    }

    // =========================================================================
    // DELETION
    // =========================================================================

    /// Delete an individual and cascade through every family naming it.
    ///
    /// Returns the individual before it in store order, else the one after
    /// it, else `None`. Deleting an id that no longer exists fails with
    /// `IndividualNotFound`.
    pub fn delete_individual(
        store: &mut RecordStore,
        id: &IndividualId,
    ) -> Result<Option<IndividualId>, FamtreeError> {
        store.get_individual(id)?;
        let adjacent = store.adjacent_individual(id);

        let (record, touched) = store
            .remove_individual(id)
            .ok_or_else(|| FamtreeError::IndividualNotFound(id.clone()))?;
        for family in &touched {
            Self::settle(store, family, record.family_spouse.contains(family));
        }
        Ok(adjacent)
    }

    /// Delete a family and strip every reference to it.
    pub fn delete_family(store: &mut RecordStore, id: &FamilyId) -> Result<(), FamtreeError> {
        store
            .remove_family(id)
            .map(|_| ())
            .ok_or_else(|| FamtreeError::FamilyNotFound(id.clone()))
    }

    /// Remove every empty family, returning their ids.
    pub fn collect_empty_families(store: &mut RecordStore) -> Vec<FamilyId> {
        store.sweep_empty_families()
    }

    /// Apply the cleanup rules to one family after a structural change.
    fn settle(store: &mut RecordStore, family: &FamilyId, lost_spouse: bool) -> bool {
        let Some(record) = store.family(family) else {
            return false;
        };
        if record.is_empty() || (lost_spouse && !record.has_spouse()) {
            store.remove_family(family);
            true
        } else {
            false
        }
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    /// Set (or clear, with `None`) an individual's sex.
    ///
    /// Fails if a spouse already has that sex. Otherwise unknown-sex spouses
    /// are inferred and husband/wife slots are re-resolved.
    pub fn set_sex(
        store: &mut RecordStore,
        id: &IndividualId,
        sex: Option<Sex>,
    ) -> Result<(), FamtreeError> {
        store.get_individual(id)?;
        let Some(sex) = sex else {
            store.individual_mut(id)?.sex = None;
            return Ok(());
        };
        let assignments = Self::implied_sexes(store, id, sex, None, &[])?;
        Self::apply_sexes(store, &assignments);
        Ok(())
    }

    /// Set a named attribute of an individual.
    pub fn set_attribute(
        store: &mut RecordStore,
        id: &IndividualId,
        attribute: IndividualAttribute,
        value: &str,
    ) -> Result<(), FamtreeError> {
        check_value(value)?;
        match attribute {
            IndividualAttribute::Sex => Self::set_sex(store, id, Sex::parse_optional(value)?),
            other => store.individual_mut(id)?.apply(other, value),
        }
    }

    /// Set a named attribute on one of an individual's spousal families.
    ///
    /// Defaults to the first spousal family; if the individual has none, a
    /// family is created with the individual as owner.
    pub fn set_family_attribute(
        store: &mut RecordStore,
        id: &IndividualId,
        attribute: FamilyAttribute,
        value: &str,
        family: Option<&FamilyId>,
    ) -> Result<FamilyId, FamtreeError> {
        check_value(value)?;
        let record = store.get_individual(id)?;
        let target = match family {
            Some(family_id) => {
                if store.get_family(family_id)?.slot_of(id).is_none() {
                    return Err(invalid(format!("{id} is not a spouse in {family_id}")));
                }
                family_id.clone()
            }
            None => match record.family_spouse.first().cloned() {
                Some(family_id) => family_id,
                None => store.create_family(Some(id))?,
            },
        };
        store.family_mut(&target)?.apply(attribute, value);
        Ok(target)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Put `who` into `slot`, dropping the displaced occupant's reference.
    fn place(store: &mut RecordStore, family: &FamilyId, slot: Slot, who: &IndividualId) {
        let displaced = store.set_slot(family, slot, Some(who.clone()));
        if let Some(displaced) = displaced.filter(|d| d != who) {
            if store
                .family(family)
                .is_some_and(|f| f.slot_of(&displaced).is_none())
            {
                store.remove_spouse_ref(&displaced, family);
            }
        }
        store.add_spouse_ref(who, family);
    }

    /// Partners of `id` through its spousal families, skipping `skip`, plus
    /// any pairs in `extra` that mention it.
    fn partners_of(
        store: &RecordStore,
        id: &IndividualId,
        skip: Option<&FamilyId>,
        extra: &[(&IndividualId, &IndividualId)],
    ) -> Vec<IndividualId> {
        let mut partners: Vec<IndividualId> = store
            .individual(id)
            .map(Individual::spouse_families)
            .unwrap_or_default()
            .iter()
            .filter(|f| Some(*f) != skip)
            .filter_map(|f| store.family(f).and_then(|family| family.partner_of(id)))
            .cloned()
            .collect();
        for (x, y) in extra {
            if *x == id {
                partners.push((*y).clone());
            } else if *y == id {
                partners.push((*x).clone());
            }
        }
        partners
    }

    /// Every sex write implied by giving `start` the sex `sex`, walking
    /// outward through unknown-sex spouses.
    fn implied_sexes(
        store: &RecordStore,
        start: &IndividualId,
        sex: Sex,
        skip: Option<&FamilyId>,
        extra: &[(&IndividualId, &IndividualId)],
    ) -> Result<SexAssignments, FamtreeError> {
        let mut assigned = SexAssignments::new();
        assigned.insert(start.clone(), sex);
        let mut queue = VecDeque::from([(start.clone(), sex)]);

        while let Some((current, current_sex)) = queue.pop_front() {
            let expected = current_sex.opposite();
            for partner in Self::partners_of(store, &current, skip, extra) {
                if let Some(&given) = assigned.get(&partner) {
                    if given != expected {
                        return Err(invalid(format!(
                            "{partner} would need to be both {given} and {expected}"
                        )));
                    }
                    continue;
                }
                match store.individual(&partner).and_then(Individual::sex) {
                    Some(known) if known == expected => {}
                    Some(known) => {
                        return Err(invalid(format!(
                            "{current} and {partner} would both have sex {known}"
                        )));
                    }
                    None => {
                        assigned.insert(partner.clone(), expected);
                        queue.push_back((partner, expected));
                    }
                }
            }
        }
        Ok(assigned)
    }

    /// Write sexes and move each affected spouse into the matching slot.
    fn apply_sexes(store: &mut RecordStore, assignments: &SexAssignments) {
        for (id, sex) in assignments {
            if let Ok(record) = store.individual_mut(id) {
                record.sex = Some(*sex);
            }
        }
        for (id, sex) in assignments {
            let families = store
                .individual(id)
                .map(|r| r.family_spouse.clone())
                .unwrap_or_default();
            let desired = Slot::for_sex(*sex);
            for family in &families {
                let current = store.family(family).and_then(|f| f.slot_of(id));
                if let Some(current) = current.filter(|slot| *slot != desired) {
                    let partner = store.set_slot(family, desired, Some(id.clone()));
                    store.set_slot(family, current, partner);
                }
            }
        }
    }
}

fn check_value(value: &str) -> Result<(), FamtreeError> {
    if value.len() > MAX_ATTRIBUTE_VALUE_LENGTH {
        return Err(FamtreeError::InvalidAttribute(format!(
            "value is {} bytes, limit is {MAX_ATTRIBUTE_VALUE_LENGTH}",
            value.len()
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
