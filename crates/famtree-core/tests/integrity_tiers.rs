//! # Integrity Tier Tests (T0-T4)
//!
//! If ANY tier fails, the store cannot be trusted.
//!
//! ## Tiers
//! - T0: Record Store and id allocation
//! - T1: Relationship mutation keeps references symmetric
//! - T2: Relationship queries
//! - T3: Cascading deletion
//! - T4: Collation and projection

#![allow(clippy::unwrap_used, clippy::panic)]

use famtree_core::{
    FamilyId, FamtreeError, IndividualAttribute, IndividualId, IntegrityEngine, QueryEngine,
    RecordStore, Sex,
};

fn id(s: &str) -> IndividualId {
    IndividualId::new(s)
}

fn fid(s: &str) -> FamilyId {
    FamilyId::new(s)
}

fn store_with(count: usize) -> RecordStore {
    let mut store = RecordStore::new();
    for _ in 0..count {
        store.create_individual();
    }
    store
}

/// No family references a missing individual and every reference is
/// mirrored on the other side.
fn assert_consistent(store: &RecordStore) {
    store.verify_integrity().expect("store invariants hold");
}

// =============================================================================
// TIER T0: RECORD STORE
// =============================================================================

mod t0_record_store {
    use super::*;

    /// T0.1: Ids are allocated in the fixed-width scheme.
    #[test]
    fn ids_are_fixed_width() {
        let mut store = RecordStore::new();
        assert_eq!(store.create_individual(), id("I001"));
        assert_eq!(store.create_individual(), id("I002"));
        assert_eq!(store.create_family(None).expect("family"), fid("F001"));
    }

    /// T0.2: Allocation reuses the lowest free number.
    #[test]
    fn lowest_unused_id_is_reused() {
        let mut store = store_with(3);
        IntegrityEngine::delete_individual(&mut store, &id("I002")).expect("delete");
        assert_eq!(store.create_individual(), id("I002"));
        assert_eq!(store.create_individual(), id("I004"));
    }

    /// T0.3: An owner gains a spousal reference to the new family.
    #[test]
    fn create_family_attaches_owner() {
        let mut store = store_with(1);
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Female)).expect("sex");
        let family = store.create_family(Some(&id("I001"))).expect("family");

        let record = store.get_family(&family).expect("exists");
        assert_eq!(record.wife(), Some(&id("I001")));
        assert_eq!(
            store.get_individual(&id("I001")).expect("exists").spouse_families(),
            &[family]
        );
        assert_consistent(&store);
    }

    /// T0.6: An ownerless family is a placeholder until filled or swept.
    #[test]
    fn placeholder_family_lifecycle() {
        let mut store = store_with(2);
        let placeholder = store.create_family(None).expect("family");
        assert!(matches!(
            store.verify_integrity(),
            Err(FamtreeError::DataIntegrity(_))
        ));

        IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), Some(&placeholder))
            .expect("pair");
        assert_consistent(&store);

        let spare = store.create_family(None).expect("family");
        assert_eq!(spare, fid("F002"));
        assert_eq!(IntegrityEngine::collect_empty_families(&mut store), vec![spare]);
        assert_eq!(store.family_count(), 1);
        assert_consistent(&store);
    }

    /// T0.4: Missing records are NotFound.
    #[test]
    fn missing_records_not_found() {
        let store = store_with(1);
        assert!(matches!(
            store.get_individual(&id("I404")),
            Err(FamtreeError::IndividualNotFound(_))
        ));
        assert!(matches!(
            store.get_family(&fid("F404")),
            Err(FamtreeError::FamilyNotFound(_))
        ));
    }

    /// T0.5: Setters create the enclosing structure on first use.
    #[test]
    fn setters_create_on_first_use() {
        let mut store = store_with(1);
        let attribute: IndividualAttribute = "birth.year".parse().expect("attribute");
        IntegrityEngine::set_attribute(&mut store, &id("I001"), attribute, "1901").expect("set");
        IntegrityEngine::set_attribute(&mut store, &id("I001"), attribute, "1902").expect("set");

        let individual = store.get_individual(&id("I001")).expect("exists");
        let birth = individual.birth.as_ref().expect("birth created");
        assert_eq!(birth.date_label().as_deref(), Some("1902"));
        assert!(birth.place.is_none());
    }
}

// =============================================================================
// TIER T1: RELATIONSHIP MUTATION
// =============================================================================

mod t1_relationships {
    use super::*;

    /// T1.1: Spouses see each other.
    #[test]
    fn set_spouse_is_symmetric() {
        let mut store = store_with(2);
        IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");

        let query = QueryEngine::new(&store);
        assert_eq!(query.spouse(&id("I001"), None).spouse, Some(id("I002")));
        assert_eq!(query.spouse(&id("I002"), None).spouse, Some(id("I001")));
        assert_consistent(&store);
    }

    /// T1.2: A known sex implies the opposite sex on an unknown spouse.
    #[test]
    fn set_spouse_infers_sex() {
        let mut store = store_with(2);
        IntegrityEngine::set_sex(&mut store, &id("I002"), Some(Sex::Male)).expect("sex");
        let family =
            IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");

        assert_eq!(
            store.get_individual(&id("I001")).expect("exists").sex(),
            Some(Sex::Female)
        );
        let record = store.get_family(&family).expect("exists");
        assert_eq!(record.husband(), Some(&id("I002")));
        assert_eq!(record.wife(), Some(&id("I001")));
    }

    /// T1.3: Two unknown sexes stay unknown.
    #[test]
    fn unknown_sexes_are_not_forced() {
        let mut store = store_with(2);
        IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        assert!(store.individuals().all(|i| i.sex().is_none()));
    }

    /// T1.4: Same known sex is rejected with no mutation.
    #[test]
    fn same_sex_rejected_untouched() {
        for sex in [Sex::Male, Sex::Female] {
            let mut store = store_with(2);
            IntegrityEngine::set_sex(&mut store, &id("I001"), Some(sex)).expect("sex");
            IntegrityEngine::set_sex(&mut store, &id("I002"), Some(sex)).expect("sex");
            let before = store.clone();

            let result = IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None);
            assert!(matches!(result, Err(FamtreeError::InvalidRelationship(_))));
            assert_eq!(store, before);
        }
    }

    /// T1.5: set_child links both ways and never duplicates.
    #[test]
    fn set_child_is_idempotent() {
        let mut store = store_with(2);
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I002"), None).expect("child");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I002"), None).expect("child");

        let query = QueryEngine::new(&store);
        let parents = query.parents(&id("I002"));
        assert!(parents.father == Some(id("I001")) || parents.mother == Some(id("I001")));
        assert_eq!(query.children(&id("I001"), None), vec![id("I002")]);

        let family = parents.family.expect("family");
        assert_eq!(store.get_family(&family).expect("exists").children().len(), 1);
        assert_eq!(store.family_count(), 1);
        assert_consistent(&store);
    }

    /// T1.6: Father and mother share one family.
    #[test]
    fn parents_reuse_family() {
        let mut store = store_with(3);
        IntegrityEngine::set_father(&mut store, &id("I003"), &id("I001")).expect("father");
        IntegrityEngine::set_mother(&mut store, &id("I003"), &id("I002")).expect("mother");

        assert_eq!(store.family_count(), 1);
        let parents = QueryEngine::new(&store).parents(&id("I003"));
        assert_eq!(parents.father, Some(id("I001")));
        assert_eq!(parents.mother, Some(id("I002")));
        assert_eq!(
            QueryEngine::new(&store).spouse(&id("I001"), None).spouse,
            Some(id("I002"))
        );
        assert_consistent(&store);
    }

    /// T1.7: Unknown ids fail without partial mutation.
    #[test]
    fn unknown_ids_fail_atomically() {
        let mut store = store_with(1);
        let before = store.clone();
        assert!(IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I404"), None).is_err());
        assert!(IntegrityEngine::set_child(&mut store, &id("I404"), &id("I001"), None).is_err());
        assert!(IntegrityEngine::set_father(&mut store, &id("I001"), &id("I404")).is_err());
        assert_eq!(store, before);
    }

    /// T1.8: Unlinking clears both sides and sweeps the family.
    #[test]
    fn remove_spouse_and_parents() {
        let mut store = store_with(3);
        IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I003"), None).expect("child");

        IntegrityEngine::remove_parents(&mut store, &id("I003")).expect("unlink");
        assert_eq!(QueryEngine::new(&store).parents(&id("I003")).family, None);
        assert_consistent(&store);

        // The wife still holds F001.
        IntegrityEngine::remove_spouse(&mut store, &id("I001"), None).expect("unlink");
        assert_eq!(store.family_count(), 1);
        assert!(QueryEngine::new(&store).spouse(&id("I002"), None).spouse.is_none());
        assert_consistent(&store);

        IntegrityEngine::remove_spouse(&mut store, &id("I002"), None).expect("unlink");
        assert_eq!(store.family_count(), 0);
        assert!(QueryEngine::new(&store).spouses(&id("I002")).is_empty());
        assert_consistent(&store);
    }

    /// T1.9: Removing a child of someone else's family is rejected.
    #[test]
    fn remove_child_requires_parent() {
        let mut store = store_with(3);
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I002"), None).expect("child");
        let result = IntegrityEngine::remove_child(&mut store, &id("I003"), &id("I002"));
        assert!(matches!(result, Err(FamtreeError::InvalidRelationship(_))));

        IntegrityEngine::remove_child(&mut store, &id("I001"), &id("I002")).expect("unlink");
        assert_eq!(store.family_count(), 1);
        assert!(QueryEngine::new(&store).children(&id("I001"), None).is_empty());
        assert_consistent(&store);
    }
}

// =============================================================================
// TIER T2: QUERIES
// =============================================================================

mod t2_queries {
    use super::*;

    /// T2.1: Unknown ancestry is its own root.
    #[test]
    fn ancestor_roots_of_orphan() {
        let store = store_with(1);
        let roots = QueryEngine::new(&store)
            .ancestor_roots(&id("I001"))
            .expect("roots");
        assert_eq!(roots.into_iter().collect::<Vec<_>>(), vec![id("I001")]);
    }

    /// T2.2: Roots are found on both lines, mother's first.
    #[test]
    fn ancestor_roots_both_lines() {
        let mut store = store_with(5);
        IntegrityEngine::set_father(&mut store, &id("I005"), &id("I001")).expect("father");
        IntegrityEngine::set_mother(&mut store, &id("I005"), &id("I002")).expect("mother");
        IntegrityEngine::set_mother(&mut store, &id("I002"), &id("I003")).expect("mother");

        let roots = QueryEngine::new(&store)
            .ancestor_roots(&id("I005"))
            .expect("roots");
        assert_eq!(
            roots.into_iter().collect::<Vec<_>>(),
            vec![id("I003"), id("I001")]
        );
    }

    /// T2.3: Multiple marriages give one spouse entry each.
    #[test]
    fn multiple_marriages() {
        let mut store = store_with(3);
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Male)).expect("sex");
        let first =
            IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        let second = IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I003"), None)
            .expect("pair");
        assert_ne!(first, second);

        let query = QueryEngine::new(&store);
        let spouses: Vec<_> = query
            .spouses(&id("I001"))
            .into_iter()
            .filter_map(|link| link.spouse)
            .collect();
        assert_eq!(spouses, vec![id("I002"), id("I003")]);
        assert_eq!(
            query.spouse(&id("I001"), Some(&second)).spouse,
            Some(id("I003"))
        );
        assert_consistent(&store);
    }

    /// T2.4: Queries never fail on absence.
    #[test]
    fn absence_is_empty() {
        let store = store_with(1);
        let query = QueryEngine::new(&store);
        assert_eq!(query.parents(&id("I404")), Default::default());
        assert!(query.siblings(&id("I001")).siblings.is_empty());
        assert!(query.spouse(&id("I001"), None).spouse.is_none());
        assert!(query.children(&id("I001"), None).is_empty());
    }
}

// =============================================================================
// TIER T3: CASCADING DELETION
// =============================================================================

mod t3_deletion {
    use super::*;

    /// Husband I001 (M) and wife I002 in F001 with child I003.
    fn nuclear() -> RecordStore {
        let mut store = store_with(3);
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Male)).expect("sex");
        let family =
            IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        assert_eq!(family, fid("F001"));
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I003"), None).expect("child");
        store
    }

    /// T3.1: The documented deletion scenario, step by step.
    #[test]
    fn delete_scenario() {
        let mut store = nuclear();
        let siblings = QueryEngine::new(&store).siblings(&id("I003"));
        assert!(siblings.siblings.is_empty());
        assert_eq!(siblings.family, Some(fid("F001")));

        IntegrityEngine::delete_individual(&mut store, &id("I002")).expect("delete wife");
        let family = store.get_family(&fid("F001")).expect("family survives");
        assert_eq!(family.husband(), Some(&id("I001")));
        assert_eq!(family.wife(), None);
        assert_eq!(family.children(), &[id("I003")]);
        assert_consistent(&store);

        IntegrityEngine::delete_individual(&mut store, &id("I001")).expect("delete husband");
        assert!(store.family(&fid("F001")).is_none());
        assert_eq!(
            QueryEngine::new(&store).parents(&id("I003")),
            Default::default()
        );
        assert_consistent(&store);
    }

    /// T3.2: Nothing references a deleted individual.
    #[test]
    fn deleted_individual_is_gone() {
        for victim in ["I001", "I002", "I003"] {
            let mut store = nuclear();
            IntegrityEngine::delete_individual(&mut store, &id(victim)).expect("delete");

            assert!(store.individual(&id(victim)).is_none());
            assert!(store.families().all(|f| !f.mentions(&id(victim))));
            assert_consistent(&store);
        }
    }

    /// T3.3: Deleting twice is NotFound.
    #[test]
    fn repeated_delete_fails() {
        let mut store = nuclear();
        IntegrityEngine::delete_individual(&mut store, &id("I003")).expect("delete");
        assert!(matches!(
            IntegrityEngine::delete_individual(&mut store, &id("I003")),
            Err(FamtreeError::IndividualNotFound(_))
        ));
    }

    /// T3.4: The returned id is adjacent and still exists.
    #[test]
    fn adjacent_id_exists() {
        let mut store = nuclear();
        let adjacent = IntegrityEngine::delete_individual(&mut store, &id("I001")).expect("delete");
        assert_eq!(adjacent, Some(id("I002")));

        let adjacent = IntegrityEngine::delete_individual(&mut store, &id("I003")).expect("delete");
        assert_eq!(adjacent, Some(id("I002")));
        assert!(store.contains_individual(&id("I002")));
    }

    /// T3.6: Unlinking the only parent keeps the child's family.
    #[test]
    fn unlink_only_parent_keeps_children() {
        let mut store = store_with(2);
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Male)).expect("sex");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I002"), None).expect("child");

        IntegrityEngine::remove_spouse(&mut store, &id("I001"), None).expect("unlink");
        assert_eq!(store.family_count(), 1);
        assert_eq!(
            QueryEngine::new(&store).parents(&id("I002")).family,
            Some(fid("F001"))
        );
        assert!(store.get_individual(&id("I001")).expect("I001").spouse_families().is_empty());
        assert_consistent(&store);
    }

    /// T3.7: Unlinking one child of a single parent keeps the siblings' family.
    #[test]
    fn unlink_child_keeps_sibling_family() {
        let mut store = nuclear();
        store.create_individual();
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I004"), None).expect("child");
        IntegrityEngine::remove_spouse(&mut store, &id("I001"), None).expect("unlink");
        IntegrityEngine::remove_spouse(&mut store, &id("I002"), None).expect("unlink");
        assert_eq!(store.family_count(), 1);

        IntegrityEngine::remove_parents(&mut store, &id("I003")).expect("unlink");
        let family = store.get_family(&fid("F001")).expect("family survives");
        assert_eq!(family.children(), &[id("I004")]);
        assert_consistent(&store);

        IntegrityEngine::remove_parents(&mut store, &id("I004")).expect("unlink");
        assert_eq!(store.family_count(), 0);
        assert_consistent(&store);
    }

    /// T3.8: Deleting a family clears every reference to it.
    #[test]
    fn delete_family_is_symmetric() {
        let mut store = nuclear();
        IntegrityEngine::delete_family(&mut store, &fid("F001")).expect("delete");

        assert!(store.individuals().all(|i| i.spouse_families().is_empty()));
        assert!(store.individuals().all(|i| i.child_family().is_none()));
        assert_eq!(store.individual_count(), 3);
        assert!(matches!(
            IntegrityEngine::delete_family(&mut store, &fid("F001")),
            Err(FamtreeError::FamilyNotFound(_))
        ));
    }
}

// =============================================================================
// TIER T4: COLLATION AND PROJECTION
// =============================================================================

mod t4_projection {
    use super::*;
    use famtree_core::{ProjectionBuilder, ProjectionOptions, collate_descendants};
    use std::collections::BTreeSet;

    /// Two marriages, grandchildren, and an unrelated individual.
    fn extended() -> RecordStore {
        let mut store = store_with(8);
        IntegrityEngine::set_sex(&mut store, &id("I001"), Some(Sex::Male)).expect("sex");
        let first =
            IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I002"), None).expect("pair");
        let second =
            IntegrityEngine::set_spouse(&mut store, &id("I001"), &id("I003"), None).expect("pair");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I004"), Some(&first))
            .expect("child");
        IntegrityEngine::set_child(&mut store, &id("I001"), &id("I005"), Some(&second))
            .expect("child");
        IntegrityEngine::set_spouse(&mut store, &id("I004"), &id("I006"), None).expect("pair");
        IntegrityEngine::set_child(&mut store, &id("I004"), &id("I007"), None).expect("child");
        store
    }

    /// Everything reachable from `root` by children and default spouse.
    fn reachable(store: &RecordStore, root: &IndividualId) -> BTreeSet<IndividualId> {
        let query = QueryEngine::new(store);
        let mut seen = BTreeSet::new();
        let mut stack = vec![root.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(query.children(&current, None));
            stack.extend(query.spouse(&current, None).spouse);
        }
        seen
    }

    /// T4.1: Projecting a descendant collation covers every reachable node once.
    #[test]
    fn collated_projection_round_trip() {
        let store = extended();
        for root in ["I001", "I004", "I007"] {
            let root = id(root);
            let collated = collate_descendants(&store, &root, false).expect("collate");
            assert_consistent(&collated);

            let whole = ProjectionBuilder::build(&store, &ProjectionOptions::whole_store())
                .expect("whole store");
            let projection =
                ProjectionBuilder::build(&collated, &ProjectionOptions::whole_store())
                    .expect("collated");

            let nodes: Vec<_> = projection.nodes().map(|n| n.id.clone()).collect();
            let unique: BTreeSet<_> = nodes.iter().cloned().collect();
            assert_eq!(nodes.len(), unique.len(), "nodes appear once");

            for expected in reachable(&store, &root) {
                assert!(whole.contains_node(&expected));
                assert!(projection.contains_node(&expected), "{expected} missing");
            }
            assert!(!projection.contains_node(&id("I008")));
        }
    }

    /// T4.2: Collation leaves the source untouched.
    #[test]
    fn collation_does_not_mutate_source() {
        let store = extended();
        let before = store.clone();
        let _ = collate_descendants(&store, &id("I001"), true).expect("collate");
        assert_eq!(store, before);
    }
}
