//! Summary figures over a whole store, computed with integer math only.

use crate::primitives::MAX_GENERATIONS;
use crate::{IndividualId, QueryEngine, RecordStore};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts describing the shape of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    pub individual_count: usize,
    pub family_count: usize,
    /// Families with both spouse slots filled.
    pub union_count: usize,
    /// Individuals with no resolvable parent.
    pub root_count: usize,
    /// Individuals in no family at all.
    pub isolated_count: usize,
    /// Longest parent-to-child chain, counted in individuals.
    pub max_generations: usize,
}

impl StoreMetrics {
    #[must_use]
    pub fn from_store(store: &RecordStore) -> Self {
        let query = QueryEngine::new(store);
        let mut root_count = 0usize;
        let mut isolated_count = 0usize;
        for individual in store.individuals() {
            let parents = query.parents(individual.id());
            if parents.mother.is_none() && parents.father.is_none() {
                root_count = root_count.saturating_add(1);
            }
            if store.memberships(individual.id()).next().is_none() {
                isolated_count = isolated_count.saturating_add(1);
            }
        }

        Self {
            individual_count: store.individual_count(),
            family_count: store.family_count(),
            union_count: store
                .families()
                .filter(|f| f.husband().is_some() && f.wife().is_some())
                .count(),
            root_count,
            isolated_count,
            max_generations: max_generations(store),
        }
    }
}

/// Generation depth of every individual, memoised. An individual on a cycle
/// counts as a root where the cycle closes.
fn max_generations(store: &RecordStore) -> usize {
    let query = QueryEngine::new(store);
    let mut depth: BTreeMap<IndividualId, usize> = BTreeMap::new();
    let mut deepest = 0usize;

    for individual in store.individuals() {
        let mut stack = vec![(individual.id().clone(), false)];
        let mut on_path: Vec<IndividualId> = Vec::new();
        while let Some((current, expanded)) = stack.pop() {
            if depth.contains_key(&current) {
                continue;
            }
            let parents = query.parents(&current);
            let parent_ids: Vec<IndividualId> =
                [parents.mother, parents.father].into_iter().flatten().collect();

            if expanded {
                on_path.retain(|id| *id != current);
                let above = parent_ids
                    .iter()
                    .filter_map(|p| depth.get(p))
                    .copied()
                    .max()
                    .unwrap_or(0);
                depth.insert(current, above.saturating_add(1).min(MAX_GENERATIONS));
                continue;
            }

            on_path.push(current.clone());
            stack.push((current, true));
            for parent in parent_ids {
                if !depth.contains_key(&parent) && !on_path.contains(&parent) {
                    stack.push((parent, false));
                }
            }
        }
        if let Some(d) = depth.get(individual.id()) {
            deepest = deepest.max(*d);
        }
    }
    deepest
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntegrityEngine;

    #[test]
    fn empty_store() {
        assert_eq!(
            StoreMetrics::from_store(&RecordStore::new()),
            StoreMetrics::default()
        );
    }

    #[test]
    fn three_generations() {
        let mut store = RecordStore::new();
        let ids: Vec<_> = (0..5).map(|_| store.create_individual()).collect();
        IntegrityEngine::set_spouse(&mut store, &ids[0], &ids[1], None).expect("pair");
        IntegrityEngine::set_child(&mut store, &ids[0], &ids[2], None).expect("child");
        IntegrityEngine::set_father(&mut store, &ids[3], &ids[2]).expect("father");

        let metrics = StoreMetrics::from_store(&store);
        assert_eq!(metrics.individual_count, 5);
        assert_eq!(metrics.family_count, 2);
        assert_eq!(metrics.union_count, 1);
        // I001, I002 and I005 have no parents.
        assert_eq!(metrics.root_count, 3);
        assert_eq!(metrics.isolated_count, 1);
        assert_eq!(metrics.max_generations, 3);
    }
}
