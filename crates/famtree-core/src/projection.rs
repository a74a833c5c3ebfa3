//! # Graph Projection Builder
//!
//! Builds a renderable node/edge structure from the store.
//!
//! Every add is add-if-absent: nodes are keyed by individual id, union edges
//! by the unordered pair of spouses, descent edges by `(parent, child)` and
//! groups by `(kind, family)`. Walks revisit shared relatives freely and the
//! projection stays duplicate-free.
//!
//! ## Modes
//!
//! - **Whole store**: one node per individual, a union edge per spousal
//!   family and a descent edge per parent/child link.
//! - **Rooted, ancestors**: strictly upward from the root.
//! - **Rooted, descendants**: strictly downward through every spousal
//!   family of every descendant.
//! - **Rooted, neither**: the root with spouses, parents, children and
//!   siblings.
//!
//! A descent edge starts at the family's mother, or its father when there is
//! no mother; the parent pair is grouped so the renderer can lay it out
//! together.

use crate::primitives::MAX_GENERATIONS;
use crate::{Family, FamilyId, FamtreeError, IndividualId, QueryEngine, RecordStore, Sex};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

// =============================================================================
// PROJECTION TYPES
// =============================================================================

/// Shape hint for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    /// Males.
    Box,
    /// Everyone else.
    Ellipse,
}

impl NodeShape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Ellipse => "ellipse",
        }
    }
}

/// One individual in the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionNode {
    pub id: IndividualId,
    pub shape: NodeShape,
    /// Id, name, then `b.`, `m.` and `d.` lines for the dates that resolved.
    pub label: Vec<String>,
}

/// Distinguishes the husband's marriage pass from the wife/descendant pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnionStrength {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProjectionEdge {
    /// A single edge between spouses, drawn with markers at both ends.
    Union {
        family: FamilyId,
        husband: IndividualId,
        wife: IndividualId,
        strength: UnionStrength,
        both_ends: bool,
    },
    /// Parent to child.
    Descent {
        family: FamilyId,
        parent: IndividualId,
        child: IndividualId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Couple,
    ParentPair,
}

/// A layout hint: these nodes belong together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionGroup {
    pub kind: GroupKind,
    pub family: FamilyId,
    pub members: Vec<IndividualId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeKey {
    Union(IndividualId, IndividualId),
    Descent(IndividualId, IndividualId),
}

/// The node/edge/group structure handed to a renderer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Projection {
    nodes: IndexMap<IndividualId, ProjectionNode>,
    edges: Vec<ProjectionEdge>,
    groups: Vec<ProjectionGroup>,
    #[serde(skip)]
    edge_keys: BTreeSet<EdgeKey>,
    #[serde(skip)]
    group_keys: BTreeSet<(GroupKind, FamilyId)>,
}

impl Projection {
    /// Nodes in the order they were first added.
    pub fn nodes(&self) -> impl Iterator<Item = &ProjectionNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node(&self, id: &IndividualId) -> Option<&ProjectionNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains_node(&self, id: &IndividualId) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn edges(&self) -> &[ProjectionEdge] {
        &self.edges
    }

    #[must_use]
    pub fn groups(&self) -> &[ProjectionGroup] {
        &self.groups
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// What to project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// `None` projects the whole store.
    pub root: Option<IndividualId>,
    pub ancestors: bool,
    pub descendants: bool,
}

impl ProjectionOptions {
    #[must_use]
    pub fn whole_store() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rooted(root: IndividualId) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ancestors(mut self, ancestors: bool) -> Self {
        self.ancestors = ancestors;
        self
    }

    #[must_use]
    pub fn with_descendants(mut self, descendants: bool) -> Self {
        self.descendants = descendants;
        self
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Walks a store and accumulates a [`Projection`].
pub struct ProjectionBuilder<'a> {
    store: &'a RecordStore,
    query: QueryEngine<'a>,
    projection: Projection,
}

impl<'a> ProjectionBuilder<'a> {
    #[must_use]
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            query: QueryEngine::new(store),
            projection: Projection::default(),
        }
    }

    /// Build a projection in one call.
    pub fn build(
        store: &'a RecordStore,
        options: &ProjectionOptions,
    ) -> Result<Projection, FamtreeError> {
        let mut builder = Self::new(store);
        match &options.root {
            None => builder.add_whole_store(),
            Some(root) => {
                store.get_individual(root)?;
                builder.add_node(root);
                if options.descendants {
                    builder.add_descendants(root);
                }
                if options.ancestors {
                    builder.add_ancestors(root);
                }
                if !options.ancestors && !options.descendants {
                    builder.add_neighbourhood(root);
                }
            }
        }
        Ok(builder.finish())
    }

    #[must_use]
    pub fn finish(self) -> Projection {
        self.projection
    }

    // -------------------------------------------------------------------------
    // Modes
    // -------------------------------------------------------------------------

    /// One node per individual with all spouse and parent edges.
    pub fn add_whole_store(&mut self) {
        let store = self.store;
        for individual in store.individuals() {
            self.add_node(individual.id());
            for family in individual.spouse_families() {
                self.add_union(family, UnionStrength::Primary);
            }
            self.add_parents(individual.id());
        }
    }

    /// The root's parents, their parents, and so on. Mother's line first.
    pub fn add_ancestors(&mut self, root: &IndividualId) {
        let mut seen = BTreeSet::new();
        let mut stack = vec![(root.clone(), 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if !seen.insert(current.clone()) || depth >= MAX_GENERATIONS {
                continue;
            }
            let parents = self.query.parents(&current);
            if let Some(family) = &parents.family {
                self.add_union(family, UnionStrength::Primary);
            }
            self.add_parents(&current);

            let next = depth.saturating_add(1);
            for parent in [parents.father, parents.mother].into_iter().flatten() {
                stack.push((parent, next));
            }
        }
    }

    /// Every spousal family of the root and of each descendant.
    pub fn add_descendants(&mut self, root: &IndividualId) {
        let mut seen = BTreeSet::new();
        let mut stack = vec![(root.clone(), 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if !seen.insert(current.clone()) || depth >= MAX_GENERATIONS {
                continue;
            }
            let children = self.add_children(&current);

            let next = depth.saturating_add(1);
            for child in children.into_iter().rev() {
                stack.push((child, next));
            }
        }
    }

    /// The root with its spouses, parents, children and siblings.
    pub fn add_neighbourhood(&mut self, root: &IndividualId) {
        self.add_spouses(root);
        self.add_parents(root);
        self.add_children(root);
        for sibling in self.query.siblings(root).siblings {
            self.add_node(&sibling);
            self.add_spouses(&sibling);
            self.add_parents(&sibling);
        }
    }

    // -------------------------------------------------------------------------
    // Pieces
    // -------------------------------------------------------------------------

    fn add_spouses(&mut self, id: &IndividualId) {
        let families = self
            .store
            .individual(id)
            .map(|individual| individual.spouse_families().to_vec())
            .unwrap_or_default();
        for family in &families {
            self.add_union(family, UnionStrength::Primary);
        }
    }

    /// Descent edge from `id`'s representative parent, plus a parent-pair
    /// group when both parents are known.
    fn add_parents(&mut self, id: &IndividualId) {
        let parents = self.query.parents(id);
        let Some(family) = parents.family else {
            return;
        };
        if let (Some(mother), Some(father)) = (&parents.mother, &parents.father) {
            self.add_group(GroupKind::ParentPair, &family, &[mother, father]);
        }
        if let Some(parent) = parents.mother.or(parents.father) {
            self.add_descent(&family, &parent, id);
        }
    }

    /// Union and descent edges for each spousal family of `id`. Returns the
    /// children reached, in store order.
    fn add_children(&mut self, id: &IndividualId) -> Vec<IndividualId> {
        let store = self.store;
        let Some(individual) = store.individual(id) else {
            return Vec::new();
        };
        self.add_node(id);

        let mut reached = Vec::new();
        for family in individual
            .spouse_families()
            .iter()
            .filter_map(|family_id| store.family(family_id))
        {
            self.add_union(family.id(), UnionStrength::Secondary);
            let Some(parent) = representative_parent(family) else {
                continue;
            };
            for child in family.children() {
                self.add_descent(family.id(), parent, child);
                if !reached.contains(child) {
                    reached.push(child.clone());
                }
            }
        }
        reached
    }

    fn add_union(&mut self, family_id: &FamilyId, strength: UnionStrength) {
        let Some(family) = self.store.family(family_id) else {
            return;
        };
        let (Some(husband), Some(wife)) = (family.husband(), family.wife()) else {
            return;
        };
        let (husband, wife) = (husband.clone(), wife.clone());

        self.add_group(GroupKind::Couple, family_id, &[&husband, &wife]);
        let key = if husband <= wife {
            EdgeKey::Union(husband.clone(), wife.clone())
        } else {
            EdgeKey::Union(wife.clone(), husband.clone())
        };
        if self.projection.edge_keys.insert(key) {
            self.projection.edges.push(ProjectionEdge::Union {
                family: family_id.clone(),
                husband,
                wife,
                strength,
                both_ends: true,
            });
        }
    }

    fn add_descent(&mut self, family: &FamilyId, parent: &IndividualId, child: &IndividualId) {
        self.add_node(parent);
        self.add_node(child);
        let key = EdgeKey::Descent(parent.clone(), child.clone());
        if self.projection.edge_keys.insert(key) {
            self.projection.edges.push(ProjectionEdge::Descent {
                family: family.clone(),
                parent: parent.clone(),
                child: child.clone(),
            });
        }
    }

    fn add_group(&mut self, kind: GroupKind, family: &FamilyId, members: &[&IndividualId]) {
        for member in members {
            self.add_node(member);
        }
        if self.projection.group_keys.insert((kind, family.clone())) {
            self.projection.groups.push(ProjectionGroup {
                kind,
                family: family.clone(),
                members: members.iter().map(|m| (*m).clone()).collect(),
            });
        }
    }

    fn add_node(&mut self, id: &IndividualId) {
        if self.projection.nodes.contains_key(id) {
            return;
        }
        let Some(individual) = self.store.individual(id) else {
            return;
        };

        let mut label = vec![id.to_string()];
        let name = individual.display_name();
        if !name.is_empty() {
            label.push(name);
        }
        if let Some(date) = individual.birth.as_ref().and_then(|e| e.date_label()) {
            label.push(format!("b. {date}"));
        }
        if let Some(date) = self.query.spouse(id, None).marriage.and_then(|d| d.label()) {
            label.push(format!("m. {date}"));
        }
        if let Some(date) = individual.death.as_ref().and_then(|e| e.date_label()) {
            label.push(format!("d. {date}"));
        }

        let shape = match individual.sex() {
            Some(Sex::Male) => NodeShape::Box,
            _ => NodeShape::Ellipse,
        };
        self.projection.nodes.insert(
            id.clone(),
            ProjectionNode {
                id: id.clone(),
                shape,
                label,
            },
        );
    }
}

/// The mother, or the father when there is no mother.
fn representative_parent(family: &Family) -> Option<&IndividualId> {
    family.wife().or(family.husband())
}

// =============================================================================
// TESTS
// =============================================================================
