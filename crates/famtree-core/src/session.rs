//! # Session Module
//!
//! A store plus a volatile "selected individual" cursor, as an editor would
//! hold it. The selection is never serialized and is not part of the store.

use crate::{FamtreeError, IndividualId, IntegrityEngine, RecordStore};

#[derive(Debug, Default)]
pub struct Session {
    store: RecordStore,
    selected: Option<IndividualId>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session over an existing store, selecting its first individual.
    #[must_use]
    pub fn with_store(store: RecordStore) -> Self {
        let selected = store.individuals().next().map(|i| i.id().clone());
        Self { store, selected }
    }

    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    #[must_use]
    pub fn into_store(self) -> RecordStore {
        self.store
    }

    #[must_use]
    pub fn selected(&self) -> Option<&IndividualId> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, id: &IndividualId) -> Result<(), FamtreeError> {
        self.store.get_individual(id)?;
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Create an individual and select it.
    pub fn create_individual(&mut self) -> IndividualId {
        let id = self.store.create_individual();
        self.selected = Some(id.clone());
        id
    }

    /// Delete an individual with full cascade.
    ///
    /// If the deleted individual was selected, the selection moves to the
    /// adjacent individual (previous, else next), or clears.
    pub fn delete_individual(
        &mut self,
        id: &IndividualId,
    ) -> Result<Option<IndividualId>, FamtreeError> {
        let adjacent = IntegrityEngine::delete_individual(&mut self.store, id)?;
        if self.selected.as_ref() == Some(id) {
            self.selected.clone_from(&adjacent);
        }
        Ok(adjacent)
    }
}

// =============================================================================
// TESTS
// =============================================================================
