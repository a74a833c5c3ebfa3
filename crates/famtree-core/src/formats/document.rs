//! # Store Document
//!
//! The serializable snapshot of a store: both record collections in store
//! order. The JSON form is a top-level object with `individuals` and
//! `families` arrays using the upper-case field names of the records.

use crate::{Family, FamilyId, FamtreeError, Individual, IndividualId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub individuals: Vec<Individual>,
    #[serde(default)]
    pub families: Vec<Family>,
}

impl StoreDocument {
    /// The only individual carrying `id`.
    ///
    /// Returns `Ok(None)` when absent and `DataIntegrity` when the id is
    /// not unique in the document.
    pub fn individual_by_unique_id(
        &self,
        id: &IndividualId,
    ) -> Result<Option<&Individual>, FamtreeError> {
        let mut matches = self.individuals.iter().filter(|i| i.id() == id);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(FamtreeError::DataIntegrity(format!(
                "individual id {id} is not unique"
            )));
        }
        Ok(first)
    }

    /// The only family carrying `id`.
    pub fn family_by_unique_id(&self, id: &FamilyId) -> Result<Option<&Family>, FamtreeError> {
        let mut matches = self.families.iter().filter(|f| f.id() == id);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(FamtreeError::DataIntegrity(format!(
                "family id {id} is not unique"
            )));
        }
        Ok(first)
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.individuals.len().saturating_add(self.families.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
