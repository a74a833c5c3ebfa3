//! # Core Type Definitions
//!
//! This module contains the record types of the famtree store:
//! - Identifiers (`IndividualId`, `FamilyId`)
//! - Facts (`Sex`, `PartialDate`, `Event`, `Name`)
//! - Records (`Individual`, `Family`) and spouse slots (`Slot`)
//! - Editable attributes (`IndividualAttribute`, `FamilyAttribute`)
//! - Error types (`FamtreeError`)
//!
//! ## Reference Fields
//!
//! Relationship references (`FAMILY_SPOUSE`, `FAMILY_CHILD`, `HUSBAND`, `WIFE`,
//! `CHILD`) are crate-private. They can only change through the
//! [`RecordStore`](crate::RecordStore) primitives driven by the
//! [`IntegrityEngine`](crate::IntegrityEngine), which keep both sides of every
//! reference in step. Descriptive fields (names, events, notes) are public.

mod attribute;

pub use attribute::{EventField, FamilyAttribute, IndividualAttribute};

use crate::primitives::{FAMILY_ID_PREFIX, ID_DIGITS, INDIVIDUAL_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of an Individual record (`I001`, `I002`, ...).
///
/// Loaded documents may carry ids in other shapes; those are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndividualId(pub String);

impl IndividualId {
    /// Create an id from any string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The id allocated for sequence number `n`.
    #[must_use]
    pub fn numbered(n: u32) -> Self {
        Self(format!("{INDIVIDUAL_ID_PREFIX}{n:0width$}", width = ID_DIGITS))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndividualId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a Family record (`F001`, `F002`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(pub String);

impl FamilyId {
    /// Create an id from any string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The id allocated for sequence number `n`.
    #[must_use]
    pub fn numbered(n: u32) -> Self {
        Self(format!("{FAMILY_ID_PREFIX}{n:0width$}", width = ID_DIGITS))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FamilyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// SEX & SPOUSE SLOTS
// =============================================================================

/// Recorded sex of an individual. Unknown sex is `Option::<Sex>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }

    /// The single-letter document code (`M` / `F`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    /// Parse an optional sex; empty, `?` and `U` mean unknown.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, FamtreeError> {
        match s.trim() {
            "" | "?" | "U" | "u" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Sex {
    type Err = FamtreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            _ => Err(FamtreeError::InvalidAttribute(format!(
                "sex must be M or F, got '{s}'"
            ))),
        }
    }
}

/// A spouse position inside a Family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    Husband,
    Wife,
}

impl Slot {
    /// The slot an individual of the given sex belongs in.
    #[must_use]
    pub const fn for_sex(sex: Sex) -> Self {
        match sex {
            Sex::Male => Self::Husband,
            Sex::Female => Self::Wife,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Husband => Self::Wife,
            Self::Wife => Self::Husband,
        }
    }

    /// The sex implied by occupying this slot.
    #[must_use]
    pub const fn sex(self) -> Sex {
        match self {
            Self::Husband => Sex::Male,
            Self::Wife => Sex::Female,
        }
    }
}

// =============================================================================
// FACTS
// =============================================================================

/// A date where each of day, month and year may be missing.
///
/// Components are kept as text (`"3"`, `"Mar"`, `"1921"`), exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartialDate {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

impl PartialDate {
    #[must_use]
    pub fn new(day: Option<&str>, month: Option<&str>, year: Option<&str>) -> Self {
        Self {
            day: day.map(str::to_string),
            month: month.map(str::to_string),
            year: year.map(str::to_string),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.day, &self.month, &self.year]
            .iter()
            .all(|part| part.as_deref().is_none_or(|s| s.trim().is_empty()))
    }

    /// Render as `"day month year"` using only the parts that are present.
    ///
    /// Returns `None` when no part resolves.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.day, &self.month, &self.year]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A life or union event: an optional date and an optional place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "DATE", default)]
    pub date: Option<PartialDate>,
    #[serde(rename = "PLACE", default)]
    pub place: Option<String>,
}

impl Event {
    /// The event date, created on first use.
    pub fn date_mut(&mut self) -> &mut PartialDate {
        self.date.get_or_insert_with(PartialDate::default)
    }

    pub fn set_day(&mut self, day: impl Into<String>) {
        self.date_mut().day = Some(day.into());
    }

    pub fn set_month(&mut self, month: impl Into<String>) {
        self.date_mut().month = Some(month.into());
    }

    pub fn set_year(&mut self, year: impl Into<String>) {
        self.date_mut().year = Some(year.into());
    }

    pub fn set_place(&mut self, place: impl Into<String>) {
        self.place = Some(place.into());
    }

    /// Apply one field edit.
    pub fn apply(&mut self, field: EventField, value: &str) {
        match field {
            EventField::Day => self.set_day(value),
            EventField::Month => self.set_month(value),
            EventField::Year => self.set_year(value),
            EventField::Place => self.set_place(value),
        }
    }

    #[must_use]
    pub fn date_label(&self) -> Option<String> {
        self.date.as_ref().and_then(PartialDate::label)
    }
}

/// Personal name parts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Name {
    #[serde(default)]
    pub forename: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

fn non_empty(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

// =============================================================================
// INDIVIDUAL
// =============================================================================

/// A person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub(crate) id: IndividualId,

    #[serde(rename = "NAME", default)]
    pub name: Name,

    /// Display override shown between forename and surname.
    #[serde(rename = "ALIAS", default)]
    pub alias: Option<String>,

    #[serde(rename = "SEX", default)]
    pub(crate) sex: Option<Sex>,

    #[serde(rename = "BIRTH", default)]
    pub birth: Option<Event>,

    #[serde(rename = "DEATH", default)]
    pub death: Option<Event>,

    #[serde(rename = "BURIAL", default)]
    pub burial: Option<Event>,

    #[serde(rename = "NOTE", default)]
    pub note: Option<String>,

    /// Families in which this individual is husband or wife, in document order.
    #[serde(rename = "FAMILY_SPOUSE", default)]
    pub(crate) family_spouse: Vec<FamilyId>,

    /// The single family in which this individual is a child.
    #[serde(rename = "FAMILY_CHILD", default)]
    pub(crate) family_child: Option<FamilyId>,
}

impl Individual {
    /// Create a bare individual with no facts and no references.
    #[must_use]
    pub fn new(id: IndividualId) -> Self {
        Self {
            id,
            name: Name::default(),
            alias: None,
            sex: None,
            birth: None,
            death: None,
            burial: None,
            note: None,
            family_spouse: Vec::new(),
            family_child: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &IndividualId {
        &self.id
    }

    #[must_use]
    pub fn sex(&self) -> Option<Sex> {
        self.sex
    }

    /// Spousal family references, in document order.
    #[must_use]
    pub fn spouse_families(&self) -> &[FamilyId] {
        &self.family_spouse
    }

    #[must_use]
    pub fn child_family(&self) -> Option<&FamilyId> {
        self.family_child.as_ref()
    }

    #[must_use]
    pub fn forename(&self) -> Option<&str> {
        non_empty(self.name.forename.as_ref())
    }

    #[must_use]
    pub fn surname(&self) -> Option<&str> {
        non_empty(self.name.surname.as_ref())
    }

    pub fn set_forename(&mut self, forename: impl Into<String>) {
        self.name.forename = Some(forename.into());
    }

    pub fn set_surname(&mut self, surname: impl Into<String>) {
        self.name.surname = Some(surname.into());
    }

    pub fn birth_mut(&mut self) -> &mut Event {
        self.birth.get_or_insert_with(Event::default)
    }

    pub fn death_mut(&mut self) -> &mut Event {
        self.death.get_or_insert_with(Event::default)
    }

    pub fn burial_mut(&mut self) -> &mut Event {
        self.burial.get_or_insert_with(Event::default)
    }

    /// Apply a descriptive attribute edit.
    ///
    /// Sex is not descriptive: it constrains spouse slots and must be changed
    /// through [`IntegrityEngine::set_sex`](crate::IntegrityEngine::set_sex).
    pub fn apply(&mut self, attribute: IndividualAttribute, value: &str) -> Result<(), FamtreeError> {
        match attribute {
            IndividualAttribute::Forename => self.set_forename(value),
            IndividualAttribute::Surname => self.set_surname(value),
            IndividualAttribute::Alias => self.alias = Some(value.to_string()),
            IndividualAttribute::Note => self.note = Some(value.to_string()),
            IndividualAttribute::Birth(field) => self.birth_mut().apply(field, value),
            IndividualAttribute::Death(field) => self.death_mut().apply(field, value),
            IndividualAttribute::Burial(field) => self.burial_mut().apply(field, value),
            IndividualAttribute::Sex => {
                return Err(FamtreeError::InvalidAttribute(
                    "sex changes must go through the integrity engine".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// `forename 'alias' surname`, omitting missing parts.
    #[must_use]
    pub fn display_name(&self) -> String {
        let alias = non_empty(self.alias.as_ref()).map(|a| format!("'{a}'"));
        [self.forename().map(str::to_string), alias, self.surname().map(str::to_string)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `Surname, Forename I001` for sorted listings.
    #[must_use]
    pub fn sort_label(&self) -> String {
        match (self.surname(), self.forename()) {
            (Some(surname), Some(forename)) => format!("{surname}, {forename} {}", self.id),
            (Some(surname), None) => format!("{surname} {}", self.id),
            (None, Some(forename)) => format!("{forename} {}", self.id),
            (None, None) => self.id.to_string(),
        }
    }

    /// Title-cased name parts with all whitespace removed, or the id when
    /// the individual has no name. Suitable for file names.
    #[must_use]
    pub fn compact_name(&self) -> String {
        let label: String = [
            self.surname().map(title_case),
            self.forename().map(title_case),
            non_empty(self.alias.as_ref()).map(str::to_string),
        ]
        .into_iter()
        .flatten()
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

        if label.is_empty() {
            self.id.to_string()
        } else {
            label
        }
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// FAMILY
// =============================================================================

/// A union record: zero-or-one husband, zero-or-one wife, ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub(crate) id: FamilyId,

    #[serde(rename = "HUSBAND", default)]
    pub(crate) husband: Option<IndividualId>,

    #[serde(rename = "WIFE", default)]
    pub(crate) wife: Option<IndividualId>,

    #[serde(rename = "CHILD", default)]
    pub(crate) children: Vec<IndividualId>,

    #[serde(rename = "MARRIAGE", default)]
    pub marriage: Option<Event>,

    #[serde(rename = "DIVORCE", default)]
    pub divorce: Option<Event>,

    #[serde(rename = "NOTE", default)]
    pub note: Option<String>,
}

impl Family {
    #[must_use]
    pub fn new(id: FamilyId) -> Self {
        Self {
            id,
            husband: None,
            wife: None,
            children: Vec::new(),
            marriage: None,
            divorce: None,
            note: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &FamilyId {
        &self.id
    }

    #[must_use]
    pub fn husband(&self) -> Option<&IndividualId> {
        self.husband.as_ref()
    }

    #[must_use]
    pub fn wife(&self) -> Option<&IndividualId> {
        self.wife.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &[IndividualId] {
        &self.children
    }

    #[must_use]
    pub fn slot(&self, slot: Slot) -> Option<&IndividualId> {
        match slot {
            Slot::Husband => self.husband.as_ref(),
            Slot::Wife => self.wife.as_ref(),
        }
    }

    /// Which spouse slot, if any, holds `id`.
    #[must_use]
    pub fn slot_of(&self, id: &IndividualId) -> Option<Slot> {
        if self.husband.as_ref() == Some(id) {
            Some(Slot::Husband)
        } else if self.wife.as_ref() == Some(id) {
            Some(Slot::Wife)
        } else {
            None
        }
    }

    /// The occupant of the slot opposite to `id`'s slot.
    #[must_use]
    pub fn partner_of(&self, id: &IndividualId) -> Option<&IndividualId> {
        self.slot_of(id).and_then(|slot| self.slot(slot.other()))
    }

    #[must_use]
    pub fn has_child(&self, id: &IndividualId) -> bool {
        self.children.contains(id)
    }

    /// True if `id` appears as husband, wife or child.
    #[must_use]
    pub fn mentions(&self, id: &IndividualId) -> bool {
        self.slot_of(id).is_some() || self.has_child(id)
    }

    #[must_use]
    pub fn has_spouse(&self) -> bool {
        self.husband.is_some() || self.wife.is_some()
    }

    /// No husband, no wife and no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_spouse() && self.children.is_empty()
    }

    /// Every individual the family names, spouses first.
    pub fn members(&self) -> impl Iterator<Item = &IndividualId> {
        self.husband
            .iter()
            .chain(self.wife.iter())
            .chain(self.children.iter())
    }

    pub fn marriage_mut(&mut self) -> &mut Event {
        self.marriage.get_or_insert_with(Event::default)
    }

    pub fn divorce_mut(&mut self) -> &mut Event {
        self.divorce.get_or_insert_with(Event::default)
    }

    /// Apply a descriptive attribute edit.
    pub fn apply(&mut self, attribute: FamilyAttribute, value: &str) {
        match attribute {
            FamilyAttribute::Marriage(field) => self.marriage_mut().apply(field, value),
            FamilyAttribute::Divorce(field) => self.divorce_mut().apply(field, value),
            FamilyAttribute::Note => self.note = Some(value.to_string()),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in famtree.
///
/// - Mutations that fail leave the store untouched
/// - Queries never fail on missing relationships
/// - The core never panics
#[derive(Debug, Error)]
pub enum FamtreeError {
    /// The referenced individual does not exist.
    #[error("Individual not found: {0}")]
    IndividualNotFound(IndividualId),

    /// The referenced family does not exist.
    #[error("Family not found: {0}")]
    FamilyNotFound(FamilyId),

    /// A store invariant is violated (duplicate id, dangling reference, cycle).
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// The requested relationship cannot be formed.
    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    /// An attribute name or value could not be understood.
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl FamtreeError {
    /// True for either not-found variant.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IndividualNotFound(_) | Self::FamilyNotFound(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_ids_are_fixed_width() {
        assert_eq!(IndividualId::numbered(1).as_str(), "I001");
        assert_eq!(FamilyId::numbered(42).as_str(), "F042");
        assert_eq!(IndividualId::numbered(1234).as_str(), "I1234");
    }

    #[test]
    fn sex_parsing() {
        assert_eq!("M".parse::<Sex>().expect("parse"), Sex::Male);
        assert_eq!("female".parse::<Sex>().expect("parse"), Sex::Female);
        assert!("X".parse::<Sex>().is_err());
        assert_eq!(Sex::parse_optional("?").expect("parse"), None);
        assert_eq!(Sex::Male.opposite(), Sex::Female);
    }

    #[test]
    fn partial_date_label_skips_missing_parts() {
        assert_eq!(
            PartialDate::new(Some("3"), Some("Mar"), Some("1921")).label(),
            Some("3 Mar 1921".to_string())
        );
        assert_eq!(
            PartialDate::new(None, None, Some("1921")).label(),
            Some("1921".to_string())
        );
        assert_eq!(PartialDate::default().label(), None);
        assert!(PartialDate::new(Some(" "), None, None).is_empty());
    }

    #[test]
    fn event_setters_create_date_on_first_use() {
        let mut event = Event::default();
        assert!(event.date.is_none());

        event.set_year("1900");
        event.set_day("7");
        assert_eq!(event.date_label(), Some("7 1900".to_string()));

        event.apply(EventField::Place, "Leeds");
        assert_eq!(event.place.as_deref(), Some("Leeds"));
    }

    #[test]
    fn display_name_includes_alias() {
        let mut individual = Individual::new(IndividualId::numbered(1));
        individual.set_forename("Albert");
        individual.set_surname("Smith");
        assert_eq!(individual.display_name(), "Albert Smith");

        individual.alias = Some("Bertie".to_string());
        assert_eq!(individual.display_name(), "Albert 'Bertie' Smith");
        assert_eq!(individual.sort_label(), "Smith, Albert I001");
    }

    #[test]
    fn compact_name_falls_back_to_id() {
        let mut individual = Individual::new(IndividualId::numbered(7));
        assert_eq!(individual.compact_name(), "I007");

        individual.set_surname("van dyke");
        individual.set_forename("mary ann");
        assert_eq!(individual.compact_name(), "VanDykeMaryAnn");
    }

    #[test]
    fn apply_rejects_sex() {
        let mut individual = Individual::new(IndividualId::numbered(1));
        assert!(individual.apply(IndividualAttribute::Sex, "M").is_err());

        individual
            .apply(IndividualAttribute::Birth(EventField::Year), "1850")
            .expect("apply");
        assert_eq!(
            individual.birth.as_ref().and_then(Event::date_label),
            Some("1850".to_string())
        );
    }

    #[test]
    fn burial_takes_a_date() {
        let mut individual = Individual::new(IndividualId::numbered(1));
        for (name, value) in [("burial.day", "3"), ("burial.month", "May"), ("burial.year", "1921")] {
            individual.apply(name.parse().expect("attribute"), value).expect("apply");
        }
        individual
            .apply(IndividualAttribute::Burial(EventField::Place), "Leeds")
            .expect("apply");

        let burial = individual.burial.as_ref().expect("burial created");
        assert_eq!(burial.date_label(), Some("3 May 1921".to_string()));
        assert_eq!(burial.place.as_deref(), Some("Leeds"));
        assert!(individual.death.is_none());
    }

    #[test]
    fn family_slots_and_partner() {
        let mut family = Family::new(FamilyId::numbered(1));
        let husband = IndividualId::numbered(1);
        let wife = IndividualId::numbered(2);
        family.husband = Some(husband.clone());
        family.wife = Some(wife.clone());

        assert_eq!(family.slot_of(&husband), Some(Slot::Husband));
        assert_eq!(family.partner_of(&husband), Some(&wife));
        assert_eq!(family.partner_of(&IndividualId::numbered(3)), None);
        assert!(!family.is_empty());
    }
}
