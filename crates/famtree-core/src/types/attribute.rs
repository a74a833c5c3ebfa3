//! Editable attribute names.
//!
//! Attributes are addressed by dotted names such as `birth.year` or
//! `marriage.place`, mirroring the nesting of the stored document.

use super::FamtreeError;
use std::fmt;
use std::str::FromStr;

/// One field of an [`Event`](super::Event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    Day,
    Month,
    Year,
    Place,
}

impl EventField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "place" => Some(Self::Place),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Place => "place",
        }
    }
}

/// Attributes of an Individual that can be edited by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndividualAttribute {
    Forename,
    Surname,
    Alias,
    Sex,
    Birth(EventField),
    Death(EventField),
    Burial(EventField),
    Note,
}

impl IndividualAttribute {
    /// Every attribute name accepted by `from_str`.
    pub const NAMES: &'static [&'static str] = &[
        "forename",
        "surname",
        "alias",
        "sex",
        "birth.day",
        "birth.month",
        "birth.year",
        "birth.place",
        "death.day",
        "death.month",
        "death.year",
        "death.place",
        "burial.day",
        "burial.month",
        "burial.year",
        "burial.place",
        "note",
    ];
}

impl FromStr for IndividualAttribute {
    type Err = FamtreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let parsed = match key.split_once('.') {
            None => match key.as_str() {
                "forename" => Some(Self::Forename),
                "surname" => Some(Self::Surname),
                "alias" => Some(Self::Alias),
                "sex" => Some(Self::Sex),
                "note" => Some(Self::Note),
                _ => None,
            },
            Some(("birth", field)) => EventField::parse(field).map(Self::Birth),
            Some(("death", field)) => EventField::parse(field).map(Self::Death),
            Some(("burial", field)) => EventField::parse(field).map(Self::Burial),
            Some(_) => None,
        };

        parsed.ok_or_else(|| {
            FamtreeError::InvalidAttribute(format!(
                "unknown individual attribute '{s}' (expected one of: {})",
                Self::NAMES.join(", ")
            ))
        })
    }
}

impl fmt::Display for IndividualAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forename => f.write_str("forename"),
            Self::Surname => f.write_str("surname"),
            Self::Alias => f.write_str("alias"),
            Self::Sex => f.write_str("sex"),
            Self::Birth(field) => write!(f, "birth.{}", field.name()),
            Self::Death(field) => write!(f, "death.{}", field.name()),
            Self::Burial(field) => write!(f, "burial.{}", field.name()),
            Self::Note => f.write_str("note"),
        }
    }
}

/// Attributes of a Family that can be edited by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FamilyAttribute {
    Marriage(EventField),
    Divorce(EventField),
    Note,
}

impl FamilyAttribute {
    pub const NAMES: &'static [&'static str] = &[
        "marriage.day",
        "marriage.month",
        "marriage.year",
        "marriage.place",
        "divorce.day",
        "divorce.month",
        "divorce.year",
        "divorce.place",
        "note",
    ];
}

impl FromStr for FamilyAttribute {
    type Err = FamtreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let parsed = match key.split_once('.') {
            None if key == "note" => Some(Self::Note),
            Some(("marriage", field)) => EventField::parse(field).map(Self::Marriage),
            Some(("divorce", field)) => EventField::parse(field).map(Self::Divorce),
            _ => None,
        };

        parsed.ok_or_else(|| {
            FamtreeError::InvalidAttribute(format!(
                "unknown family attribute '{s}' (expected one of: {})",
                Self::NAMES.join(", ")
            ))
        })
    }
}

impl fmt::Display for FamilyAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marriage(field) => write!(f, "marriage.{}", field.name()),
            Self::Divorce(field) => write!(f, "divorce.{}", field.name()),
            Self::Note => f.write_str("note"),
        }
    }
}
