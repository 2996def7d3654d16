//! Actor roles and the phases each one owns.
//!
//! Role resolution and enforcement happen before the engine is called; the
//! engine itself only records who acted.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::Phase;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Ceo,
    Admin,
    Commercial,
    Technical,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ceo => "CEO",
            Self::Admin => "ADMIN",
            Self::Commercial => "COMMERCIAL",
            Self::Technical => "TECHNICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CEO" => Some(Self::Ceo),
            "ADMIN" => Some(Self::Admin),
            "COMMERCIAL" => Some(Self::Commercial),
            "TECHNICAL" => Some(Self::Technical),
            _ => None,
        }
    }

    fn is_manager(&self) -> bool {
        matches!(self, Self::Ceo | Self::Admin)
    }

    /// Whether this role may write the given phase
    pub fn can_edit(&self, phase: Phase) -> bool {
        self.is_manager()
            || match phase {
                Phase::Commercial => *self == Self::Commercial,
                Phase::Technical | Phase::Installation => *self == Self::Technical,
                Phase::Homologation => false,
            }
    }

    /// Kit purchase and document management
    pub fn can_manage_back_office(&self) -> bool {
        self.is_manager()
    }

    /// Project deletion is reserved for the highest-privilege role
    pub fn can_delete_projects(&self) -> bool {
        *self == Self::Ceo
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
