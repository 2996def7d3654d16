//! # Precondition Validators
//!
//! Pure checks run before a phase is moved to its advance status. They
//! never touch storage and never fail; an incomplete phase comes back as
//! [`Precondition::Unsatisfied`] with the names of the missing fields.

use serde::Serialize;

use super::attributes::{
    filled, CommercialAttributes, InstallationAttributes, PhaseAttributes, PhotoSlot,
    TechnicalAttributes,
};
use super::model::{Document, DocumentationStatus};

/// Outcome of a precondition check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Precondition {
    Satisfied,
    Unsatisfied { missing: Vec<String> },
}

impl Precondition {
    fn from_missing(missing: Vec<String>) -> Self {
        if missing.is_empty() {
            Self::Satisfied
        } else {
            Self::Unsatisfied { missing }
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Everything a validator may look at
pub struct ValidationInput<'a> {
    pub incoming: &'a PhaseAttributes,
    pub existing: &'a PhaseAttributes,
    pub pendencies: Option<&'a str>,
    /// Only consulted by the homologation gate
    pub documents: &'a [Document],
}

/// Check whether `input` allows the phase to advance
pub fn check(input: &ValidationInput<'_>) -> Precondition {
    match (input.incoming, input.existing) {
        (PhaseAttributes::Commercial(attrs), _) => check_commercial(attrs),
        (PhaseAttributes::Technical(attrs), _) => check_technical(attrs),
        (PhaseAttributes::Installation(incoming), PhaseAttributes::Installation(existing)) => {
            check_installation(incoming, existing, input.pendencies)
        }
        (PhaseAttributes::Installation(incoming), _) => {
            check_installation(incoming, &InstallationAttributes::default(), input.pendencies)
        }
        (PhaseAttributes::Homologation, _) => check_homologation(input.documents),
    }
}

pub fn check_commercial(attrs: &CommercialAttributes) -> Precondition {
    let mut missing = Vec::new();
    if !filled(&attrs.proposal_value) {
        missing.push("proposal_value".to_string());
    }
    if attrs.payment_method.is_none() {
        missing.push("payment_method".to_string());
    }
    Precondition::from_missing(missing)
}

pub fn check_technical(attrs: &TechnicalAttributes) -> Precondition {
    let text_fields = [
        ("entrance_pattern", &attrs.entrance_pattern),
        ("grounding", &attrs.grounding),
        ("roof_structure", &attrs.roof_structure),
        ("roof_overview", &attrs.roof_overview),
        ("breaker_box", &attrs.breaker_box),
    ];

    let mut missing: Vec<String> = text_fields
        .iter()
        .filter(|(_, value)| !filled(value))
        .map(|(name, _)| name.to_string())
        .collect();

    if attrs.structure_type.is_none() {
        missing.push("structure_type".to_string());
    }
    if attrs.module_quantity.is_none() {
        missing.push("module_quantity".to_string());
    }
    if attrs.reinforcement_needed && !filled(&attrs.observations) {
        missing.push("observations".to_string());
    }

    Precondition::from_missing(missing)
}

/// Every photo slot must be newly supplied or already on file. Missing
/// photos are waived by a non-empty pendencies text.
pub fn check_installation(
    incoming: &InstallationAttributes,
    existing: &InstallationAttributes,
    pendencies: Option<&str>,
) -> Precondition {
    let missing_photos: Vec<String> = PhotoSlot::ALL
        .iter()
        .filter(|slot| !incoming.has_photo(**slot) && !existing.has_photo(**slot))
        .map(|slot| slot.as_str().to_string())
        .collect();

    let waived = pendencies.is_some_and(|p| !p.trim().is_empty());
    if missing_photos.is_empty() || waived {
        return Precondition::Satisfied;
    }

    let mut missing = missing_photos;
    missing.push("pendencies".to_string());
    Precondition::Unsatisfied { missing }
}

/// Connection-point approval needs the project to be documentation-complete.
/// Upstream phases are not re-validated.
pub fn check_homologation(documents: &[Document]) -> Precondition {
    let status = DocumentationStatus::of(documents);
    Precondition::from_missing(
        status
            .missing
            .iter()
            .map(|t| t.as_str().to_string())
            .collect(),
    )
}
