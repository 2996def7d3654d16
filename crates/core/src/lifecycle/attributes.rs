//! # Phase Attributes
//!
//! Phase-specific data carried by each phase record, plus the merge rules
//! applied when an update lands on an existing record.
//!
//! Scalar fields are replaced verbatim by every write. Evidence (inspection
//! media and installation photos) is additive: a write can add or replace a
//! photo slot but never drops anything already on file.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::status::Phase;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Financing,
    Card,
}

/// Mounting surface recorded during the technical inspection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StructureType {
    #[serde(rename = "ceramico")]
    CeramicRoof,
    #[serde(rename = "fibrocimento")]
    FiberCementRoof,
    #[serde(rename = "metalico")]
    MetalRoof,
    #[serde(rename = "laje")]
    Slab,
    #[serde(rename = "solo")]
    Ground,
    #[serde(rename = "outros")]
    Other,
}

/// The ten photos documenting a finished installation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhotoSlot {
    #[serde(rename = "photo_modules")]
    Modules,
    #[serde(rename = "photo_inverter")]
    Inverter,
    #[serde(rename = "photo_inverter_label")]
    InverterLabel,
    #[serde(rename = "photo_roof_sealing")]
    RoofSealing,
    #[serde(rename = "photo_grounding")]
    Grounding,
    #[serde(rename = "photo_ac_voltage")]
    AcVoltage,
    #[serde(rename = "photo_dc_voltage")]
    DcVoltage,
    #[serde(rename = "photo_generation_plate")]
    GenerationPlate,
    #[serde(rename = "photo_ac_stringbox")]
    AcStringbox,
    #[serde(rename = "photo_connection_point")]
    ConnectionPoint,
}

impl PhotoSlot {
    pub const ALL: [PhotoSlot; 10] = [
        PhotoSlot::Modules,
        PhotoSlot::Inverter,
        PhotoSlot::InverterLabel,
        PhotoSlot::RoofSealing,
        PhotoSlot::Grounding,
        PhotoSlot::AcVoltage,
        PhotoSlot::DcVoltage,
        PhotoSlot::GenerationPlate,
        PhotoSlot::AcStringbox,
        PhotoSlot::ConnectionPoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modules => "photo_modules",
            Self::Inverter => "photo_inverter",
            Self::InverterLabel => "photo_inverter_label",
            Self::RoofSealing => "photo_roof_sealing",
            Self::Grounding => "photo_grounding",
            Self::AcVoltage => "photo_ac_voltage",
            Self::DcVoltage => "photo_dc_voltage",
            Self::GenerationPlate => "photo_generation_plate",
            Self::AcStringbox => "photo_ac_stringbox",
            Self::ConnectionPoint => "photo_connection_point",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommercialAttributes {
    /// Kept as text; clients send either `"15000"` or `15000`
    #[serde(default, deserialize_with = "string_or_number")]
    pub proposal_value: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub contract_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechnicalAttributes {
    #[serde(default)]
    pub entrance_pattern: Option<String>,
    #[serde(default)]
    pub grounding: Option<String>,
    #[serde(default)]
    pub roof_structure: Option<String>,
    #[serde(default)]
    pub roof_overview: Option<String>,
    #[serde(default)]
    pub breaker_box: Option<String>,
    #[serde(default)]
    pub structure_type: Option<StructureType>,
    #[serde(default)]
    pub module_quantity: Option<u32>,
    #[serde(default)]
    pub reinforcement_needed: bool,
    /// General observations; mandatory justification when reinforcement is needed
    #[serde(default)]
    pub observations: Option<String>,
    /// Storage URLs of inspection photos and videos
    #[serde(default)]
    pub inspection_media: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallationAttributes {
    #[serde(default)]
    pub photos: BTreeMap<PhotoSlot, String>,
}

impl InstallationAttributes {
    pub fn has_photo(&self, slot: PhotoSlot) -> bool {
        self.photos.get(&slot).is_some_and(|url| !url.trim().is_empty())
    }
}

/// Attribute set of one phase record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseAttributes {
    Commercial(CommercialAttributes),
    Technical(TechnicalAttributes),
    Installation(InstallationAttributes),
    /// Homologation carries only its status and the rejection reason
    Homologation,
}

impl PhaseAttributes {
    pub fn empty(phase: Phase) -> Self {
        match phase {
            Phase::Commercial => Self::Commercial(CommercialAttributes::default()),
            Phase::Technical => Self::Technical(TechnicalAttributes::default()),
            Phase::Installation => Self::Installation(InstallationAttributes::default()),
            Phase::Homologation => Self::Homologation,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Commercial(_) => Phase::Commercial,
            Self::Technical(_) => Phase::Technical,
            Self::Installation(_) => Phase::Installation,
            Self::Homologation => Phase::Homologation,
        }
    }

    /// Apply an incoming attribute set on top of the persisted one.
    ///
    /// Both sides must belong to the same phase; a mismatched `existing` is
    /// ignored and the incoming set wins.
    pub fn merge_onto(self, existing: &PhaseAttributes) -> PhaseAttributes {
        match (self, existing) {
            (Self::Technical(mut incoming), Self::Technical(current)) => {
                incoming.inspection_media =
                    merge_media(&current.inspection_media, &incoming.inspection_media);
                Self::Technical(incoming)
            }
            (Self::Installation(incoming), Self::Installation(current)) => {
                let mut photos = current.photos.clone();
                for (slot, url) in incoming.photos {
                    if !url.trim().is_empty() {
                        photos.insert(slot, url);
                    }
                }
                Self::Installation(InstallationAttributes { photos })
            }
            (incoming, _) => incoming,
        }
    }
}

/// Union of two media lists by URL, existing entries first
pub fn merge_media(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());
    for url in existing.iter().chain(incoming) {
        if !url.trim().is_empty() && !merged.contains(url) {
            merged.push(url.clone());
        }
    }
    merged
}

/// Purchased equipment, tracked on the project and never gating
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KitDetails {
    #[serde(default)]
    pub purchased: bool,
    #[serde(default)]
    pub inverter_model: Option<String>,
    #[serde(default)]
    pub inverter_power: Option<String>,
    #[serde(default)]
    pub module_model: Option<String>,
    #[serde(default)]
    pub module_power: Option<String>,
}

/// True when an optional text field holds something other than whitespace
pub(crate) fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
