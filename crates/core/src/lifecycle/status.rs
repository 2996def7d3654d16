//! # Status Vocabulary
//!
//! Each phase owns a closed set of status tokens. Every token belongs to one
//! of three classes: not started, pending (saved but blocked or incomplete)
//! and advanced (the phase is satisfied and the project may move on).
//!
//! Only canonical tokens are ever written. Legacy spellings seen in older
//! rows are accepted by [`PhaseStatus::parse_stored`] and normalized.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::error::LifecycleError;

/// One operational domain of the project lifecycle, in lifecycle order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Commercial,
    Technical,
    Installation,
    Homologation,
}

impl Phase {
    /// All phases in lifecycle order
    pub const ALL: [Phase; 4] = [
        Phase::Commercial,
        Phase::Technical,
        Phase::Installation,
        Phase::Homologation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commercial => "commercial",
            Self::Technical => "technical",
            Self::Installation => "installation",
            Self::Homologation => "homologation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commercial" => Some(Self::Commercial),
            "technical" => Some(Self::Technical),
            "installation" => Some(Self::Installation),
            "homologation" => Some(Self::Homologation),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic meaning of a status token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    NotStarted,
    Pending,
    Advanced,
}

/// Status of the Commercial, Technical and Installation phases
///
/// These three phases share the same small vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    Pending,
    Approved,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::NotStarted => StatusClass::NotStarted,
            Self::Pending => StatusClass::Pending,
            Self::Approved => StatusClass::Advanced,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// Status of the Homologation phase
///
/// The four blocked tokens are distinct utility-side situations, not
/// spellings of one another, so all of them stay canonical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HomologationStatus {
    #[default]
    NotStarted,
    /// Utility is reviewing the submitted documentation
    TechnicalAnalysis,
    /// Rejected during technical analysis; reason in pendencies
    Rejected,
    WaitingInspection,
    PerformingInspection,
    ConnectionPointApproved,
}

impl HomologationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::TechnicalAnalysis => "technical_analysis",
            Self::Rejected => "rejected",
            Self::WaitingInspection => "waiting_inspection",
            Self::PerformingInspection => "performing_inspection",
            Self::ConnectionPointApproved => "connection_point_approved",
        }
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::NotStarted => StatusClass::NotStarted,
            Self::ConnectionPointApproved => StatusClass::Advanced,
            _ => StatusClass::Pending,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "technical_analysis" => Some(Self::TechnicalAnalysis),
            "rejected" => Some(Self::Rejected),
            "waiting_inspection" => Some(Self::WaitingInspection),
            "performing_inspection" => Some(Self::PerformingInspection),
            "connection_point_approved" => Some(Self::ConnectionPointApproved),
            _ => None,
        }
    }
}

/// A status token bound to the phase whose vocabulary it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Commercial(StepStatus),
    Technical(StepStatus),
    Installation(StepStatus),
    Homologation(HomologationStatus),
}

impl PhaseStatus {
    /// The initial status of a phase
    pub fn not_started(phase: Phase) -> Self {
        match phase {
            Phase::Commercial => Self::Commercial(StepStatus::NotStarted),
            Phase::Technical => Self::Technical(StepStatus::NotStarted),
            Phase::Installation => Self::Installation(StepStatus::NotStarted),
            Phase::Homologation => Self::Homologation(HomologationStatus::NotStarted),
        }
    }

    /// The token that marks a phase as satisfied
    pub fn advance(phase: Phase) -> Self {
        match phase {
            Phase::Commercial => Self::Commercial(StepStatus::Approved),
            Phase::Technical => Self::Technical(StepStatus::Approved),
            Phase::Installation => Self::Installation(StepStatus::Approved),
            Phase::Homologation => Self::Homologation(HomologationStatus::ConnectionPointApproved),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Commercial(_) => Phase::Commercial,
            Self::Technical(_) => Phase::Technical,
            Self::Installation(_) => Phase::Installation,
            Self::Homologation(_) => Phase::Homologation,
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            Self::Commercial(s) | Self::Technical(s) | Self::Installation(s) => s.class(),
            Self::Homologation(s) => s.class(),
        }
    }

    pub fn is_advanced(&self) -> bool {
        self.class() == StatusClass::Advanced
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commercial(s) | Self::Technical(s) | Self::Installation(s) => s.as_str(),
            Self::Homologation(s) => s.as_str(),
        }
    }

    /// Parse a caller-supplied token. Only canonical tokens are accepted.
    pub fn parse(phase: Phase, token: &str) -> Result<Self, LifecycleError> {
        let parsed = match phase {
            Phase::Commercial => StepStatus::parse(token).map(Self::Commercial),
            Phase::Technical => StepStatus::parse(token).map(Self::Technical),
            Phase::Installation => StepStatus::parse(token).map(Self::Installation),
            Phase::Homologation => HomologationStatus::parse(token).map(Self::Homologation),
        };
        parsed.ok_or_else(|| LifecycleError::UnknownStatus {
            phase,
            token: token.to_string(),
        })
    }

    /// Parse a persisted token, accepting legacy aliases.
    ///
    /// Read path only; the engine never writes an alias back.
    pub fn parse_stored(phase: Phase, token: Option<&str>) -> Result<Self, LifecycleError> {
        let token = token.map(str::trim).unwrap_or("");
        let canonical = match (phase, token) {
            (_, "") => "not_started",
            (Phase::Commercial, "proposta_enviada") => "approved",
            (Phase::Technical, "vistoria_concluida") => "approved",
            (_, other) => other,
        };
        Self::parse(phase, canonical)
    }
}

/// Serialized as its canonical token
impl Serialize for PhaseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_phase_has_one_advance_token() {
        for phase in Phase::ALL {
            let advance = PhaseStatus::advance(phase);
            assert_eq!(advance.phase(), phase);
            assert!(advance.is_advanced());
            assert_eq!(
                PhaseStatus::not_started(phase).class(),
                StatusClass::NotStarted
            );
        }
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = PhaseStatus::parse(Phase::Commercial, "finished").unwrap_err();
        assert!(matches!(err, LifecycleError::UnknownStatus { phase: Phase::Commercial, .. }));

        // homologation tokens do not leak into the step vocabulary
        assert!(PhaseStatus::parse(Phase::Installation, "rejected").is_err());
    }

    #[test]
    fn test_legacy_aliases_only_on_read() {
        assert!(PhaseStatus::parse(Phase::Commercial, "proposta_enviada").is_err());
        assert!(PhaseStatus::parse(Phase::Technical, "vistoria_concluida").is_err());

        let commercial =
            PhaseStatus::parse_stored(Phase::Commercial, Some("proposta_enviada")).unwrap();
        assert_eq!(commercial, PhaseStatus::Commercial(StepStatus::Approved));
        assert_eq!(commercial.as_str(), "approved");

        let technical =
            PhaseStatus::parse_stored(Phase::Technical, Some("vistoria_concluida")).unwrap();
        assert!(technical.is_advanced());

        let empty = PhaseStatus::parse_stored(Phase::Homologation, None).unwrap();
        assert_eq!(empty, PhaseStatus::not_started(Phase::Homologation));
    }

    #[test]
    fn test_homologation_blocked_tokens_are_pending() {
        for token in [
            "technical_analysis",
            "rejected",
            "waiting_inspection",
            "performing_inspection",
        ] {
            let status = PhaseStatus::parse(Phase::Homologation, token).unwrap();
            assert_eq!(status.class(), StatusClass::Pending, "{}", token);
        }
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&Phase::Installation).unwrap();
        assert_eq!(json, "\"installation\"");
    }
}
