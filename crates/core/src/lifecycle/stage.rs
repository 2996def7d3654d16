//! # Stage Derivation
//!
//! A project's overall stage is a pure function of its four phase statuses:
//! the first phase (in lifecycle order) that has not advanced names the
//! stage. Nothing caches it; the engine recomputes it after every write.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::model::{DerivedState, ProjectStatus};
use super::status::{Phase, PhaseStatus};

/// Overall position of a project across all phases
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Commercial proposal not yet approved
    #[default]
    Pending,
    Inspection,
    Installation,
    Homologation,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Inspection => "inspection",
            Self::Installation => "installation",
            Self::Homologation => "homologation",
            Self::Completed => "completed",
        }
    }

    /// Parse a stage token; `conclusion` is a legacy spelling of `completed`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "inspection" => Some(Self::Inspection),
            "installation" => Some(Self::Installation),
            "homologation" => Some(Self::Homologation),
            "completed" | "conclusion" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Older spelling that may still sit in stored rows
    pub fn legacy_token(&self) -> Option<&'static str> {
        match self {
            Self::Completed => Some("conclusion"),
            _ => None,
        }
    }

    /// Stage reported while `phase` is the earliest incomplete phase
    fn blocked_at(phase: Phase) -> Self {
        match phase {
            Phase::Commercial => Self::Pending,
            Phase::Technical => Self::Inspection,
            Phase::Installation => Self::Installation,
            Phase::Homologation => Self::Homologation,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current status of each phase, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStatuses {
    pub commercial: PhaseStatus,
    pub technical: PhaseStatus,
    pub installation: PhaseStatus,
    pub homologation: PhaseStatus,
}

impl PhaseStatuses {
    pub fn initial() -> Self {
        Self {
            commercial: PhaseStatus::not_started(Phase::Commercial),
            technical: PhaseStatus::not_started(Phase::Technical),
            installation: PhaseStatus::not_started(Phase::Installation),
            homologation: PhaseStatus::not_started(Phase::Homologation),
        }
    }

    pub fn get(&self, phase: Phase) -> PhaseStatus {
        match phase {
            Phase::Commercial => self.commercial,
            Phase::Technical => self.technical,
            Phase::Installation => self.installation,
            Phase::Homologation => self.homologation,
        }
    }

    /// Replace the status of the phase `status` belongs to
    pub fn set(&mut self, status: PhaseStatus) {
        match status.phase() {
            Phase::Commercial => self.commercial = status,
            Phase::Technical => self.technical = status,
            Phase::Installation => self.installation = status,
            Phase::Homologation => self.homologation = status,
        }
    }
}

/// Derive the overall stage from the phase statuses
pub fn derive_stage(statuses: &PhaseStatuses) -> Stage {
    Phase::ALL
        .into_iter()
        .find(|phase| !statuses.get(*phase).is_advanced())
        .map(Stage::blocked_at)
        .unwrap_or(Stage::Completed)
}

/// Derive the project status that accompanies `stage`.
///
/// An approved connection point completes the project even when earlier
/// phases still lag; the stage keeps reporting the earliest gap.
pub fn derive_project_status(statuses: &PhaseStatuses, stage: Stage) -> ProjectStatus {
    if statuses.homologation.is_advanced() {
        ProjectStatus::Completed
    } else if stage > Stage::Pending {
        ProjectStatus::InProgress
    } else {
        ProjectStatus::Pending
    }
}

/// Stage and project status in one value, ready to persist together
pub fn derive(statuses: &PhaseStatuses) -> DerivedState {
    let stage = derive_stage(statuses);
    DerivedState {
        stage,
        status: derive_project_status(statuses, stage),
    }
}
