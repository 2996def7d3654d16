//! # Lifecycle Data Model
//!
//! Projects, their phase records and the documents the homologation gate
//! inspects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::{KitDetails, PhaseAttributes};
use super::stage::Stage;
use super::status::{Phase, PhaseStatus};

/// Project-scoped completion flag, distinct from the stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A solar installation project
///
/// `current_stage` and `status` are derived from the phase records. They
/// have no setters; only the transition engine writes them, through
/// [`crate::lifecycle::PhaseStore::put_derived`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub(crate) current_stage: Stage,
    pub(crate) status: ProjectStatus,
    #[serde(default)]
    pub kit: KitDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }
}

/// Stage and status computed from the phase statuses, written as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    pub stage: Stage,
    pub status: ProjectStatus,
}

/// One phase of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    pub project_id: i64,
    pub status: PhaseStatus,
    pub attributes: PhaseAttributes,
    /// Free-text pendencies, or the rejection reason for homologation
    pub pendencies: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PhaseRecord {
    /// Fresh record for a newly created project
    pub fn not_started(project_id: i64, phase: Phase) -> Self {
        Self {
            project_id,
            status: PhaseStatus::not_started(phase),
            attributes: PhaseAttributes::empty(phase),
            pendencies: None,
            updated_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.status.phase()
    }
}

/// Document type vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Identity proof (RG or CNH)
    RgCnh,
    /// Installation-responsibility certificate
    Art,
    /// Utility bill of the generating unit
    BillGenerator,
    /// Utility bill of a beneficiary unit
    BillBeneficiary,
    Other,
}

impl DocumentType {
    /// Types a project must hold to be documentation-complete
    pub const MANDATORY: [DocumentType; 3] = [
        DocumentType::RgCnh,
        DocumentType::Art,
        DocumentType::BillGenerator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RgCnh => "rg_cnh",
            Self::Art => "art",
            Self::BillGenerator => "bill_generator",
            Self::BillBeneficiary => "bill_beneficiary",
            Self::Other => "other",
        }
    }

    /// Canonical tokens only
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rg_cnh" => Some(Self::RgCnh),
            "art" => Some(Self::Art),
            "bill_generator" => Some(Self::BillGenerator),
            "bill_beneficiary" => Some(Self::BillBeneficiary),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Lenient decoding for stored rows; unknown kinds read as `Other`
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Other)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// Opaque storage reference
    pub url: String,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Mandatory documents present and missing for a project
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentationStatus {
    pub present: Vec<DocumentType>,
    pub missing: Vec<DocumentType>,
}

impl DocumentationStatus {
    pub fn of(documents: &[Document]) -> Self {
        let (present, missing) = DocumentType::MANDATORY
            .into_iter()
            .partition(|t| documents.iter().any(|d| d.doc_type == *t));
        Self { present, missing }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_type: DocumentType) -> Document {
        Document {
            id: 1,
            project_id: 1,
            title: doc_type.as_str().to_string(),
            doc_type,
            url: format!("https://files/{}", doc_type.as_str()),
            uploaded_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_documentation_complete_needs_all_three() {
        let docs = vec![
            doc(DocumentType::RgCnh),
            doc(DocumentType::Art),
            doc(DocumentType::BillBeneficiary),
        ];
        let status = DocumentationStatus::of(&docs);
        assert!(!status.is_complete());
        assert_eq!(status.missing, vec![DocumentType::BillGenerator]);

        let mut docs = docs;
        docs.push(doc(DocumentType::BillGenerator));
        assert!(DocumentationStatus::of(&docs).is_complete());
    }

    #[test]
    fn test_document_type_round_trips_unknown_as_other() {
        assert_eq!(DocumentType::from_str("contract"), DocumentType::Other);
        assert_eq!(DocumentType::from_str("art"), DocumentType::Art);
    }

    #[test]
    fn test_parse_accepts_canonical_tokens_only() {
        assert_eq!(DocumentType::parse("bill_generator"), Some(DocumentType::BillGenerator));
        assert_eq!(DocumentType::parse("other"), Some(DocumentType::Other));
        assert_eq!(DocumentType::parse("contract"), None);
        assert_eq!(DocumentType::parse("bill-generator"), None);

        assert_eq!(ProjectStatus::parse("in_progress"), Some(ProjectStatus::InProgress));
        assert_eq!(ProjectStatus::parse("archived"), None);
    }
}
