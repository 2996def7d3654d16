//! Persistence collaborator used by the transition engine.
//!
//! Errors returned here are fatal for the current operation; the engine
//! never retries inside a call.

use super::attributes::KitDetails;
use super::error::StoreError;
use super::model::{DerivedState, Document, PhaseRecord, Project};
use super::stage::PhaseStatuses;
use super::status::Phase;

pub trait PhaseStore: Send + Sync {
    fn get_project(&self, project_id: i64) -> Result<Project, StoreError>;

    fn get_phase(&self, project_id: i64, phase: Phase) -> Result<PhaseRecord, StoreError>;

    /// Persist a phase record, replacing the previous row
    fn put_phase(&self, record: &PhaseRecord) -> Result<(), StoreError>;

    /// Write stage and project status together
    fn put_derived(&self, project_id: i64, derived: DerivedState) -> Result<(), StoreError>;

    fn put_kit(&self, project_id: i64, kit: &KitDetails) -> Result<(), StoreError>;

    fn list_documents(&self, project_id: i64) -> Result<Vec<Document>, StoreError>;

    /// Last-committed status of every phase
    fn phase_statuses(&self, project_id: i64) -> Result<PhaseStatuses, StoreError> {
        let mut statuses = PhaseStatuses::initial();
        for phase in Phase::ALL {
            statuses.set(self.get_phase(project_id, phase)?.status);
        }
        Ok(statuses)
    }
}
