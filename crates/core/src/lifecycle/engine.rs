//! # Transition Engine
//!
//! Single write path for phase records. Every update follows the same
//! sequence:
//!
//! ```text
//! validate (advance only) → persist phase → derive stage → persist stage → notify
//! ```
//!
//! A rejected advancement writes nothing and emits nothing. Notification
//! failures are logged and never undo a committed write.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::attributes::{KitDetails, PhaseAttributes};
use super::error::LifecycleError;
use super::events::{emit, EventSink, ProjectEvent, UpdateScope};
use super::model::{DerivedState, DocumentationStatus, PhaseRecord};
use super::roles::Role;
use super::stage::{self, Stage};
use super::status::{HomologationStatus, Phase, PhaseStatus};
use super::store::PhaseStore;
use super::validators::{self, Precondition, ValidationInput};

/// A requested change to one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub status: PhaseStatus,
    pub attributes: PhaseAttributes,
    pub pendencies: Option<String>,
}

impl PhaseUpdate {
    pub fn new(status: PhaseStatus, attributes: PhaseAttributes) -> Self {
        Self {
            status,
            attributes,
            pendencies: None,
        }
    }

    pub fn with_pendencies(mut self, pendencies: impl Into<String>) -> Self {
        self.pendencies = Some(pendencies.into());
        self
    }
}

/// Result of a phase update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition {
    /// The update was persisted and the stage recomputed
    Applied {
        project_id: i64,
        phase: Phase,
        status: PhaseStatus,
        previous_stage: Stage,
        derived: DerivedState,
    },
    /// Advancement requested but preconditions unsatisfied; nothing written
    Rejected {
        project_id: i64,
        phase: Phase,
        missing: Vec<String>,
    },
    /// Nothing to do; the phase is already past the requested point
    Unchanged {
        project_id: i64,
        phase: Phase,
        status: PhaseStatus,
    },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Orchestrates validation, persistence, stage derivation and notification
#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn PhaseStore>,
    sink: Arc<dyn EventSink>,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn PhaseStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    /// Apply a role-scoped update to one phase of a project.
    ///
    /// `actor` has already been authorized by the caller and is only logged.
    pub fn apply_phase_update(
        &self,
        project_id: i64,
        phase: Phase,
        update: PhaseUpdate,
        actor: Role,
    ) -> Result<Transition, LifecycleError> {
        for found in [update.status.phase(), update.attributes.phase()] {
            if found != phase {
                return Err(LifecycleError::PhaseMismatch {
                    expected: phase,
                    found,
                });
            }
        }

        let project = self.store.get_project(project_id)?;
        let existing = self.store.get_phase(project_id, phase)?;

        if update.status.is_advanced() {
            let documents = match phase {
                Phase::Homologation => self.store.list_documents(project_id)?,
                _ => Vec::new(),
            };
            let verdict = validators::check(&ValidationInput {
                incoming: &update.attributes,
                existing: &existing.attributes,
                pendencies: update.pendencies.as_deref(),
                documents: &documents,
            });
            if let Precondition::Unsatisfied { missing } = verdict {
                tracing::debug!(
                    project_id,
                    %phase,
                    %actor,
                    ?missing,
                    "Advancement rejected"
                );
                return Ok(Transition::Rejected {
                    project_id,
                    phase,
                    missing,
                });
            }
        }

        let record = PhaseRecord {
            project_id,
            status: update.status,
            attributes: update.attributes.merge_onto(&existing.attributes),
            pendencies: update.pendencies,
            updated_at: Utc::now(),
        };
        self.store.put_phase(&record)?;

        let statuses = self.store.phase_statuses(project_id)?;
        let derived = stage::derive(&statuses);
        self.store.put_derived(project_id, derived)?;

        tracing::info!(
            project_id,
            %phase,
            status = %record.status,
            %actor,
            from = %project.current_stage(),
            to = %derived.stage,
            "Phase updated"
        );

        emit(self.sink.as_ref(), ProjectEvent::updated(project_id, phase));

        Ok(Transition::Applied {
            project_id,
            phase,
            status: record.status,
            previous_stage: project.current_stage(),
            derived,
        })
    }

    /// Record the purchased kit. Informational only: stage is untouched.
    pub fn apply_kit_update(
        &self,
        project_id: i64,
        kit: &KitDetails,
        actor: Role,
    ) -> Result<(), LifecycleError> {
        self.store.get_project(project_id)?;
        self.store.put_kit(project_id, kit)?;

        tracing::info!(project_id, purchased = kit.purchased, %actor, "Kit updated");
        emit(self.sink.as_ref(), ProjectEvent::updated(project_id, UpdateScope::Kit));
        Ok(())
    }

    /// Hand a documentation-complete project over to the utility.
    ///
    /// Moves homologation to `technical_analysis` from `not_started` or
    /// `rejected`; later statuses are left alone.
    pub fn confirm_documentation(
        &self,
        project_id: i64,
        actor: Role,
    ) -> Result<Transition, LifecycleError> {
        self.store.get_project(project_id)?;
        let documentation = DocumentationStatus::of(&self.store.list_documents(project_id)?);
        if !documentation.is_complete() {
            return Ok(Transition::Rejected {
                project_id,
                phase: Phase::Homologation,
                missing: documentation
                    .missing
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
            });
        }

        let current = self.store.get_phase(project_id, Phase::Homologation)?;
        match current.status {
            PhaseStatus::Homologation(HomologationStatus::NotStarted)
            | PhaseStatus::Homologation(HomologationStatus::Rejected) => {}
            status => {
                return Ok(Transition::Unchanged {
                    project_id,
                    phase: Phase::Homologation,
                    status,
                })
            }
        }

        let mut update = PhaseUpdate::new(
            PhaseStatus::Homologation(HomologationStatus::TechnicalAnalysis),
            PhaseAttributes::Homologation,
        );
        update.pendencies = current.pendencies;
        self.apply_phase_update(project_id, Phase::Homologation, update, actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::attributes::{
        CommercialAttributes, InstallationAttributes, PaymentMethod, PhotoSlot, StructureType,
        TechnicalAttributes,
    };
    use crate::lifecycle::error::{NotificationError, StoreError};
    use crate::lifecycle::events::BroadcastSink;
    use crate::lifecycle::model::{DocumentType, ProjectStatus};
    use crate::lifecycle::status::StepStatus;
    use crate::state::{NewClient, NewDocument, ProjectStore, SolarDb};
    use std::sync::Mutex;
    use tokio::sync::broadcast::Receiver;

    /// Sink that records instead of broadcasting
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProjectEvent>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: ProjectEvent) -> Result<(), NotificationError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    /// Store whose phase writes always fail
    struct BrokenStore(ProjectStore);

    impl PhaseStore for BrokenStore {
        fn get_project(&self, id: i64) -> Result<crate::lifecycle::Project, StoreError> {
            self.0.get_project(id)
        }
        fn get_phase(&self, id: i64, phase: Phase) -> Result<PhaseRecord, StoreError> {
            self.0.get_phase(id, phase)
        }
        fn put_phase(&self, _: &PhaseRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("disk full")))
        }
        fn put_derived(&self, id: i64, derived: DerivedState) -> Result<(), StoreError> {
            self.0.put_derived(id, derived)
        }
        fn put_kit(&self, id: i64, kit: &KitDetails) -> Result<(), StoreError> {
            self.0.put_kit(id, kit)
        }
        fn list_documents(&self, id: i64) -> Result<Vec<crate::lifecycle::Document>, StoreError> {
            self.0.list_documents(id)
        }
    }

    struct Fixture {
        store: Arc<ProjectStore>,
        engine: TransitionEngine,
        rx: Receiver<ProjectEvent>,
        project_id: i64,
    }

    fn fixture() -> Fixture {
        let db = SolarDb::open_in_memory().unwrap();
        let store = Arc::new(ProjectStore::new(&db));
        let sink = BroadcastSink::new(32);
        let rx = sink.subscribe();
        let engine = TransitionEngine::new(store.clone(), Arc::new(sink));
        let created = store
            .create_client(&NewClient {
                name: "Ana Souza".to_string(),
                ..Default::default()
            })
            .unwrap();
        Fixture {
            store,
            engine,
            rx,
            project_id: created.project_id,
        }
    }

    fn commercial(value: Option<&str>, method: Option<PaymentMethod>) -> PhaseAttributes {
        PhaseAttributes::Commercial(CommercialAttributes {
            proposal_value: value.map(str::to_string),
            payment_method: method,
            ..Default::default()
        })
    }

    fn technical(module_quantity: Option<u32>) -> PhaseAttributes {
        PhaseAttributes::Technical(TechnicalAttributes {
            entrance_pattern: Some("three-phase".to_string()),
            grounding: Some("copper rod".to_string()),
            roof_structure: Some("wood".to_string()),
            roof_overview: Some("south facing".to_string()),
            breaker_box: Some("63A".to_string()),
            structure_type: Some(StructureType::MetalRoof),
            module_quantity,
            inspection_media: vec!["https://files/roof.jpg".to_string()],
            ..Default::default()
        })
    }

    fn installation_photos(count: usize) -> PhaseAttributes {
        PhaseAttributes::Installation(InstallationAttributes {
            photos: PhotoSlot::ALL
                .iter()
                .take(count)
                .map(|s| (*s, format!("https://files/{}.jpg", s.as_str())))
                .collect(),
        })
    }

    fn advance(phase: Phase, attributes: PhaseAttributes) -> PhaseUpdate {
        PhaseUpdate::new(PhaseStatus::advance(phase), attributes)
    }

    fn add_document(store: &ProjectStore, project_id: i64, doc_type: DocumentType) {
        store
            .add_document(&NewDocument {
                project_id,
                title: doc_type.as_str().to_string(),
                doc_type,
                url: format!("https://files/{}.pdf", doc_type.as_str()),
                uploaded_by: None,
            })
            .unwrap();
    }

    fn stage_of(f: &Fixture) -> Stage {
        f.store.get_project(f.project_id).unwrap().current_stage()
    }

    #[test]
    fn test_full_lifecycle_scenario() {
        let mut f = fixture();
        let id = f.project_id;
        assert_eq!(stage_of(&f), Stage::Pending);

        let t = f
            .engine
            .apply_phase_update(
                id,
                Phase::Commercial,
                advance(
                    Phase::Commercial,
                    commercial(Some("15000"), Some(PaymentMethod::Financing)),
                ),
                Role::Commercial,
            )
            .unwrap();
        assert!(t.is_applied());
        assert_eq!(stage_of(&f), Stage::Inspection);

        let t = f
            .engine
            .apply_phase_update(
                id,
                Phase::Technical,
                advance(Phase::Technical, technical(None)),
                Role::Technical,
            )
            .unwrap();
        assert_eq!(
            t,
            Transition::Rejected {
                project_id: id,
                phase: Phase::Technical,
                missing: vec!["module_quantity".to_string()],
            }
        );
        assert_eq!(stage_of(&f), Stage::Inspection);

        f.engine
            .apply_phase_update(
                id,
                Phase::Technical,
                advance(Phase::Technical, technical(Some(14))),
                Role::Technical,
            )
            .unwrap();
        assert_eq!(stage_of(&f), Stage::Installation);

        let t = f
            .engine
            .apply_phase_update(
                id,
                Phase::Installation,
                advance(Phase::Installation, installation_photos(9)),
                Role::Technical,
            )
            .unwrap();
        assert!(matches!(t, Transition::Rejected { .. }));
        assert_eq!(stage_of(&f), Stage::Installation);

        f.engine
            .apply_phase_update(
                id,
                Phase::Installation,
                advance(Phase::Installation, installation_photos(9))
                    .with_pendencies("connection point photo after utility visit"),
                Role::Technical,
            )
            .unwrap();
        assert_eq!(stage_of(&f), Stage::Homologation);

        add_document(&f.store, id, DocumentType::RgCnh);
        add_document(&f.store, id, DocumentType::Art);
        let t = f
            .engine
            .apply_phase_update(
                id,
                Phase::Homologation,
                advance(Phase::Homologation, PhaseAttributes::Homologation),
                Role::Admin,
            )
            .unwrap();
        assert_eq!(
            t,
            Transition::Rejected {
                project_id: id,
                phase: Phase::Homologation,
                missing: vec!["bill_generator".to_string()],
            }
        );

        add_document(&f.store, id, DocumentType::BillGenerator);
        let t = f
            .engine
            .apply_phase_update(
                id,
                Phase::Homologation,
                advance(Phase::Homologation, PhaseAttributes::Homologation),
                Role::Admin,
            )
            .unwrap();
        assert!(t.is_applied());

        let project = f.store.get_project(id).unwrap();
        assert_eq!(project.current_stage(), Stage::Completed);
        assert_eq!(project.status(), ProjectStatus::Completed);

        // one event per applied write, none for rejections
        let mut scopes = Vec::new();
        while let Ok(event) = f.rx.try_recv() {
            scopes.push(event.scope);
        }
        assert_eq!(
            scopes,
            vec![
                Some(UpdateScope::Commercial),
                Some(UpdateScope::Technical),
                Some(UpdateScope::Installation),
                Some(UpdateScope::Homologation),
            ]
        );
    }

    #[test]
    fn test_rejection_leaves_record_untouched() {
        let f = fixture();
        let before = f.store.get_phase(f.project_id, Phase::Commercial).unwrap();

        let t = f
            .engine
            .apply_phase_update(
                f.project_id,
                Phase::Commercial,
                advance(Phase::Commercial, commercial(Some("9000"), None))
                    .with_pendencies("waiting on bank"),
                Role::Commercial,
            )
            .unwrap();

        assert!(matches!(t, Transition::Rejected { ref missing, .. } if missing == &["payment_method"]));
        let after = f.store.get_phase(f.project_id, Phase::Commercial).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_pending_write_persists_incomplete_data_verbatim() {
        let f = fixture();
        let attrs = commercial(Some("9000"), None);

        f.engine
            .apply_phase_update(
                f.project_id,
                Phase::Commercial,
                PhaseUpdate::new(PhaseStatus::Commercial(StepStatus::Pending), attrs.clone())
                    .with_pendencies("client awaiting credit approval"),
                Role::Commercial,
            )
            .unwrap();

        let record = f.store.get_phase(f.project_id, Phase::Commercial).unwrap();
        assert_eq!(record.attributes, attrs);
        assert_eq!(record.status, PhaseStatus::Commercial(StepStatus::Pending));
        assert_eq!(
            record.pendencies.as_deref(),
            Some("client awaiting credit approval")
        );
        assert_eq!(stage_of(&f), Stage::Pending);
    }

    #[test]
    fn test_repeated_update_is_idempotent() {
        let f = fixture();
        let update = PhaseUpdate::new(PhaseStatus::Technical(StepStatus::Pending), technical(None));

        let first = f
            .engine
            .apply_phase_update(f.project_id, Phase::Technical, update.clone(), Role::Technical)
            .unwrap();
        let record_a = f.store.get_phase(f.project_id, Phase::Technical).unwrap();

        let second = f
            .engine
            .apply_phase_update(f.project_id, Phase::Technical, update, Role::Technical)
            .unwrap();
        let record_b = f.store.get_phase(f.project_id, Phase::Technical).unwrap();

        assert_eq!(record_a.attributes, record_b.attributes);
        assert_eq!(record_a.status, record_b.status);
        let (Transition::Applied { derived: a, .. }, Transition::Applied { derived: b, .. }) =
            (first, second)
        else {
            panic!("both updates should apply");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_media_accumulates_across_updates() {
        let f = fixture();
        let pending = PhaseStatus::Technical(StepStatus::Pending);
        let with_media = |url: &str| {
            PhaseAttributes::Technical(TechnicalAttributes {
                inspection_media: vec![url.to_string()],
                ..Default::default()
            })
        };

        for url in ["https://files/a.jpg", "https://files/b.jpg", "https://files/a.jpg"] {
            f.engine
                .apply_phase_update(
                    f.project_id,
                    Phase::Technical,
                    PhaseUpdate::new(pending, with_media(url)),
                    Role::Technical,
                )
                .unwrap();
        }

        let record = f.store.get_phase(f.project_id, Phase::Technical).unwrap();
        let PhaseAttributes::Technical(attrs) = record.attributes else {
            panic!("technical record holds technical attributes");
        };
        assert_eq!(
            attrs.inspection_media,
            vec!["https://files/a.jpg", "https://files/b.jpg"]
        );
    }

    #[test]
    fn test_installation_photos_on_file_satisfy_gate() {
        let f = fixture();
        let pending = PhaseStatus::Installation(StepStatus::Pending);
        f.engine
            .apply_phase_update(
                f.project_id,
                Phase::Installation,
                PhaseUpdate::new(pending, installation_photos(10)),
                Role::Technical,
            )
            .unwrap();

        // resubmission without uploads still passes
        let t = f
            .engine
            .apply_phase_update(
                f.project_id,
                Phase::Installation,
                advance(
                    Phase::Installation,
                    PhaseAttributes::Installation(InstallationAttributes::default()),
                ),
                Role::Technical,
            )
            .unwrap();
        assert!(t.is_applied());
    }

    #[test]
    fn test_phase_mismatch_is_an_error() {
        let f = fixture();
        let err = f
            .engine
            .apply_phase_update(
                f.project_id,
                Phase::Technical,
                PhaseUpdate::new(
                    PhaseStatus::Technical(StepStatus::Pending),
                    commercial(None, None),
                ),
                Role::Admin,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::PhaseMismatch {
                expected: Phase::Technical,
                found: Phase::Commercial
            }
        ));
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let f = fixture();
        let err = f
            .engine
            .apply_phase_update(
                9999,
                Phase::Commercial,
                PhaseUpdate::new(
                    PhaseStatus::Commercial(StepStatus::Pending),
                    commercial(None, None),
                ),
                Role::Admin,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { id: 9999, .. }));
    }

    #[test]
    fn test_persistence_failure_emits_nothing() {
        let db = SolarDb::open_in_memory().unwrap();
        let inner = ProjectStore::new(&db);
        let project_id = inner
            .create_client(&NewClient {
                name: "Bruno".to_string(),
                ..Default::default()
            })
            .unwrap()
            .project_id;
        let sink = Arc::new(RecordingSink::default());
        let engine = TransitionEngine::new(Arc::new(BrokenStore(inner)), sink.clone());

        let err = engine
            .apply_phase_update(
                project_id,
                Phase::Commercial,
                PhaseUpdate::new(
                    PhaseStatus::Commercial(StepStatus::Pending),
                    commercial(None, None),
                ),
                Role::Commercial,
            )
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Persistence(_)));
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_write_survives_missing_subscribers() {
        let db = SolarDb::open_in_memory().unwrap();
        let store = Arc::new(ProjectStore::new(&db));
        let project_id = store
            .create_client(&NewClient {
                name: "Carla".to_string(),
                ..Default::default()
            })
            .unwrap()
            .project_id;
        // nobody subscribed: every publish fails
        let engine = TransitionEngine::new(store.clone(), Arc::new(BroadcastSink::new(4)));

        let t = engine
            .apply_phase_update(
                project_id,
                Phase::Commercial,
                advance(
                    Phase::Commercial,
                    commercial(Some("20000"), Some(PaymentMethod::Cash)),
                ),
                Role::Ceo,
            )
            .unwrap();
        assert!(t.is_applied());
        assert_eq!(
            store.get_project(project_id).unwrap().current_stage(),
            Stage::Inspection
        );
    }

    #[test]
    fn test_homologation_regression_reopens_project() {
        let f = fixture();
        for phase in [Phase::Commercial, Phase::Technical, Phase::Installation] {
            let attrs = match phase {
                Phase::Commercial => commercial(Some("1"), Some(PaymentMethod::Card)),
                Phase::Technical => technical(Some(6)),
                _ => installation_photos(10),
            };
            f.engine
                .apply_phase_update(f.project_id, phase, advance(phase, attrs), Role::Ceo)
                .unwrap();
        }
        for t in DocumentType::MANDATORY {
            add_document(&f.store, f.project_id, t);
        }
        f.engine
            .apply_phase_update(
                f.project_id,
                Phase::Homologation,
                advance(Phase::Homologation, PhaseAttributes::Homologation),
                Role::Ceo,
            )
            .unwrap();
        assert_eq!(stage_of(&f), Stage::Completed);

        f.engine
            .apply_phase_update(
                f.project_id,
                Phase::Homologation,
                PhaseUpdate::new(
                    PhaseStatus::Homologation(HomologationStatus::Rejected),
                    PhaseAttributes::Homologation,
                )
                .with_pendencies("inverter certificate expired"),
                Role::Admin,
            )
            .unwrap();

        let project = f.store.get_project(f.project_id).unwrap();
        assert_eq!(project.current_stage(), Stage::Homologation);
        assert_eq!(project.status(), ProjectStatus::InProgress);
    }

    #[test]
    fn test_kit_update_does_not_move_stage() {
        let mut f = fixture();
        let kit = KitDetails {
            purchased: true,
            inverter_model: Some("Growatt MIN 5000".to_string()),
            ..Default::default()
        };
        f.engine
            .apply_kit_update(f.project_id, &kit, Role::Admin)
            .unwrap();

        let project = f.store.get_project(f.project_id).unwrap();
        assert_eq!(project.kit, kit);
        assert_eq!(project.current_stage(), Stage::Pending);
        assert_eq!(f.rx.try_recv().unwrap().scope, Some(UpdateScope::Kit));
    }

    #[test]
    fn test_confirm_documentation() {
        let f = fixture();
        let t = f
            .engine
            .confirm_documentation(f.project_id, Role::Admin)
            .unwrap();
        assert!(matches!(t, Transition::Rejected { ref missing, .. } if missing.len() == 3));

        for t in DocumentType::MANDATORY {
            add_document(&f.store, f.project_id, t);
        }
        let t = f
            .engine
            .confirm_documentation(f.project_id, Role::Admin)
            .unwrap();
        assert!(t.is_applied());
        assert_eq!(
            f.store
                .get_phase(f.project_id, Phase::Homologation)
                .unwrap()
                .status,
            PhaseStatus::Homologation(HomologationStatus::TechnicalAnalysis)
        );

        let again = f
            .engine
            .confirm_documentation(f.project_id, Role::Admin)
            .unwrap();
        assert!(matches!(again, Transition::Unchanged { .. }));
    }
}
