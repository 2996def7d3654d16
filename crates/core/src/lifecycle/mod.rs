//! # Project Lifecycle
//!
//! Phase vocabulary, completion rules, stage derivation and the transition
//! engine that ties them together.
//!
//! ```text
//! Commercial ──► Technical ──► Installation ──► Homologation
//!   pending      inspection     installation     homologation ──► completed
//! ```

pub mod attributes;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod roles;
pub mod stage;
pub mod status;
pub mod store;
pub mod validators;

pub use attributes::{
    CommercialAttributes, InstallationAttributes, KitDetails, PaymentMethod, PhaseAttributes,
    PhotoSlot, StructureType, TechnicalAttributes,
};
pub use engine::{PhaseUpdate, Transition, TransitionEngine};
pub use error::{LifecycleError, NotificationError, StoreError};
pub use events::{emit, BroadcastSink, EventSink, ProjectEvent, ProjectEventKind, UpdateScope};
pub use model::{
    DerivedState, Document, DocumentType, DocumentationStatus, PhaseRecord, Project, ProjectStatus,
};
pub use roles::Role;
pub use stage::{derive, derive_project_status, derive_stage, PhaseStatuses, Stage};
pub use status::{HomologationStatus, Phase, PhaseStatus, StatusClass, StepStatus};
pub use store::PhaseStore;
pub use validators::{Precondition, ValidationInput};
