//! # SolarFlow Core
//!
//! Business logic for tracking residential solar projects from sale to grid
//! connection. No HTTP here; the server crate is a thin layer on top.
//!
//! ## Architecture
//!
//! - `lifecycle/` - Phase statuses, completion validators, stage derivation, transition engine
//! - `state/` - SQLite persistence for clients, projects, phase records and documents
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use solarflow_core::lifecycle::{BroadcastSink, Phase, PhaseStatus, PhaseUpdate, Role, TransitionEngine};
//! use solarflow_core::state::{NewClient, ProjectStore, SolarDb};
//!
//! let db = SolarDb::open()?;
//! let store = Arc::new(ProjectStore::new(&db));
//! let engine = TransitionEngine::new(store.clone(), Arc::new(BroadcastSink::new(64)));
//!
//! let created = store.create_client(&NewClient { name: "Ana".into(), ..Default::default() })?;
//! let outcome = engine.apply_phase_update(created.project_id, Phase::Commercial, update, Role::Commercial)?;
//! ```

pub mod lifecycle;
pub mod state;
