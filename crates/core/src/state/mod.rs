pub mod db;
pub mod documents;
pub mod project_state;

pub use db::SolarDb;

pub use documents::NewDocument;
pub use project_state::{
    Client, CreatedClient, NewClient, PhaseSummary, ProjectDetail, ProjectOverview, ProjectStats,
    ProjectStore,
};
