//! # Project API
//!
//! Client intake, project queries, phase updates and the kit purchase.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use solarflow_core::lifecycle::{
    CommercialAttributes, InstallationAttributes, KitDetails, Phase, PhaseAttributes,
    PhaseStatus, PhaseStore, PhaseUpdate, ProjectEvent, ProjectEventKind, Stage,
    TechnicalAttributes, Transition,
};
use solarflow_core::state::{NewClient, ProjectDetail, ProjectOverview, ProjectStats};

use super::{actor_role, require, transition_response};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// CPF or CNPJ
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub client_id: i64,
    pub project_id: i64,
}

/// Update of one phase; `data` holds the phase's attribute fields
#[derive(Debug, Deserialize, ToSchema)]
pub struct PhaseUpdateRequest {
    pub status: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub pendencies: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KitRequest {
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

/// Register a client together with its project
#[utoipa::path(
    post,
    path = "/api/v1/clients",
    tag = "projects",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client and project created", body = CreatedResponse),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Role may not register clients")
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    require(&headers, |r| r.can_edit(Phase::Commercial), "register clients")?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("client name is required".to_string()));
    }

    let created = state.store.create_client(&NewClient {
        name: req.name.trim().to_string(),
        phone: req.phone,
        email: req.email,
        address: req.address,
        city: req.city,
        state: req.state,
        tax_id: req.tax_id,
        created_by: req.created_by,
    })?;

    state.emit(ProjectEvent::new(
        ProjectEventKind::ProjectCreated,
        created.project_id,
    ));

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            client_id: created.client_id,
            project_id: created.project_id,
        }),
    ))
}

/// List projects with their per-phase statuses
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    responses(
        (status = 200, description = "All projects, most recently updated first")
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProjectOverview>>, ApiError> {
    actor_role(&headers)?;
    Ok(Json(state.store.list_projects()?))
}

/// List projects currently at one stage
#[utoipa::path(
    get,
    path = "/api/v1/projects/stage/{stage}",
    tag = "projects",
    params(("stage" = String, Path, description = "pending, inspection, installation, homologation or completed")),
    responses(
        (status = 200, description = "Projects at the stage"),
        (status = 400, description = "Unknown stage")
    )
)]
pub async fn list_by_stage(
    State(state): State<AppState>,
    Path(stage): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProjectOverview>>, ApiError> {
    actor_role(&headers)?;
    let stage = Stage::parse(&stage)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown stage '{}'", stage)))?;
    Ok(Json(state.store.list_by_stage(stage)?))
}

/// Project with client, phase records and documents
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail"),
        (status = 404, description = "No such project")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ProjectDetail>, ApiError> {
    actor_role(&headers)?;
    Ok(Json(state.store.get_detail(id)?))
}

/// Delete a project with its phase records and documents
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Only the CEO may delete"),
        (status = 404, description = "No such project")
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let role = require(&headers, |r| r.can_delete_projects(), "delete projects")?;
    state.store.delete_project(id)?;
    tracing::info!(project_id = id, %role, "Project removed via API");
    state.emit(ProjectEvent::new(ProjectEventKind::ProjectDeleted, id));
    Ok(StatusCode::NO_CONTENT)
}

/// Update one phase of a project
#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}/{phase}",
    tag = "projects",
    params(
        ("id" = i64, Path, description = "Project id"),
        ("phase" = String, Path, description = "commercial, technical, installation or homologation")
    ),
    request_body = PhaseUpdateRequest,
    responses(
        (status = 200, description = "Update applied"),
        (status = 400, description = "Unknown status token or malformed data"),
        (status = 403, description = "Role does not own the phase"),
        (status = 404, description = "No such project or phase"),
        (status = 422, description = "Advancement preconditions unsatisfied")
    )
)]
pub async fn update_phase(
    State(state): State<AppState>,
    Path((id, phase)): Path<(i64, String)>,
    headers: HeaderMap,
    Json(req): Json<PhaseUpdateRequest>,
) -> Result<Json<Transition>, ApiError> {
    let phase =
        Phase::parse(&phase).ok_or_else(|| ApiError::NotFound(format!("unknown phase '{}'", phase)))?;
    let role = require(&headers, |r| r.can_edit(phase), &format!("edit the {} phase", phase))?;

    let status = PhaseStatus::parse(phase, req.status.trim())?;
    let attributes = attributes_from(phase, req.data)?;
    let mut update = PhaseUpdate::new(status, attributes);
    update.pendencies = req.pendencies.filter(|p| !p.trim().is_empty());

    transition_response(state.engine.apply_phase_update(id, phase, update, role)?)
}

/// Record the purchased equipment kit
#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}/kit",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = KitRequest,
    responses(
        (status = 200, description = "Kit saved"),
        (status = 403, description = "Role may not manage purchases"),
        (status = 404, description = "No such project")
    )
)]
pub async fn update_kit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<KitRequest>,
) -> Result<Json<KitDetails>, ApiError> {
    let role = require(&headers, |r| r.can_manage_back_office(), "manage kit purchases")?;
    let kit = KitDetails {
        purchased: req.purchased,
        inverter_model: req.inverter_model,
        inverter_power: req.inverter_power,
        module_model: req.module_model,
        module_power: req.module_power,
    };
    state.engine.apply_kit_update(id, &kit, role)?;
    Ok(Json(state.store.get_project(id)?.kit))
}

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "projects",
    responses(
        (status = 200, description = "Project counters")
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProjectStats>, ApiError> {
    actor_role(&headers)?;
    Ok(Json(state.store.stats()?))
}

/// Decode the attribute payload of `phase`; null means no fields
fn attributes_from(phase: Phase, data: serde_json::Value) -> Result<PhaseAttributes, ApiError> {
    if data.is_null() {
        return Ok(PhaseAttributes::empty(phase));
    }
    let invalid = |e: serde_json::Error| ApiError::BadRequest(format!("invalid {} data: {}", phase, e));

    Ok(match phase {
        Phase::Commercial => PhaseAttributes::Commercial(
            serde_json::from_value::<CommercialAttributes>(data).map_err(invalid)?,
        ),
        Phase::Technical => PhaseAttributes::Technical(
            serde_json::from_value::<TechnicalAttributes>(data).map_err(invalid)?,
        ),
        Phase::Installation => PhaseAttributes::Installation(
            serde_json::from_value::<InstallationAttributes>(data).map_err(invalid)?,
        ),
        Phase::Homologation => PhaseAttributes::Homologation,
    })
}
