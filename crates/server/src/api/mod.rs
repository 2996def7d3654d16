//! # v1 API
//!
//! Routes, OpenAPI document and the actor-role guard shared by handlers.

pub mod documents;
pub mod events;
pub mod project;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use utoipa::OpenApi;

use solarflow_core::lifecycle::{Role, Transition};

use crate::config::ResolvedConfig;
use crate::error::ApiError;
use crate::AppState;

/// Header carrying the authenticated actor's role
pub const ROLE_HEADER: &str = "x-actor-role";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SolarFlow API",
        version = "1.0.0",
        description = "Lifecycle tracking for residential solar projects"
    ),
    paths(
        project::create_client,
        project::list_projects,
        project::list_by_stage,
        project::get_project,
        project::delete_project,
        project::update_phase,
        project::update_kit,
        project::get_stats,
        documents::list_documents,
        documents::add_document,
        documents::remove_document,
        documents::documentation_status,
        documents::confirm_documentation,
        get_config
    ),
    components(
        schemas(
            project::CreateClientRequest,
            project::CreatedResponse,
            project::PhaseUpdateRequest,
            project::KitRequest,
            documents::AddDocumentRequest,
            ResolvedConfig
        )
    ),
    tags(
        (name = "projects", description = "Client intake, project queries and phase updates"),
        (name = "documents", description = "Project documents and homologation hand-off"),
        (name = "config", description = "Effective server configuration")
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    let project_routes = Router::new()
        .route("/", get(project::list_projects))
        .route("/stage/:stage", get(project::list_by_stage))
        .route(
            "/:id",
            get(project::get_project).delete(project::delete_project),
        )
        .route("/:id/kit", put(project::update_kit))
        .route(
            "/:id/documents",
            get(documents::list_documents).post(documents::add_document),
        )
        .route("/:id/documents/status", get(documents::documentation_status))
        .route(
            "/:id/documents/confirm",
            post(documents::confirm_documentation),
        )
        .route("/:id/:phase", put(project::update_phase));

    Router::new()
        .nest("/api/v1/projects", project_routes)
        .route("/api/v1/clients", post(project::create_client))
        .route("/api/v1/documents/:id", delete(documents::remove_document))
        .route("/api/v1/stats", get(project::get_stats))
        .route("/api/v1/events", get(events::events))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/openapi.json", get(serve_openapi))
}

/// Resolve the acting role from the request headers
pub fn actor_role(headers: &HeaderMap) -> Result<Role, ApiError> {
    let value = headers
        .get(ROLE_HEADER)
        .ok_or_else(|| ApiError::Forbidden(format!("missing {} header", ROLE_HEADER)))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Forbidden("unreadable role header".to_string()))?;
    Role::parse(value).ok_or_else(|| ApiError::Forbidden(format!("unknown role '{}'", value)))
}

/// Require a role that satisfies `allowed`
pub fn require(
    headers: &HeaderMap,
    allowed: impl FnOnce(Role) -> bool,
    action: &str,
) -> Result<Role, ApiError> {
    let role = actor_role(headers)?;
    if allowed(role) {
        Ok(role)
    } else {
        Err(ApiError::Forbidden(format!("{} may not {}", role, action)))
    }
}

/// Rejections become 422 responses; anything else is returned as is
pub fn transition_response(transition: Transition) -> Result<Json<Transition>, ApiError> {
    match transition {
        Transition::Rejected { phase, missing, .. } => {
            Err(ApiError::Unsatisfied { phase, missing })
        }
        other => Ok(Json(other)),
    }
}

/// Effective configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Effective configuration", body = ResolvedConfig)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<ResolvedConfig> {
    Json(state.config.as_ref().clone())
}

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(spec))
            .map(IntoResponse::into_response)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => ApiError::Internal(e.into()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        headers
    }

    #[test]
    fn test_actor_role_from_header() {
        assert_eq!(actor_role(&headers("technical")).unwrap(), Role::Technical);
        assert!(matches!(
            actor_role(&HeaderMap::new()),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            actor_role(&headers("INSTALLER")),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_require_checks_permission() {
        let err = require(&headers("COMMERCIAL"), |r| r.can_delete_projects(), "delete projects")
            .unwrap_err();
        assert_eq!(err.to_string(), "COMMERCIAL may not delete projects");
        assert!(require(&headers("CEO"), |r| r.can_delete_projects(), "delete projects").is_ok());
    }

    #[test]
    fn test_openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/projects/{id}/{phase}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/clients"));
    }

    #[test]
    fn test_router_builds() {
        let _router: Router<AppState> = router();
    }
}
