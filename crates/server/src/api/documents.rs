//! Document endpoints and the homologation hand-off.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use solarflow_core::lifecycle::{
    Document, DocumentType, DocumentationStatus, PhaseStore, ProjectEvent, ProjectEventKind,
    Transition,
};
use solarflow_core::state::NewDocument;

use super::{actor_role, require, transition_response};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddDocumentRequest {
    pub title: String,
    /// rg_cnh, art, bill_generator, bill_beneficiary or other
    #[serde(rename = "type")]
    pub doc_type: String,
    pub url: String,
    #[serde(default)]
    pub uploaded_by: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/documents",
    tag = "documents",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Documents of the project, oldest first"),
        (status = 404, description = "No such project")
    )
)]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Document>>, ApiError> {
    actor_role(&headers)?;
    state.store.get_project(id)?;
    Ok(Json(state.store.list_documents(id)?))
}

/// Attach an uploaded document to a project
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/documents",
    tag = "documents",
    params(("id" = i64, Path, description = "Project id")),
    request_body = AddDocumentRequest,
    responses(
        (status = 201, description = "Document stored"),
        (status = 400, description = "Title or URL missing, or unknown document type"),
        (status = 403, description = "Role may not manage documents"),
        (status = 404, description = "No such project")
    )
)]
pub async fn add_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    require(&headers, |r| r.can_manage_back_office(), "manage documents")?;
    if req.title.trim().is_empty() || req.url.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "document title and url are required".to_string(),
        ));
    }

    let doc_type = DocumentType::parse(req.doc_type.trim()).ok_or_else(|| {
        ApiError::BadRequest(format!("unknown document type '{}'", req.doc_type))
    })?;

    let doc = state.store.add_document(&NewDocument {
        project_id: id,
        title: req.title,
        doc_type,
        url: req.url,
        uploaded_by: req.uploaded_by,
    })?;

    state.emit(ProjectEvent::new(ProjectEventKind::DocumentAdded, id));
    Ok((StatusCode::CREATED, Json(doc)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "documents",
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document removed"),
        (status = 403, description = "Role may not manage documents"),
        (status = 404, description = "No such document")
    )
)]
pub async fn remove_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require(&headers, |r| r.can_manage_back_office(), "manage documents")?;
    let removed = state.store.remove_document(id)?;
    state.emit(ProjectEvent::new(
        ProjectEventKind::DocumentRemoved,
        removed.project_id,
    ));
    Ok(StatusCode::NO_CONTENT)
}

/// Mandatory documents present and missing
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/documents/status",
    tag = "documents",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Documentation status"),
        (status = 404, description = "No such project")
    )
)]
pub async fn documentation_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<DocumentationStatus>, ApiError> {
    actor_role(&headers)?;
    Ok(Json(state.store.documentation_status(id)?))
}

/// Send a documentation-complete project to technical analysis
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/documents/confirm",
    tag = "documents",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Homologation moved to technical analysis, or left unchanged"),
        (status = 403, description = "Role may not manage documents"),
        (status = 404, description = "No such project"),
        (status = 422, description = "Mandatory documents missing")
    )
)]
pub async fn confirm_documentation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Transition>, ApiError> {
    let role = require(&headers, |r| r.can_manage_back_office(), "confirm documentation")?;
    transition_response(state.engine.confirm_documentation(id, role)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ROLE_HEADER;
    use axum::http::HeaderValue;
    use solarflow_core::lifecycle::{HomologationStatus, Phase, PhaseStatus, Stage};
    use solarflow_core::state::NewClient;

    fn headers(role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        headers
    }

    fn project(state: &AppState) -> i64 {
        state
            .store
            .create_client(&NewClient {
                name: "Documented".to_string(),
                ..Default::default()
            })
            .unwrap()
            .project_id
    }

    async fn upload(state: &AppState, id: i64, doc_type: &str) -> Document {
        let (status, Json(doc)) = add_document(
            State(state.clone()),
            Path(id),
            headers("ADMIN"),
            Json(AddDocumentRequest {
                title: format!("{} upload", doc_type),
                doc_type: doc_type.to_string(),
                url: format!("https://files/{}.pdf", doc_type),
                uploaded_by: Some(1),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        doc
    }

    #[tokio::test]
    async fn test_upload_and_status() {
        let state = AppState::in_memory();
        let id = project(&state);
        let mut rx = state.events.subscribe();

        upload(&state, id, "rg_cnh").await;
        let doc = upload(&state, id, "other").await;
        assert_eq!(doc.doc_type, DocumentType::Other);
        assert_eq!(rx.recv().await.unwrap().kind, ProjectEventKind::DocumentAdded);

        let Json(status) = documentation_status(State(state.clone()), Path(id), headers("TECHNICAL"))
            .await
            .unwrap();
        assert_eq!(
            status.missing,
            vec![DocumentType::Art, DocumentType::BillGenerator]
        );

        let Json(docs) = list_documents(State(state.clone()), Path(id), headers("CEO"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_document_type_rejected() {
        let state = AppState::in_memory();
        let id = project(&state);

        for doc_type in ["contract", "bill-generator"] {
            let err = add_document(
                State(state.clone()),
                Path(id),
                headers("ADMIN"),
                Json(AddDocumentRequest {
                    title: "Upload".to_string(),
                    doc_type: doc_type.to_string(),
                    url: "https://files/upload.pdf".to_string(),
                    uploaded_by: None,
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }

        assert!(state.store.list_documents(id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commercial_cannot_upload() {
        let state = AppState::in_memory();
        let id = project(&state);
        let err = add_document(
            State(state),
            Path(id),
            headers("COMMERCIAL"),
            Json(AddDocumentRequest {
                title: "ART".to_string(),
                doc_type: "art".to_string(),
                url: "https://files/art.pdf".to_string(),
                uploaded_by: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_remove_document_emits_event() {
        let state = AppState::in_memory();
        let id = project(&state);
        let doc = upload(&state, id, "art").await;
        let mut rx = state.events.subscribe();

        let status = remove_document(State(state.clone()), Path(doc.id), headers("CEO"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ProjectEventKind::DocumentRemoved);
        assert_eq!(event.project_id, id);

        let err = remove_document(State(state.clone()), Path(doc.id), headers("CEO"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_confirm_documentation_flow() {
        let state = AppState::in_memory();
        let id = project(&state);

        let err = confirm_documentation(State(state.clone()), Path(id), headers("ADMIN"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        for t in ["rg_cnh", "art", "bill_generator"] {
            upload(&state, id, t).await;
        }
        let Json(t) = confirm_documentation(State(state.clone()), Path(id), headers("ADMIN"))
            .await
            .unwrap();
        assert!(t.is_applied());

        let record = state.store.get_phase(id, Phase::Homologation).unwrap();
        assert_eq!(
            record.status,
            PhaseStatus::Homologation(HomologationStatus::TechnicalAnalysis)
        );
        // earlier phases untouched: the stage still reports commercial
        assert_eq!(
            state.store.get_project(id).unwrap().current_stage(),
            Stage::Pending
        );
    }
}
