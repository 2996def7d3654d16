//! Project documents: identity proof, ART, utility bills.
//!
//! Uploading and removing documents never touches phase records. The
//! homologation gate reads them through [`PhaseStore::list_documents`].
//!
//! [`PhaseStore::list_documents`]: crate::lifecycle::PhaseStore::list_documents

use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::project_state::{parse_timestamp, ProjectStore};
use crate::lifecycle::{Document, DocumentType, DocumentationStatus, PhaseStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub project_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub url: String,
    #[serde(default)]
    pub uploaded_by: Option<i64>,
}

impl ProjectStore {
    pub fn add_document(&self, doc: &NewDocument) -> Result<Document, StoreError> {
        // surfaces NotFound instead of a foreign key failure
        self.get_project(doc.project_id)?;

        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO documents (project_id, title, doc_type, url, uploaded_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.project_id,
                doc.title,
                doc.doc_type.as_str(),
                doc.url,
                doc.uploaded_by,
                now.to_rfc3339(),
            ],
        )
        .context("Failed to add document")?;

        let id = conn.last_insert_rowid();
        tracing::info!(
            project_id = doc.project_id,
            document_id = id,
            doc_type = doc.doc_type.as_str(),
            "Document added"
        );

        Ok(Document {
            id,
            project_id: doc.project_id,
            title: doc.title.clone(),
            doc_type: doc.doc_type,
            url: doc.url.clone(),
            uploaded_by: doc.uploaded_by,
            created_at: now,
        })
    }

    /// Remove a document, returning what was removed
    pub fn remove_document(&self, document_id: i64) -> Result<Document, StoreError> {
        let conn = self.lock()?;
        let doc = conn
            .query_row(
                r#"
                SELECT id, project_id, title, doc_type, url, uploaded_by, created_at
                FROM documents WHERE id = ?1
                "#,
                params![document_id],
                row_to_document,
            )
            .optional()
            .context("Failed to load document")?
            .ok_or(StoreError::NotFound {
                entity: "document",
                id: document_id,
            })?;

        conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .context("Failed to remove document")?;

        tracing::info!(project_id = doc.project_id, document_id, "Document removed");
        Ok(doc)
    }

    pub fn documentation_status(&self, project_id: i64) -> Result<DocumentationStatus, StoreError> {
        self.get_project(project_id)?;
        Ok(DocumentationStatus::of(&self.list_documents(project_id)?))
    }
}

/// Documents of a project, oldest first
pub(super) fn query_documents(
    conn: &Connection,
    project_id: i64,
) -> Result<Vec<Document>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, project_id, title, doc_type, url, uploaded_by, created_at
        FROM documents WHERE project_id = ?1 ORDER BY id
        "#,
    )?;

    let docs = stmt
        .query_map(params![project_id], row_to_document)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list documents")?;
    Ok(docs)
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let doc_type: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    Ok(Document {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        doc_type: DocumentType::from_str(&doc_type),
        url: row.get(4)?,
        uploaded_by: row.get(5)?,
        created_at: parse_timestamp(&created_at),
    })
}
