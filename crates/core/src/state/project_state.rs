//! # Project State
//!
//! SQLite-backed store for clients, projects and their phase records. This
//! is the persistence collaborator the transition engine writes through.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::db::SolarDb;
use super::documents::query_documents;
use crate::lifecycle::{
    DerivedState, Document, DocumentationStatus, KitDetails, Phase, PhaseAttributes,
    PhaseRecord, PhaseStatus, PhaseStatuses, PhaseStore, Project, ProjectStatus, Stage,
    StatusClass, StoreError,
};

/// Input for client intake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub tax_id: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Ids produced by client intake
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CreatedClient {
    pub client_id: i64,
    pub project_id: i64,
}

/// Status of one phase as shown to consumers
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub class: StatusClass,
    pub pendencies: Option<String>,
}

/// Read model for project listings
#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    #[serde(flatten)]
    pub project: Project,
    pub client_name: String,
    pub phases: Vec<PhaseSummary>,
}

/// Everything known about one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub client: Client,
    pub phases: Vec<PhaseRecord>,
    pub documents: Vec<Document>,
    pub documentation: DocumentationStatus,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub active_projects: i64,
    pub pending_inspections: i64,
    pub pending_installations: i64,
    pub pending_homologations: i64,
    pub completed_projects: i64,
}

const PROJECT_COLUMNS: &str = "id, client_id, title, status, current_stage, kit_purchased, \
     inverter_model, inverter_power, module_model, module_power, created_at, updated_at";

/// Store for projects and phase records in SQLite
pub struct ProjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectStore {
    pub fn new(db: &SolarDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Lock error: {}", e)))
    }

    /// Create a client together with its project and four phase records
    pub fn create_client(&self, client: &NewClient) -> Result<CreatedClient, StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO clients (name, phone, email, address, city, state, tax_id, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                client.name,
                client.phone,
                client.email,
                client.address,
                client.city,
                client.state,
                client.tax_id,
                client.created_by,
                now,
            ],
        )
        .context("Failed to create client")?;
        let client_id = tx.last_insert_rowid();

        tx.execute(
            r#"
            INSERT INTO projects (client_id, title, status, current_stage, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![
                client_id,
                format!("Solar Project - {}", client.name),
                ProjectStatus::Pending.as_str(),
                Stage::Pending.as_str(),
                now,
            ],
        )
        .context("Failed to create project")?;
        let project_id = tx.last_insert_rowid();

        for phase in Phase::ALL {
            let record = PhaseRecord::not_started(project_id, phase);
            let attributes = serde_json::to_string(&record.attributes)
                .context("Failed to encode phase attributes")?;
            tx.execute(
                r#"
                INSERT INTO phase_records (project_id, phase, status, pendencies, attributes_json, updated_at)
                VALUES (?1, ?2, ?3, NULL, ?4, ?5)
                "#,
                params![project_id, phase.as_str(), record.status.as_str(), attributes, now],
            )
            .with_context(|| format!("Failed to create {} phase record", phase))?;
        }

        tx.commit().context("Failed to commit client intake")?;

        tracing::info!(client_id, project_id, "Client registered");
        Ok(CreatedClient {
            client_id,
            project_id,
        })
    }

    pub fn get_client(&self, client_id: i64) -> Result<Client, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            r#"
            SELECT id, name, phone, email, address, city, state, tax_id, created_by, created_at
            FROM clients WHERE id = ?1
            "#,
            params![client_id],
            |row| {
                let created_at: String = row.get(9)?;
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    email: row.get(3)?,
                    address: row.get(4)?,
                    city: row.get(5)?,
                    state: row.get(6)?,
                    tax_id: row.get(7)?,
                    created_by: row.get(8)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()
        .context("Failed to load client")?
        .ok_or(StoreError::NotFound {
            entity: "client",
            id: client_id,
        })
    }

    /// Project with client, phase records and documents
    pub fn get_detail(&self, project_id: i64) -> Result<ProjectDetail, StoreError> {
        let project = self.get_project(project_id)?;
        let client = self.get_client(project.client_id)?;
        let phases = Phase::ALL
            .into_iter()
            .map(|phase| self.get_phase(project_id, phase))
            .collect::<Result<Vec<_>, _>>()?;
        let documents = self.list_documents(project_id)?;
        let documentation = DocumentationStatus::of(&documents);

        Ok(ProjectDetail {
            project,
            client,
            phases,
            documents,
            documentation,
        })
    }

    /// All projects, most recently updated first
    pub fn list_projects(&self) -> Result<Vec<ProjectOverview>, StoreError> {
        self.list_where(None)
    }

    pub fn list_by_stage(&self, stage: Stage) -> Result<Vec<ProjectOverview>, StoreError> {
        self.list_where(Some(stage))
    }

    fn list_where(&self, stage: Option<Stage>) -> Result<Vec<ProjectOverview>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT p.{}, c.name FROM projects p JOIN clients c ON c.id = p.client_id \
             WHERE (?1 IS NULL OR p.current_stage = ?1 OR p.current_stage = ?2) ORDER BY p.updated_at DESC, p.id DESC",
            PROJECT_COLUMNS.replace(", ", ", p.")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    stage.map(|s| s.as_str()),
                    stage.and_then(|s| s.legacy_token())
                ],
                |row| {
                    Ok((row_to_project(row)?, row.get::<_, String>(12)?))
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list projects")?;

        let mut phases = load_phase_summaries(&conn)?;

        Ok(rows
            .into_iter()
            .map(|(project, client_name)| ProjectOverview {
                phases: phases.remove(&project.id).unwrap_or_default(),
                project,
                client_name,
            })
            .collect())
    }

    pub fn stats(&self) -> Result<ProjectStats, StoreError> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<i64, StoreError> {
            Ok(conn
                .query_row(sql, [], |row| row.get(0))
                .with_context(|| format!("Failed to count: {}", sql))?)
        };

        Ok(ProjectStats {
            active_projects: count(
                "SELECT COUNT(*) FROM projects WHERE status IN ('pending', 'in_progress')",
            )?,
            pending_inspections: count(
                "SELECT COUNT(*) FROM projects WHERE current_stage = 'inspection'",
            )?,
            pending_installations: count(
                "SELECT COUNT(*) FROM projects WHERE current_stage = 'installation'",
            )?,
            pending_homologations: count(
                "SELECT COUNT(*) FROM projects WHERE current_stage = 'homologation'",
            )?,
            completed_projects: count("SELECT COUNT(*) FROM projects WHERE status = 'completed'")?,
        })
    }

    /// Delete a project, cascading its phase records and documents. The
    /// client goes with it once it has no projects left.
    pub fn delete_project(&self, project_id: i64) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let client_id: i64 = tx
            .query_row(
                "SELECT client_id FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load project")?
            .ok_or(StoreError::NotFound {
                entity: "project",
                id: project_id,
            })?;

        tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])
            .context("Failed to delete project")?;
        let clients_removed = tx
            .execute(
                "DELETE FROM clients WHERE id = ?1 \
                 AND NOT EXISTS (SELECT 1 FROM projects WHERE client_id = ?1)",
                params![client_id],
            )
            .context("Failed to delete client")?;
        tx.commit().context("Failed to commit project deletion")?;

        tracing::info!(project_id, client_id, clients_removed, "Project deleted");
        Ok(())
    }
}

impl PhaseStore for ProjectStore {
    fn get_project(&self, project_id: i64) -> Result<Project, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
            params![project_id],
            row_to_project,
        )
        .optional()
        .context("Failed to load project")?
        .ok_or(StoreError::NotFound {
            entity: "project",
            id: project_id,
        })
    }

    fn get_phase(&self, project_id: i64, phase: Phase) -> Result<PhaseRecord, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                r#"
                SELECT status, pendencies, attributes_json, updated_at
                FROM phase_records WHERE project_id = ?1 AND phase = ?2
                "#,
                params![project_id, phase.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("Failed to load {} phase", phase))?
            .ok_or(StoreError::NotFound {
                entity: "phase record",
                id: project_id,
            })?;

        let (status, pendencies, attributes_json, updated_at) = raw;
        tracing::debug!(project_id, %phase, status = ?status, "Loaded phase record");
        Ok(PhaseRecord {
            project_id,
            status: decode_status(phase, status.as_deref())?,
            attributes: decode_attributes(phase, &attributes_json)?,
            pendencies,
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn put_phase(&self, record: &PhaseRecord) -> Result<(), StoreError> {
        let attributes =
            serde_json::to_string(&record.attributes).context("Failed to encode phase attributes")?;

        let conn = self.lock()?;
        let affected = conn
            .execute(
                r#"
                UPDATE phase_records
                SET status = ?1, pendencies = ?2, attributes_json = ?3, updated_at = ?4
                WHERE project_id = ?5 AND phase = ?6
                "#,
                params![
                    record.status.as_str(),
                    record.pendencies,
                    attributes,
                    record.updated_at.to_rfc3339(),
                    record.project_id,
                    record.phase().as_str(),
                ],
            )
            .context("Failed to save phase record")?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "phase record",
                id: record.project_id,
            });
        }
        Ok(())
    }

    fn put_derived(&self, project_id: i64, derived: DerivedState) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let affected = conn
            .execute(
                "UPDATE projects SET current_stage = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    derived.stage.as_str(),
                    derived.status.as_str(),
                    Utc::now().to_rfc3339(),
                    project_id,
                ],
            )
            .context("Failed to save project stage")?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "project",
                id: project_id,
            });
        }
        Ok(())
    }

    fn put_kit(&self, project_id: i64, kit: &KitDetails) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let affected = conn
            .execute(
                r#"
                UPDATE projects
                SET kit_purchased = ?1, inverter_model = ?2, inverter_power = ?3,
                    module_model = ?4, module_power = ?5, updated_at = ?6
                WHERE id = ?7
                "#,
                params![
                    kit.purchased,
                    kit.inverter_model,
                    kit.inverter_power,
                    kit.module_model,
                    kit.module_power,
                    Utc::now().to_rfc3339(),
                    project_id,
                ],
            )
            .context("Failed to save kit purchase")?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "project",
                id: project_id,
            });
        }
        Ok(())
    }

    fn list_documents(&self, project_id: i64) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        query_documents(&conn, project_id)
    }

    fn phase_statuses(&self, project_id: i64) -> Result<PhaseStatuses, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT phase, status FROM phase_records WHERE project_id = ?1")?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load phase statuses")?;

        let mut statuses = PhaseStatuses::initial();
        let mut seen = 0;
        for (phase, status) in rows {
            if let Some(phase) = Phase::parse(&phase) {
                statuses.set(decode_status(phase, status.as_deref())?);
                seen += 1;
            }
        }
        if seen < Phase::ALL.len() {
            return Err(StoreError::NotFound {
                entity: "phase record",
                id: project_id,
            });
        }
        Ok(statuses)
    }
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let status: String = row.get(3)?;
    let stage: String = row.get(4)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Project {
        id: row.get(0)?,
        client_id: row.get(1)?,
        title: row.get(2)?,
        status: ProjectStatus::parse(&status)
            .ok_or_else(|| corrupt(3, "project status", &status))?,
        current_stage: Stage::parse(&stage).ok_or_else(|| corrupt(4, "stage", &stage))?,
        kit: KitDetails {
            purchased: row.get(5)?,
            inverter_model: row.get(6)?,
            inverter_power: row.get(7)?,
            module_model: row.get(8)?,
            module_power: row.get(9)?,
        },
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn corrupt(column: usize, what: &str, token: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown {} '{}'", what, token).into(),
    )
}

fn load_phase_summaries(
    conn: &Connection,
) -> Result<HashMap<i64, Vec<PhaseSummary>>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT project_id, phase, status, pendencies FROM phase_records ORDER BY project_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load phase summaries")?;

    let mut by_project: HashMap<i64, Vec<PhaseSummary>> = HashMap::new();
    for (project_id, phase, status, pendencies) in rows {
        let Some(phase) = Phase::parse(&phase) else {
            continue;
        };
        let status = decode_status(phase, status.as_deref())?;
        by_project.entry(project_id).or_default().push(PhaseSummary {
            phase,
            status,
            class: status.class(),
            pendencies,
        });
    }
    for phases in by_project.values_mut() {
        phases.sort_by_key(|p| p.phase);
    }
    Ok(by_project)
}

fn decode_status(phase: Phase, token: Option<&str>) -> Result<PhaseStatus, StoreError> {
    PhaseStatus::parse_stored(phase, token)
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("Corrupt phase record: {}", e)))
}

fn decode_attributes(phase: Phase, json: &str) -> Result<PhaseAttributes, StoreError> {
    if json.trim().is_empty() || json.trim() == "{}" {
        return Ok(PhaseAttributes::empty(phase));
    }
    let attributes: PhaseAttributes = serde_json::from_str(json)
        .with_context(|| format!("Corrupt {} attributes", phase))?;
    if attributes.phase() != phase {
        return Err(StoreError::Backend(anyhow::anyhow!(
            "{} record holds {} attributes",
            phase,
            attributes.phase()
        )));
    }
    Ok(attributes)
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
