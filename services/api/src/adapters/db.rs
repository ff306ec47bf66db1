//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `DatabaseService` and `CalendarService` ports from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use assessment_core::domain::{
    Artifact, ArtifactKind, ArtifactState, CalendarEvent, GeneratedItem, SourceDocument,
};
use assessment_core::ports::{CalendarService, DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage-facing ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn weight_column(total_weight: u32) -> PortResult<i32> {
    i32::try_from(total_weight).map_err(|_| {
        PortError::Unexpected(format!("total weight {} does not fit the column", total_weight))
    })
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SourceDocumentRecord {
    id: Uuid,
    classroom_id: Uuid,
    title: String,
    file_id: String,
}
impl SourceDocumentRecord {
    fn to_domain(self) -> SourceDocument {
        SourceDocument {
            id: self.id,
            classroom_id: self.classroom_id,
            title: self.title,
            file_id: self.file_id,
        }
    }
}

#[derive(FromRow)]
struct ArtifactRecord {
    id: Uuid,
    kind: String,
    classroom_id: Uuid,
    owner_id: Uuid,
    title: String,
    source_document_ids: Vec<Uuid>,
    items: Json<Vec<GeneratedItem>>,
    total_weight: i32,
    state: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}
impl ArtifactRecord {
    fn to_domain(self) -> PortResult<Artifact> {
        let kind = self
            .kind
            .parse::<ArtifactKind>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let state = self
            .state
            .parse::<ArtifactState>()
            .map_err(PortError::Unexpected)?;
        Ok(Artifact {
            id: self.id,
            kind,
            classroom_id: self.classroom_id,
            owner_id: self.owner_id,
            title: self.title,
            source_document_ids: self.source_document_ids,
            items: self.items.0,
            total_weight: u32::try_from(self.total_weight).map_err(|_| {
                PortError::Unexpected(format!("negative total weight {}", self.total_weight))
            })?,
            state,
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
            published_at: self.published_at,
        })
    }
}

const ARTIFACT_COLUMNS: &str = "id, kind, classroom_id, owner_id, title, source_document_ids, items, \
     total_weight, state, start_time, end_time, created_at, updated_at, published_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_documents(
        &self,
        classroom_id: Uuid,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<SourceDocument>> {
        let records = sqlx::query_as::<_, SourceDocumentRecord>(
            "SELECT id, classroom_id, title, file_id FROM source_documents \
             WHERE classroom_id = $1 AND id = ANY($2)",
        )
        .bind(classroom_id)
        .bind(document_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> PortResult<()> {
        let total_weight = weight_column(artifact.total_weight)?;
        sqlx::query(
            "INSERT INTO artifacts (id, kind, classroom_id, owner_id, title, source_document_ids, \
             items, total_weight, state, start_time, end_time, created_at, updated_at, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(artifact.id)
        .bind(artifact.kind.as_str())
        .bind(artifact.classroom_id)
        .bind(artifact.owner_id)
        .bind(&artifact.title)
        .bind(&artifact.source_document_ids)
        .bind(Json(&artifact.items))
        .bind(total_weight)
        .bind(artifact.state.as_str())
        .bind(artifact.start_time)
        .bind(artifact.end_time)
        .bind(artifact.created_at)
        .bind(artifact.updated_at)
        .bind(artifact.published_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<Artifact> {
        let record = sqlx::query_as::<_, ArtifactRecord>(&format!(
            "SELECT {} FROM artifacts WHERE id = $1 AND kind = $2",
            ARTIFACT_COLUMNS
        ))
        .bind(artifact_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("{} {} not found", kind, artifact_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_artifacts(
        &self,
        kind: ArtifactKind,
        classroom_id: Uuid,
    ) -> PortResult<Vec<Artifact>> {
        let records = sqlx::query_as::<_, ArtifactRecord>(&format!(
            "SELECT {} FROM artifacts WHERE kind = $1 AND classroom_id = $2 ORDER BY created_at DESC",
            ARTIFACT_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_artifact(
        &self,
        artifact: &Artifact,
        expected: ArtifactState,
    ) -> PortResult<()> {
        let total_weight = weight_column(artifact.total_weight)?;
        let result = sqlx::query(
            "UPDATE artifacts SET title = $1, items = $2, total_weight = $3, state = $4, \
             start_time = $5, end_time = $6, updated_at = $7, published_at = $8 \
             WHERE id = $9 AND kind = $10 AND state = $11",
        )
        .bind(&artifact.title)
        .bind(Json(&artifact.items))
        .bind(total_weight)
        .bind(artifact.state.as_str())
        .bind(artifact.start_time)
        .bind(artifact.end_time)
        .bind(artifact.updated_at)
        .bind(artifact.published_at)
        .bind(artifact.id)
        .bind(artifact.kind.as_str())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            // Tell a vanished row apart from one whose state moved on.
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM artifacts WHERE id = $1 AND kind = $2)",
            )
            .bind(artifact.id)
            .bind(artifact.kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

            return Err(if exists {
                PortError::Conflict(format!(
                    "{} {} is no longer {}",
                    artifact.kind,
                    artifact.id,
                    expected.as_str()
                ))
            } else {
                PortError::NotFound(format!("{} {} not found", artifact.kind, artifact.id))
            });
        }
        Ok(())
    }

    async fn delete_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = $1 AND kind = $2")
            .bind(artifact_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("{} {} not found", kind, artifact_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `CalendarService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CalendarService for DbAdapter {
    async fn create_event(&self, event: CalendarEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO calendar_events (id, title, event_type, class_id, owner_id, start_date, \
             end_date, related_artifact_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.event_type)
        .bind(event.class_id)
        .bind(event.owner_id)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.related_artifact_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
