//! crates/assessment_core/src/publication.rs
//!
//! The draft lifecycle: owner edits while in draft, a one-way publish
//! transition, and the read-time activity predicate.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembly::total_weight;
use crate::domain::{Artifact, ArtifactKind, ArtifactState, CalendarEvent, GeneratedItem};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::{CalendarService, DatabaseService, PortError};
use crate::validation::check_item;

/// Whether a consumer can currently take the artifact. Missing bounds are open.
pub fn is_active(
    published: bool,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    published
        && start_time.map_or(true, |start| start <= now)
        && end_time.map_or(true, |end| now <= end)
}

pub fn artifact_is_active(artifact: &Artifact, now: DateTime<Utc>) -> bool {
    is_active(
        artifact.is_published(),
        artifact.start_time,
        artifact.end_time,
        now,
    )
}

#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Length of the window in minutes, as sent by the client.
    pub duration_minutes: Option<i64>,
}

/// Resolves the availability window. An explicit end wins over a duration;
/// neither leaves the window open-ended.
pub fn resolve_schedule(
    request: &PublishRequest,
    now: DateTime<Utc>,
) -> PipelineResult<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let start = request.start_time.unwrap_or(now);
    let end = match (request.end_time, request.duration_minutes) {
        (Some(end), _) => Some(end),
        (None, Some(minutes)) => {
            if minutes <= 0 {
                return Err(PipelineError::InvalidSchedule(
                    "duration must be positive".to_string(),
                ));
            }
            let end = Duration::try_minutes(minutes)
                .and_then(|duration| start.checked_add_signed(duration))
                .ok_or_else(|| {
                    PipelineError::InvalidSchedule(format!(
                        "a duration of {} minutes is out of range",
                        minutes
                    ))
                })?;
            Some(end)
        }
        (None, None) => None,
    };
    if let Some(end) = end {
        if end <= start {
            return Err(PipelineError::InvalidSchedule(
                "end time must be after start time".to_string(),
            ));
        }
    }
    Ok((start, end))
}

/// Owner-requested changes to a draft.
#[derive(Debug, Clone, Default)]
pub struct DraftEdit {
    pub title: Option<String>,
    pub items: Option<Vec<GeneratedItem>>,
}

#[derive(Clone)]
pub struct PublicationGate {
    db: Arc<dyn DatabaseService>,
    calendar: Arc<dyn CalendarService>,
}

impl PublicationGate {
    pub fn new(db: Arc<dyn DatabaseService>, calendar: Arc<dyn CalendarService>) -> Self {
        Self { db, calendar }
    }

    async fn load_owned(
        &self,
        kind: ArtifactKind,
        artifact_id: Uuid,
        actor: Uuid,
    ) -> PipelineResult<Artifact> {
        let artifact = self.db.get_artifact(kind, artifact_id).await?;
        if artifact.owner_id != actor {
            return Err(PipelineError::NotOwner);
        }
        Ok(artifact)
    }

    /// Writes `artifact` over a row that must still be a draft, so a publish
    /// that committed after our read is never overwritten.
    async fn write_draft(&self, artifact: &Artifact) -> PipelineResult<()> {
        self.db
            .update_artifact(artifact, ArtifactState::Draft)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => PipelineError::AlreadyPublished,
                other => PipelineError::Port(other),
            })
    }

    /// Applies an edit to a draft. Published artifacts are frozen.
    pub async fn update_draft(
        &self,
        kind: ArtifactKind,
        artifact_id: Uuid,
        actor: Uuid,
        edit: DraftEdit,
    ) -> PipelineResult<Artifact> {
        let mut artifact = self.load_owned(kind, artifact_id, actor).await?;
        if artifact.is_published() {
            return Err(PipelineError::AlreadyPublished);
        }

        if let Some(title) = edit.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(PipelineError::InvalidEdit("title must not be empty".to_string()));
            }
            artifact.title = title;
        }

        if let Some(items) = edit.items {
            if items.is_empty() {
                return Err(PipelineError::InvalidEdit(
                    "an artifact needs at least one item".to_string(),
                ));
            }
            for (idx, item) in items.iter().enumerate() {
                if !kind.allows(item.item_kind()) {
                    return Err(PipelineError::InvalidEdit(format!(
                        "item {} is not allowed in a {}",
                        idx + 1,
                        kind
                    )));
                }
                check_item(item).map_err(|reason| {
                    PipelineError::InvalidEdit(format!("item {}: {}", idx + 1, reason))
                })?;
            }
            artifact.total_weight = total_weight(&items);
            artifact.items = items;
        }

        artifact.updated_at = Utc::now();
        self.write_draft(&artifact).await?;
        info!(artifact_id = %artifact.id, kind = %kind, "Draft updated");
        Ok(artifact)
    }

    /// Publishes a draft exactly once and announces it on the calendar.
    /// A calendar failure is logged and never undoes the publish.
    pub async fn publish(
        &self,
        kind: ArtifactKind,
        artifact_id: Uuid,
        actor: Uuid,
        request: PublishRequest,
    ) -> PipelineResult<Artifact> {
        let mut artifact = self.load_owned(kind, artifact_id, actor).await?;
        if artifact.is_published() {
            return Err(PipelineError::AlreadyPublished);
        }

        let now = Utc::now();
        let (start, end) = resolve_schedule(&request, now)?;
        artifact.state = ArtifactState::Published;
        artifact.start_time = Some(start);
        artifact.end_time = end;
        artifact.published_at = Some(now);
        artifact.updated_at = now;
        self.write_draft(&artifact).await?;
        info!(artifact_id = %artifact.id, kind = %kind, start = %start, "Artifact published");

        let event = CalendarEvent {
            title: artifact.title.clone(),
            event_type: kind.as_str().to_string(),
            class_id: artifact.classroom_id,
            owner_id: artifact.owner_id,
            start_date: start,
            end_date: end.unwrap_or(start),
            related_artifact_id: artifact.id,
        };
        if let Err(e) = self.calendar.create_event(event).await {
            warn!(artifact_id = %artifact.id, error = %e, "Failed to create calendar event for published artifact");
        }

        Ok(artifact)
    }

    pub async fn delete(
        &self,
        kind: ArtifactKind,
        artifact_id: Uuid,
        actor: Uuid,
    ) -> PipelineResult<()> {
        self.load_owned(kind, artifact_id, actor).await?;
        self.db.delete_artifact(kind, artifact_id).await?;
        info!(artifact_id = %artifact_id, kind = %kind, "Artifact deleted");
        Ok(())
    }
}
