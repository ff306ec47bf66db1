//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the artifact REST endpoints and the master
//! definition for the OpenAPI specification. Every artifact kind shares the
//! same handlers; the kind is the first path segment.

use crate::web::middleware::UserId;
use crate::web::state::AppState;
use assessment_core::domain::{Artifact, ArtifactKind, ArtifactState, GeneratedItem};
use assessment_core::error::PipelineError;
use assessment_core::pipeline::{GenerateRequest, GenerationStats};
use assessment_core::ports::{PortError, ProviderError};
use assessment_core::publication::{artifact_is_active, DraftEdit, PublishRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_handler,
        get_artifact_handler,
        list_artifacts_handler,
        update_artifact_handler,
        publish_artifact_handler,
        delete_artifact_handler,
        list_active_handler,
    ),
    components(
        schemas(
            GenerateArtifactRequest,
            GenerateArtifactResponse,
            ArtifactResponse,
            ActiveArtifactSummary,
            UpdateArtifactRequest,
            PublishArtifactRequest,
            ErrorBody
        )
    ),
    tags(
        (name = "Assessment Generation API", description = "Generate, edit and publish quizzes, assignments and test papers from lecture documents.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateArtifactRequest {
    #[serde(default)]
    pub document_ids: Vec<Uuid>,
    pub classroom_id: Option<Uuid>,
}

/// A draft or published artifact as returned to its owner.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: ArtifactKind,
    pub classroom_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub source_document_ids: Vec<Uuid>,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<GeneratedItem>,
    pub total_weight: u32,
    #[schema(value_type = String)]
    pub state: ArtifactState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArtifactResponse {
    fn new(artifact: Artifact, now: DateTime<Utc>) -> Self {
        Self {
            is_active: artifact_is_active(&artifact, now),
            id: artifact.id,
            kind: artifact.kind,
            classroom_id: artifact.classroom_id,
            owner_id: artifact.owner_id,
            title: artifact.title,
            source_document_ids: artifact.source_document_ids,
            items: artifact.items,
            total_weight: artifact.total_weight,
            state: artifact.state,
            start_time: artifact.start_time,
            end_time: artifact.end_time,
            created_at: artifact.created_at,
            updated_at: artifact.updated_at,
            published_at: artifact.published_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GenerateArtifactResponse {
    pub artifact: ArtifactResponse,
    #[schema(value_type = Object)]
    pub stats: GenerationStats,
}

/// Consumer-facing view of a published artifact. Answer keys are never included.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveArtifactSummary {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: ArtifactKind,
    pub title: String,
    pub item_count: usize,
    pub total_weight: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArtifactRequest {
    pub title: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub items: Option<Vec<GeneratedItem>>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishArtifactRequest {
    /// Availability window length in minutes.
    pub duration: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub stats: Option<GenerationStats>,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

//=========================================================================================
// Error Mapping
//=========================================================================================

fn classify(err: &PipelineError) -> (StatusCode, &'static str) {
    match err {
        PipelineError::NoDocumentsSelected => (StatusCode::BAD_REQUEST, "NoDocumentsSelected"),
        PipelineError::MissingClassroom => (StatusCode::BAD_REQUEST, "MissingClassroom"),
        PipelineError::DocumentsNotFound => (StatusCode::NOT_FOUND, "DocumentsNotFound"),
        PipelineError::NoExtractableContent { .. } => {
            (StatusCode::BAD_REQUEST, "NoExtractableContent")
        }
        PipelineError::ContentTooShort { .. } => (StatusCode::BAD_REQUEST, "ContentTooShort"),
        PipelineError::ContentNotProse => (StatusCode::BAD_REQUEST, "ContentNotProse"),
        PipelineError::AllCredentialsExhausted { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "AllCredentialsExhausted")
        }
        PipelineError::Provider(ProviderError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "ProviderTimeout")
        }
        PipelineError::Provider(_) => (StatusCode::INTERNAL_SERVER_ERROR, "GenerationFailed"),
        PipelineError::MalformedResponse(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "MalformedResponse")
        }
        PipelineError::NoValidItemsGenerated => {
            (StatusCode::INTERNAL_SERVER_ERROR, "NoValidItemsGenerated")
        }
        PipelineError::NotOwner => (StatusCode::FORBIDDEN, "NotOwner"),
        PipelineError::AlreadyPublished => (StatusCode::CONFLICT, "AlreadyPublished"),
        PipelineError::InvalidEdit(_) => (StatusCode::BAD_REQUEST, "InvalidEdit"),
        PipelineError::InvalidSchedule(_) => (StatusCode::BAD_REQUEST, "InvalidSchedule"),
        // Client went away; nobody will read this.
        PipelineError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "Cancelled"),
        PipelineError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, "NotFound"),
        PipelineError::Port(PortError::Conflict(_)) => (StatusCode::CONFLICT, "Conflict"),
        PipelineError::Port(PortError::Unexpected(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "PersistenceError")
        }
    }
}

fn error_response(
    err: PipelineError,
    stats: Option<GenerationStats>,
) -> (StatusCode, Json<ErrorBody>) {
    let (status, code) = classify(&err);
    if status.is_server_error() {
        error!("Request failed: {:?}", err);
    }
    (
        status,
        Json(ErrorBody {
            error: code.to_string(),
            details: err.to_string(),
            stats,
        }),
    )
}

fn port_error(err: PortError) -> (StatusCode, Json<ErrorBody>) {
    error_response(PipelineError::Port(err), None)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a draft artifact from uploaded lecture documents.
#[utoipa::path(
    post,
    path = "/{kind}/generate-ai",
    request_body = GenerateArtifactRequest,
    responses(
        (status = 201, description = "Draft generated", body = GenerateArtifactResponse),
        (status = 400, description = "No documents selected or content unusable", body = ErrorBody),
        (status = 404, description = "None of the documents exist in the classroom", body = ErrorBody),
        (status = 500, description = "Generation failed", body = ErrorBody),
        (status = 503, description = "All provider credentials are exhausted", body = ErrorBody)
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the calling teacher.")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(kind): Path<ArtifactKind>,
    Json(body): Json<GenerateArtifactRequest>,
) -> ApiResult<impl IntoResponse> {
    // Dropping the handler future (client disconnect) cancels in-flight work.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let request = GenerateRequest {
        kind,
        classroom_id: body.classroom_id,
        owner_id: user_id,
        document_ids: body.document_ids,
    };

    match app_state.pipeline.generate(request, &cancel).await {
        Ok(outcome) => {
            let response = GenerateArtifactResponse {
                artifact: ArtifactResponse::new(outcome.artifact, Utc::now()),
                stats: outcome.stats,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(failure) => Err(error_response(failure.error, Some(failure.stats))),
    }
}

/// Fetch one artifact.
#[utoipa::path(
    get,
    path = "/{kind}/{id}",
    responses(
        (status = 200, description = "The artifact", body = ArtifactResponse),
        (status = 404, description = "No such artifact", body = ErrorBody)
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("id" = Uuid, Path, description = "Artifact id")
    )
)]
pub async fn get_artifact_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, id)): Path<(ArtifactKind, Uuid)>,
) -> ApiResult<Json<ArtifactResponse>> {
    let artifact = app_state.db.get_artifact(kind, id).await.map_err(port_error)?;
    Ok(Json(ArtifactResponse::new(artifact, Utc::now())))
}

/// List a classroom's artifacts, newest first.
#[utoipa::path(
    get,
    path = "/{kind}/classroom/{classroom_id}",
    responses(
        (status = 200, description = "Artifacts of the classroom", body = [ArtifactResponse])
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("classroom_id" = Uuid, Path, description = "Classroom id")
    )
)]
pub async fn list_artifacts_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, classroom_id)): Path<(ArtifactKind, Uuid)>,
) -> ApiResult<Json<Vec<ArtifactResponse>>> {
    let now = Utc::now();
    let artifacts = app_state
        .db
        .list_artifacts(kind, classroom_id)
        .await
        .map_err(port_error)?;
    Ok(Json(
        artifacts
            .into_iter()
            .map(|a| ArtifactResponse::new(a, now))
            .collect(),
    ))
}

/// Edit a draft's title or items. Published artifacts are frozen.
#[utoipa::path(
    put,
    path = "/{kind}/{id}",
    request_body = UpdateArtifactRequest,
    responses(
        (status = 200, description = "Updated draft", body = ArtifactResponse),
        (status = 400, description = "Edited items are structurally invalid", body = ErrorBody),
        (status = 403, description = "Caller does not own the artifact", body = ErrorBody),
        (status = 409, description = "Artifact is already published", body = ErrorBody)
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("id" = Uuid, Path, description = "Artifact id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the calling teacher.")
    )
)]
pub async fn update_artifact_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((kind, id)): Path<(ArtifactKind, Uuid)>,
    Json(body): Json<UpdateArtifactRequest>,
) -> ApiResult<Json<ArtifactResponse>> {
    let edit = DraftEdit {
        title: body.title,
        items: body.items,
    };
    let artifact = app_state
        .gate
        .update_draft(kind, id, user_id, edit)
        .await
        .map_err(|e| error_response(e, None))?;
    Ok(Json(ArtifactResponse::new(artifact, Utc::now())))
}

/// Publish a draft and announce it on the classroom calendar.
#[utoipa::path(
    put,
    path = "/{kind}/{id}/publish",
    request_body = PublishArtifactRequest,
    responses(
        (status = 200, description = "Published artifact", body = ArtifactResponse),
        (status = 400, description = "Invalid schedule", body = ErrorBody),
        (status = 403, description = "Caller does not own the artifact", body = ErrorBody),
        (status = 409, description = "Artifact is already published", body = ErrorBody)
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("id" = Uuid, Path, description = "Artifact id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the calling teacher.")
    )
)]
pub async fn publish_artifact_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((kind, id)): Path<(ArtifactKind, Uuid)>,
    Json(body): Json<PublishArtifactRequest>,
) -> ApiResult<Json<ArtifactResponse>> {
    let request = PublishRequest {
        start_time: body.start_time,
        end_time: body.end_time,
        duration_minutes: body.duration,
    };
    let artifact = app_state
        .gate
        .publish(kind, id, user_id, request)
        .await
        .map_err(|e| error_response(e, None))?;
    Ok(Json(ArtifactResponse::new(artifact, Utc::now())))
}

/// Permanently delete an artifact.
#[utoipa::path(
    delete,
    path = "/{kind}/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller does not own the artifact", body = ErrorBody),
        (status = 404, description = "No such artifact", body = ErrorBody)
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("id" = Uuid, Path, description = "Artifact id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the calling teacher.")
    )
)]
pub async fn delete_artifact_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((kind, id)): Path<(ArtifactKind, Uuid)>,
) -> ApiResult<StatusCode> {
    app_state
        .gate
        .delete(kind, id, user_id)
        .await
        .map_err(|e| error_response(e, None))?;
    Ok(StatusCode::NO_CONTENT)
}

/// List a classroom's published artifacts with their current availability.
#[utoipa::path(
    get,
    path = "/{kind}/active/classroom/{classroom_id}",
    responses(
        (status = 200, description = "Published artifacts of the classroom", body = [ActiveArtifactSummary])
    ),
    params(
        ("kind" = String, Path, description = "quiz, assignment or test-paper"),
        ("classroom_id" = Uuid, Path, description = "Classroom id")
    )
)]
pub async fn list_active_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, classroom_id)): Path<(ArtifactKind, Uuid)>,
) -> ApiResult<Json<Vec<ActiveArtifactSummary>>> {
    let now = Utc::now();
    let artifacts = app_state
        .db
        .list_artifacts(kind, classroom_id)
        .await
        .map_err(port_error)?;

    let summaries = artifacts
        .into_iter()
        .filter(Artifact::is_published)
        .map(|a| ActiveArtifactSummary {
            is_active: artifact_is_active(&a, now),
            id: a.id,
            kind: a.kind,
            title: a.title,
            item_count: a.items.len(),
            total_weight: a.total_weight,
            start_time: a.start_time,
            end_time: a.end_time,
        })
        .collect();
    Ok(Json(summaries))
}
