//! In-memory fakes of every port plus helpers to drive the real router.
#![allow(dead_code)]

use api_lib::web::{router, state::AppState};
use assessment_core::corpus::CorpusLimits;
use assessment_core::extraction::DocumentExtractor;
use assessment_core::generation::GenerationClient;
use assessment_core::ports::{
    BlobStore, ByteStream, CalendarService, DatabaseService, PortError, PortResult,
    ProviderError, TextGenerationService,
};
use assessment_core::{
    Artifact, ArtifactKind, ArtifactState, AssessmentPipeline, CalendarEvent, Credential,
    CredentialPool, GeneratedItem, GenerationSpec, ItemBody, PipelineSettings, PublicationGate,
    SourceDocument,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Port Fakes
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDb {
    pub documents: Mutex<HashMap<Uuid, SourceDocument>>,
    pub artifacts: Mutex<HashMap<Uuid, Artifact>>,
}

impl InMemoryDb {
    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn find_documents(
        &self,
        classroom_id: Uuid,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<SourceDocument>> {
        let documents = self.documents.lock().unwrap();
        Ok(document_ids
            .iter()
            .filter_map(|id| documents.get(id))
            .filter(|doc| doc.classroom_id == classroom_id)
            .cloned()
            .collect())
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> PortResult<()> {
        self.artifacts
            .lock()
            .unwrap()
            .insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn get_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<Artifact> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&artifact_id)
            .filter(|a| a.kind == kind)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("{} {} not found", kind, artifact_id)))
    }

    async fn list_artifacts(
        &self,
        kind: ArtifactKind,
        classroom_id: Uuid,
    ) -> PortResult<Vec<Artifact>> {
        let mut found: Vec<Artifact> = self
            .artifacts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.kind == kind && a.classroom_id == classroom_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_artifact(
        &self,
        artifact: &Artifact,
        expected: ArtifactState,
    ) -> PortResult<()> {
        let mut artifacts = self.artifacts.lock().unwrap();
        match artifacts.get_mut(&artifact.id) {
            Some(existing) if existing.kind == artifact.kind => {
                if existing.state != expected {
                    return Err(PortError::Conflict(artifact.id.to_string()));
                }
                *existing = artifact.clone();
                Ok(())
            }
            _ => Err(PortError::NotFound(artifact.id.to_string())),
        }
    }

    async fn delete_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<()> {
        let mut artifacts = self.artifacts.lock().unwrap();
        match artifacts.get(&artifact_id) {
            Some(a) if a.kind == kind => {
                artifacts.remove(&artifact_id);
                Ok(())
            }
            _ => Err(PortError::NotFound(artifact_id.to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemBlobStore {
    pub fn put(&self, file_id: &str, contents: impl Into<Bytes>) {
        self.blobs
            .lock()
            .unwrap()
            .insert(file_id.to_string(), contents.into());
    }
}

#[async_trait]
impl BlobStore for MemBlobStore {
    async fn open_read_stream(&self, file_id: &str) -> PortResult<ByteStream> {
        let bytes = self
            .blobs
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Blob {} not found", file_id)))?;
        Ok(Box::pin(futures::stream::iter(vec![Ok::<_, PortError>(bytes)])))
    }
}

#[derive(Default)]
pub struct RecordingCalendar {
    pub events: Mutex<Vec<CalendarEvent>>,
    pub failing: AtomicBool,
}

#[async_trait]
impl CalendarService for RecordingCalendar {
    async fn create_event(&self, event: CalendarEvent) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("calendar is down".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Replays canned provider replies in order and records which credential each call used.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn push(&self, reply: Result<String, ProviderError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_with(&self, body: Value) {
        self.push(Ok(body.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn credentials_used(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedProvider {
    async fn generate_text(
        &self,
        credential: &Credential,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(credential.id.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Rejected("no scripted reply left".to_string())))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub db: Arc<InMemoryDb>,
    pub blobs: Arc<MemBlobStore>,
    pub calendar: Arc<RecordingCalendar>,
    pub provider: Arc<ScriptedProvider>,
    pub pool_size: usize,
    pub classroom_id: Uuid,
    pub teacher_id: Uuid,
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        limits: CorpusLimits::default(),
        quiz: GenerationSpec::mcq_quiz(4, 1),
        assignment: GenerationSpec::short_answer_assignment(2, 5),
        test_paper: GenerationSpec::mixed_test_paper((2, 1), (1, 3), (1, 10)),
    }
}

impl Harness {
    pub fn new(pool_size: usize) -> Self {
        Self {
            db: Arc::new(InMemoryDb::default()),
            blobs: Arc::new(MemBlobStore::default()),
            calendar: Arc::new(RecordingCalendar::default()),
            provider: Arc::new(ScriptedProvider::default()),
            pool_size,
            classroom_id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
        }
    }

    /// Registers a document in the classroom. `None` leaves its blob missing.
    pub fn add_document(&self, title: &str, contents: Option<&str>) -> Uuid {
        self.add_raw_document(title, contents.map(|text| text.as_bytes().to_vec()))
    }

    pub fn add_raw_document(&self, title: &str, contents: Option<Vec<u8>>) -> Uuid {
        let id = Uuid::new_v4();
        let file_id = format!("{}.bin", id);
        if let Some(bytes) = contents {
            self.blobs.put(&file_id, bytes);
        }
        self.db.documents.lock().unwrap().insert(
            id,
            SourceDocument {
                id,
                classroom_id: self.classroom_id,
                title: title.to_string(),
                file_id,
            },
        );
        id
    }

    pub fn pipeline(&self) -> AssessmentPipeline {
        let credentials = (1..=self.pool_size)
            .map(|i| Credential::new(format!("key-{}", i), format!("sk-test-{}", i)))
            .collect();
        let pool = Arc::new(CredentialPool::new(credentials).unwrap());
        let generator = GenerationClient::new(
            self.provider.clone(),
            pool,
            Duration::from_secs(5),
            chrono::Duration::seconds(60),
        );
        let extractor = DocumentExtractor::new(self.blobs.clone(), Duration::from_secs(5));
        AssessmentPipeline::new(self.db.clone(), extractor, generator, test_settings())
    }

    pub fn app(&self) -> Router {
        let state = Arc::new(AppState {
            db: self.db.clone(),
            pipeline: Arc::new(self.pipeline()),
            gate: Arc::new(PublicationGate::new(self.db.clone(), self.calendar.clone())),
        });
        router(state)
    }

    /// Stores a two-question draft quiz owned by `owner`.
    pub fn seed_draft(&self, owner: Uuid, created_at: DateTime<Utc>) -> Artifact {
        let artifact = Artifact {
            id: Uuid::new_v4(),
            kind: ArtifactKind::Quiz,
            classroom_id: self.classroom_id,
            owner_id: owner,
            title: "Quiz: Thermodynamics".to_string(),
            source_document_ids: vec![Uuid::new_v4()],
            items: vec![mcq_item("First law?", 1), mcq_item("Second law?", 1)],
            total_weight: 2,
            state: ArtifactState::Draft,
            start_time: None,
            end_time: None,
            created_at,
            updated_at: created_at,
            published_at: None,
        };
        self.db
            .artifacts
            .lock()
            .unwrap()
            .insert(artifact.id, artifact.clone());
        artifact
    }
}

//=========================================================================================
// Content Builders
//=========================================================================================

/// Roughly 600 characters of lecture prose.
pub fn lecture_text(topic: &str) -> String {
    let paragraph = format!(
        "In this lecture on {topic} we examine how energy moves between systems and why \
         the total amount stays constant while its quality degrades over time. "
    );
    paragraph.repeat(4)
}

pub fn mcq_item(prompt: &str, weight: u32) -> GeneratedItem {
    GeneratedItem {
        prompt: prompt.to_string(),
        weight,
        body: ItemBody::MultipleChoice {
            options: [
                "Energy is conserved".to_string(),
                "Entropy decreases".to_string(),
                "Heat flows from cold to hot".to_string(),
                "Work is always zero".to_string(),
            ],
            correct_answer: "Energy is conserved".to_string(),
        },
    }
}

pub fn mcq_candidate(n: usize) -> Value {
    json!({
        "question": format!("Question {} about energy?", n),
        "options": [
            format!("Option A{}", n),
            format!("Option B{}", n),
            format!("Option C{}", n),
            format!("Option D{}", n)
        ],
        "correctAnswer": format!("Option A{}", n)
    })
}

pub fn mcq_reply(count: usize) -> Value {
    json!({ "questions": (1..=count).map(mcq_candidate).collect::<Vec<_>>() })
}

pub fn free_response_reply(count: usize) -> Value {
    let items: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "question": format!("Explain concept {} in your own words.", n),
                "modelAnswer": format!("Concept {} means energy is conserved.", n),
                "gradingGuidelines": "Mentions conservation."
            })
        })
        .collect();
    json!({ "questions": items })
}

//=========================================================================================
// HTTP Helpers
//=========================================================================================

pub fn request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
