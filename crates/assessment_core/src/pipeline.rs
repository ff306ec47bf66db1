//! crates/assessment_core/src/pipeline.rs
//!
//! The generation pipeline shared by every artifact kind:
//! resolve documents -> extract -> normalize -> generate per section ->
//! validate -> assemble and persist a draft.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembly::assemble;
use crate::corpus::{normalize, CorpusLimits};
use crate::domain::{Artifact, ArtifactKind, GenerationSpec, SourceDocument};
use crate::error::{PipelineError, PipelineResult};
use crate::extraction::DocumentExtractor;
use crate::generation::GenerationClient;
use crate::ports::DatabaseService;
use crate::validation::screen;

/// Tunables of the pipeline, one generation spec per artifact kind.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub limits: CorpusLimits,
    pub quiz: GenerationSpec,
    pub assignment: GenerationSpec,
    pub test_paper: GenerationSpec,
}

impl PipelineSettings {
    pub fn spec_for(&self, kind: ArtifactKind) -> &GenerationSpec {
        match kind {
            ArtifactKind::Quiz => &self.quiz,
            ArtifactKind::Assignment => &self.assignment,
            ArtifactKind::TestPaper => &self.test_paper,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            limits: CorpusLimits::default(),
            quiz: GenerationSpec::mcq_quiz(10, 1),
            assignment: GenerationSpec::short_answer_assignment(5, 5),
            test_paper: GenerationSpec::mixed_test_paper((10, 1), (5, 3), (2, 10)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub kind: ArtifactKind,
    pub classroom_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub document_ids: Vec<Uuid>,
}

/// Counters reported with every generation response, successful or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub items_requested: usize,
    pub items_generated: usize,
    pub items_dropped: usize,
}

#[derive(Debug)]
pub struct GenerationOutcome {
    pub artifact: Artifact,
    pub stats: GenerationStats,
}

/// A failed generation together with whatever progress was counted.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct GenerationFailure {
    pub error: PipelineError,
    pub stats: GenerationStats,
}

pub struct AssessmentPipeline {
    db: Arc<dyn DatabaseService>,
    extractor: DocumentExtractor,
    generator: GenerationClient,
    settings: PipelineSettings,
}

/// Runs `fut` unless the request is cancelled first.
async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = fut => result,
    }
}

fn dedup_preserving_order(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl AssessmentPipeline {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        extractor: DocumentExtractor,
        generator: GenerationClient,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            extractor,
            generator,
            settings,
        }
    }

    /// Generates and persists a new draft. Nothing is persisted unless every
    /// step succeeds and the request is still live.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerationFailure> {
        let mut stats = GenerationStats::default();
        match self.run(&request, cancel, &mut stats).await {
            Ok(artifact) => Ok(GenerationOutcome { artifact, stats }),
            Err(error) => {
                warn!(kind = %request.kind, error = %error, "Artifact generation failed");
                Err(GenerationFailure { error, stats })
            }
        }
    }

    async fn run(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
        stats: &mut GenerationStats,
    ) -> PipelineResult<Artifact> {
        let document_ids = dedup_preserving_order(&request.document_ids);
        if document_ids.is_empty() {
            return Err(PipelineError::NoDocumentsSelected);
        }
        let classroom_id = request.classroom_id.ok_or(PipelineError::MissingClassroom)?;
        stats.total_documents = document_ids.len();

        // --- 1. Resolve documents ---
        let mut documents: Vec<SourceDocument> = guarded(cancel, async {
            self.db
                .find_documents(classroom_id, &document_ids)
                .await
                .map_err(PipelineError::from)
        })
        .await?;
        if documents.is_empty() {
            return Err(PipelineError::DocumentsNotFound);
        }
        documents.sort_by_key(|doc| document_ids.iter().position(|id| *id == doc.id));

        // --- 2. Extract and normalize ---
        let batch = guarded(cancel, async {
            Ok::<_, PipelineError>(self.extractor.extract_all(&documents).await)
        })
        .await?;
        stats.processed_documents = batch.texts.len();
        stats.failed_documents = batch.failed + (document_ids.len() - documents.len());
        if batch.texts.is_empty() {
            return Err(PipelineError::NoExtractableContent {
                failed: batch.failed,
            });
        }
        let corpus = normalize(&batch.texts, &self.settings.limits)?;

        // --- 3. Generate and validate, one section at a time ---
        let spec = self.settings.spec_for(request.kind);
        stats.items_requested = spec.requested_items();
        let mut items = Vec::with_capacity(stats.items_requested);
        for section in &spec.sections {
            let raw = guarded(cancel, self.generator.generate(section, &corpus)).await?;
            let report = screen(&raw, section)?;
            stats.items_dropped += report.dropped;
            match report.ensure_items() {
                Ok(report) => items.extend(report.items),
                // A single empty section of a mixed paper only shortens it.
                Err(PipelineError::NoValidItemsGenerated) if spec.sections.len() > 1 => {
                    warn!(item_kind = ?section.item_kind, "Section produced no valid items");
                }
                Err(e) => return Err(e),
            }
        }
        if items.is_empty() {
            return Err(PipelineError::NoValidItemsGenerated);
        }
        stats.items_generated = items.len();

        // --- 4. Assemble and persist ---
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let provenance: Vec<SourceDocument> = documents
            .into_iter()
            .filter(|doc| batch.texts.iter().any(|t| t.document_id == doc.id))
            .collect();
        let artifact = assemble(
            request.kind,
            classroom_id,
            request.owner_id,
            items,
            &provenance,
            Utc::now(),
        );
        self.db.insert_artifact(&artifact).await?;

        info!(
            artifact_id = %artifact.id,
            kind = %request.kind,
            items = stats.items_generated,
            requested = stats.items_requested,
            documents = stats.processed_documents,
            "Draft artifact generated"
        );
        Ok(artifact)
    }
}
