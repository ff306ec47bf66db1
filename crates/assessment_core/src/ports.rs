//! crates/assessment_core/src/ports.rs
//!
//! Defines the service contracts (traits) the pipeline depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the database, the blob store, the calendar and the
//! generative-text provider.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::credentials::Credential;
use crate::domain::{Artifact, ArtifactKind, ArtifactState, CalendarEvent, SourceDocument};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all storage-style port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The stored row no longer matches the state the write was conditioned on.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A stream of raw bytes read from the blob store.
pub type ByteStream = Pin<Box<dyn Stream<Item = PortResult<Bytes>> + Send>>;

//=========================================================================================
// Provider Error
//=========================================================================================

/// Failure modes of a single generative-text call, classified at the adapter
/// boundary so the retry loop never inspects provider-specific shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("credential quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider call timed out")]
    Timeout,
    #[error("provider returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Only quota/rate-limit failures are worth retrying on another credential.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Source Documents ---
    /// Resolves the given ids to documents owned by `classroom_id`. Unknown ids
    /// and documents of other classrooms are silently absent from the result.
    async fn find_documents(
        &self,
        classroom_id: Uuid,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<SourceDocument>>;

    // --- Artifacts ---
    async fn insert_artifact(&self, artifact: &Artifact) -> PortResult<()>;

    async fn get_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<Artifact>;

    /// Lists the artifacts of a classroom, newest first.
    async fn list_artifacts(
        &self,
        kind: ArtifactKind,
        classroom_id: Uuid,
    ) -> PortResult<Vec<Artifact>>;

    /// Overwrites the stored artifact, but only while its stored state is still
    /// `expected`. A state mismatch is `Conflict`; a missing row is `NotFound`.
    async fn update_artifact(&self, artifact: &Artifact, expected: ArtifactState)
        -> PortResult<()>;

    async fn delete_artifact(&self, kind: ArtifactKind, artifact_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Opens the stored bytes behind an opaque file handle.
    async fn open_read_stream(&self, file_id: &str) -> PortResult<ByteStream>;
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, event: CalendarEvent) -> PortResult<()>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends one prompt to the provider using the given credential.
    async fn generate_text(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}
