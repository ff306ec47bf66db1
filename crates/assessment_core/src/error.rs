//! crates/assessment_core/src/error.rs
//!
//! The error taxonomy of the generation pipeline and the draft lifecycle.

use crate::ports::{PortError, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // --- Input errors ---
    #[error("No documents were selected")]
    NoDocumentsSelected,
    #[error("A classroom must be specified")]
    MissingClassroom,
    #[error("None of the selected documents could be found")]
    DocumentsNotFound,

    // --- Content errors ---
    #[error("No text could be extracted from any of the {failed} selected documents")]
    NoExtractableContent { failed: usize },
    #[error("Extracted content is too short ({actual} characters, at least {minimum} required)")]
    ContentTooShort { actual: usize, minimum: usize },
    #[error("Extracted content does not look like readable prose")]
    ContentNotProse,

    // --- Provider errors ---
    #[error("All {attempts} generation credentials are exhausted; try again later")]
    AllCredentialsExhausted { attempts: usize },
    #[error("Generation provider failed: {0}")]
    Provider(ProviderError),
    #[error("Generation provider returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("The provider did not return any valid items")]
    NoValidItemsGenerated,

    // --- Lifecycle errors ---
    #[error("Only the owner may modify this artifact")]
    NotOwner,
    #[error("Artifact is already published and can no longer be changed")]
    AlreadyPublished,
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Port(#[from] PortError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
