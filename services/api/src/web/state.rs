//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use assessment_core::ports::DatabaseService;
use assessment_core::{AssessmentPipeline, PublicationGate};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub pipeline: Arc<AssessmentPipeline>,
    pub gate: Arc<PublicationGate>,
}
