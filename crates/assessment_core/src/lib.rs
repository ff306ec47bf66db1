pub mod assembly;
pub mod corpus;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod pipeline;
pub mod ports;
pub mod prompts;
pub mod publication;
pub mod validation;

pub use credentials::{Credential, CredentialPool};
pub use domain::{
    Artifact, ArtifactKind, ArtifactState, CalendarEvent, ExtractedCorpus, GeneratedItem,
    GenerationSpec, ItemBody, ItemKind, SectionSpec, SourceDocument,
};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{AssessmentPipeline, GenerateRequest, GenerationStats, PipelineSettings};
pub use ports::{
    BlobStore, ByteStream, CalendarService, DatabaseService, PortError, PortResult,
    ProviderError, TextGenerationService,
};
pub use publication::PublicationGate;
