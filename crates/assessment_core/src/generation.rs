//! crates/assessment_core/src/generation.rs
//!
//! Issues generation calls through the credential pool. Retries happen only
//! for quota exhaustion, at most once per credential.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::credentials::CredentialPool;
use crate::domain::{ExtractedCorpus, SectionSpec};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::{ProviderError, TextGenerationService};
use crate::prompts::build_prompt;

#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn TextGenerationService>,
    pool: Arc<CredentialPool>,
    call_timeout: Duration,
    cooldown: chrono::Duration,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn TextGenerationService>,
        pool: Arc<CredentialPool>,
        call_timeout: Duration,
        cooldown: chrono::Duration,
    ) -> Self {
        Self {
            provider,
            pool,
            call_timeout,
            cooldown,
        }
    }

    /// Generates raw text for one section of an artifact. No validation happens here.
    pub async fn generate(
        &self,
        section: &SectionSpec,
        corpus: &ExtractedCorpus,
    ) -> PipelineResult<String> {
        let prompt = build_prompt(section, corpus);
        self.complete(&prompt).await
    }

    /// Sends a prompt, rotating credentials on quota exhaustion.
    pub async fn complete(&self, prompt: &str) -> PipelineResult<String> {
        let attempts = self.pool.len();

        for attempt in 1..=attempts {
            let lease = self.pool.current();
            let result = tokio::time::timeout(
                self.call_timeout,
                self.provider.generate_text(&lease.credential, prompt),
            )
            .await
            .unwrap_or(Err(ProviderError::Timeout));

            match result {
                Ok(text) => {
                    info!(credential = %lease.credential.id, attempt, "Generation call succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_quota_exhausted() => {
                    warn!(
                        credential = %lease.credential.id,
                        attempt,
                        attempts,
                        error = %e,
                        "Generation credential exhausted"
                    );
                    self.pool.rotate(lease.slot, self.cooldown);
                }
                Err(e) => {
                    error!(credential = %lease.credential.id, error = %e, "Generation call failed");
                    return Err(PipelineError::Provider(e));
                }
            }
        }

        error!(
            attempts,
            last_used = ?self.pool.last_used(),
            "Every generation credential reported quota exhaustion"
        );
        Err(PipelineError::AllCredentialsExhausted { attempts })
    }
}
