//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the assessment-generating LLM.
//! It implements the `TextGenerationService` port from the `core` crate against
//! any OpenAI-compatible chat completion endpoint, one client per credential.

use assessment_core::credentials::Credential;
use assessment_core::ports::{ProviderError, TextGenerationService};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::collections::HashMap;
use std::time::Duration;

const SYSTEM_INSTRUCTIONS: &str = "You are an assessment author for university courses. \
You only ever reply with a single valid JSON document and never wrap it in markdown.";

/// Error types and codes providers use to signal an exhausted quota or rate limit.
const QUOTA_MARKERS: [&str; 4] = [
    "insufficient_quota",
    "rate_limit_exceeded",
    "resource_exhausted",
    "429",
];

/// Message fragments that signal an exhausted quota when no code is given.
const QUOTA_PHRASES: [&str; 4] = [
    "quota",
    "rate limit",
    "too many requests",
    "resource has been exhausted",
];

/// Maps the fields of a provider API error onto the port's error taxonomy.
pub fn classify_api_failure(kind: Option<&str>, code: Option<&str>, message: &str) -> ProviderError {
    let marked = [kind, code]
        .into_iter()
        .flatten()
        .map(|s| s.trim_matches('"').to_ascii_lowercase())
        .any(|s| QUOTA_MARKERS.contains(&s.as_str()));
    let lowered = message.to_ascii_lowercase();

    if marked || QUOTA_PHRASES.iter().any(|p| lowered.contains(p)) {
        ProviderError::QuotaExhausted(message.to_string())
    } else {
        ProviderError::Rejected(message.to_string())
    }
}

fn classify(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_ref().map(|c| c.to_string());
            classify_api_failure(api.r#type.as_deref(), code.as_deref(), &api.message)
        }
        OpenAIError::Reqwest(e) => {
            if e.is_timeout() {
                ProviderError::Timeout
            } else if e.status().map(|s| s.as_u16()) == Some(429) {
                ProviderError::QuotaExhausted(e.to_string())
            } else {
                ProviderError::Transport(e.to_string())
            }
        }
        other => ProviderError::Transport(other.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    clients: HashMap<String, Client<OpenAIConfig>>,
    api_base: Option<String>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new adapter with one client per configured credential.
    pub fn new(credentials: &[Credential], api_base: Option<String>, model: String) -> Self {
        let clients = credentials
            .iter()
            .map(|cred| (cred.id.clone(), Self::build_client(cred, api_base.as_deref())))
            .collect();
        Self {
            clients,
            api_base,
            model,
        }
    }

    fn build_client(credential: &Credential, api_base: Option<&str>) -> Client<OpenAIConfig> {
        let mut config = OpenAIConfig::new().with_api_key(credential.api_key.clone());
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        // Rotation across credentials is the retry policy; the client must fail fast.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Client::with_config(config).with_backoff(no_retry)
    }

    fn client_for(&self, credential: &Credential) -> Client<OpenAIConfig> {
        self.clients
            .get(&credential.id)
            .cloned()
            .unwrap_or_else(|| Self::build_client(credential, self.api_base.as_deref()))
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiGenerationAdapter {
    async fn generate_text(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTIONS)
                    .build()
                    .map_err(|e| ProviderError::Rejected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| ProviderError::Rejected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .temperature(0.4)
            .build()
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;

        let response = self
            .client_for(credential)
            .chat()
            .create(request)
            .await
            .map_err(classify)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}
