//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use assessment_core::corpus::CorpusLimits;
use assessment_core::{Credential, GenerationSpec, PipelineSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub blob_root: PathBuf,
    pub generation_credentials: Vec<Credential>,
    pub generation_api_base: Option<String>,
    pub generation_model: String,
    pub provider_timeout: Duration,
    pub extraction_timeout: Duration,
    pub credential_cooldown: Duration,
    pub pipeline: PipelineSettings,
}

/// Reads an optional variable, falling back to `default` when unset.
fn var_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Splits a comma-separated key list into labelled credentials.
pub fn parse_credentials(raw: &str) -> Vec<Credential> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .enumerate()
        .map(|(idx, key)| Credential::new(format!("key-{}", idx + 1), key))
        .collect()
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let blob_root = std::env::var("BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./blobs"));

        // --- Load Generation Provider Settings ---
        let keys = std::env::var("GENERATION_API_KEYS")
            .map_err(|_| ConfigError::MissingVar("GENERATION_API_KEYS".to_string()))?;
        let generation_credentials = parse_credentials(&keys);
        if generation_credentials.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GENERATION_API_KEYS".to_string(),
                "at least one API key is required".to_string(),
            ));
        }
        let generation_api_base = std::env::var("GENERATION_API_BASE").ok();
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let provider_timeout = Duration::from_secs(var_or("PROVIDER_TIMEOUT_SECS", 60u64)?);
        let extraction_timeout = Duration::from_secs(var_or("EXTRACTION_TIMEOUT_SECS", 30u64)?);
        let credential_cooldown = Duration::from_secs(var_or("CREDENTIAL_COOLDOWN_SECS", 60u64)?);

        // --- Load Pipeline Settings ---
        let limits = CorpusLimits {
            min_content_chars: var_or("MIN_CONTENT_CHARS", 500usize)?,
            max_prompt_chars: var_or("MAX_CORPUS_CHARS", 30_000usize)?,
            min_alpha_ratio: var_or("MIN_ALPHA_RATIO", 0.5f64)?,
        };
        if limits.max_prompt_chars < limits.min_content_chars {
            return Err(ConfigError::InvalidValue(
                "MAX_CORPUS_CHARS".to_string(),
                "must not be smaller than MIN_CONTENT_CHARS".to_string(),
            ));
        }

        let pipeline = PipelineSettings {
            limits,
            quiz: GenerationSpec::mcq_quiz(
                var_or("QUIZ_ITEM_COUNT", 10usize)?,
                var_or("QUIZ_ITEM_WEIGHT", 1u32)?,
            ),
            assignment: GenerationSpec::short_answer_assignment(
                var_or("ASSIGNMENT_ITEM_COUNT", 5usize)?,
                var_or("ASSIGNMENT_ITEM_WEIGHT", 5u32)?,
            ),
            test_paper: GenerationSpec::mixed_test_paper(
                (var_or("TEST_MCQ_COUNT", 10usize)?, var_or("TEST_MCQ_WEIGHT", 1u32)?),
                (var_or("TEST_SHORT_COUNT", 5usize)?, var_or("TEST_SHORT_WEIGHT", 3u32)?),
                (var_or("TEST_LONG_COUNT", 2usize)?, var_or("TEST_LONG_WEIGHT", 10u32)?),
            ),
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            blob_root,
            generation_credentials,
            generation_api_base,
            generation_model,
            provider_timeout,
            extraction_timeout,
            credential_cooldown,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_labelled_in_order() {
        let creds = parse_credentials(" sk-a , ,sk-b,");
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].id, "key-1");
        assert_eq!(creds[0].api_key, "sk-a");
        assert_eq!(creds[1].id, "key-2");
    }

    #[test]
    fn unset_variable_uses_default() {
        let value: usize = var_or("ASSESSMENT_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
