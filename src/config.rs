//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::advisor::signals::SignalMatching;
use crate::error::ConfigError;

/// Default OpenAI-compatible endpoint (NVIDIA NIM).
pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// Default model served by the endpoint.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";

/// Conversation constants used by the phase controller.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// User turns after which the document is generated regardless of the model.
    pub max_questions: usize,
    /// Maximum characters of uploaded file text passed to the model.
    pub file_context_limit: usize,
    /// Sampling temperature for the conversation model.
    pub temperature: f32,
    /// Max tokens for one model reply.
    pub max_tokens: u32,
    /// Timeout for the single model call made per turn.
    pub llm_timeout: Duration,
    /// How done-signals are matched against the user's message.
    pub signal_matching: SignalMatching,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_questions: 7,
            file_context_limit: 6000,
            temperature: 0.3,
            max_tokens: 1500,
            llm_timeout: Duration::from_secs(30),
            signal_matching: SignalMatching::Token,
        }
    }
}

/// Process-level configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub port: u16,
    pub catalog_path: PathBuf,
    pub documents_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// libSQL file for the knowledge store. `None` runs without a store.
    pub db_path: Option<PathBuf>,
    pub advisor: AdvisorConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("NVIDIA_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("NVIDIA_API_KEY not set; model calls will fail and fall back");
        }

        let base_url =
            std::env::var("NVIDIA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("NVIDIA_MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let port: u16 = parse_env("CLARITY_PORT", 8000)?;
        let timeout_secs: u64 = parse_env("CLARITY_LLM_TIMEOUT_SECS", 30)?;

        let signal_matching = match std::env::var("CLARITY_SIGNAL_MATCHING") {
            Ok(raw) => raw
                .parse::<SignalMatching>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "CLARITY_SIGNAL_MATCHING".to_string(),
                    message,
                })?,
            Err(_) => SignalMatching::Token,
        };

        let db_path = match std::env::var("CLARITY_DB_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Some(PathBuf::from("./data/clarity.db")),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            port,
            catalog_path: env_path("CLARITY_CATALOG_PATH", "data/mentor_knowledge_base.json"),
            documents_dir: env_path("CLARITY_DOCUMENTS_DIR", "generated_documents"),
            uploads_dir: env_path("CLARITY_UPLOADS_DIR", "uploads"),
            db_path,
            advisor: AdvisorConfig {
                llm_timeout: Duration::from_secs(timeout_secs),
                signal_matching,
                ..AdvisorConfig::default()
            },
        })
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisor_defaults_match_conversation_rules() {
        let config = AdvisorConfig::default();
        assert_eq!(config.max_questions, 7);
        assert_eq!(config.file_context_limit, 6000);
        assert_eq!(config.max_tokens, 1500);
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.signal_matching, SignalMatching::Token);
    }

    #[test]
    fn parse_env_falls_back_to_default_when_unset() {
        let value: u16 = parse_env("CLARITY_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
