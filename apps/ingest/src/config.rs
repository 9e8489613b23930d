use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ingest::pipeline::PipelineSettings;
use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Service configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_timeout_secs: u64,
    /// Unset means the in-memory record store is used.
    pub database_url: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub retrieval_attempts: u32,
    pub retrieval_backoff_ms: u64,
    pub pipeline_timeout_secs: u64,
    pub max_input_chars: usize,
    pub request_suggestions: bool,
    pub webhook_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            openai_model: optional_env("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 60)?,
            database_url: optional_env("DATABASE_URL"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_region: optional_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            retrieval_attempts: parse_env("RETRIEVAL_ATTEMPTS", 3)?,
            retrieval_backoff_ms: parse_env("RETRIEVAL_BACKOFF_MS", 500)?,
            pipeline_timeout_secs: parse_env("PIPELINE_TIMEOUT_SECS", 120)?,
            max_input_chars: parse_env("MAX_INPUT_CHARS", 48_000)?,
            request_suggestions: match optional_env("REQUEST_SUGGESTIONS") {
                Some(raw) => parse_flag(&raw).with_context(|| {
                    format!("REQUEST_SUGGESTIONS must be a boolean, got '{raw}'")
                })?,
                None => true,
            },
            webhook_token: optional_env("WEBHOOK_TOKEN"),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            retrieval_attempts: self.retrieval_attempts.max(1),
            retrieval_backoff: Duration::from_millis(self.retrieval_backoff_ms),
            timeout: Duration::from_secs(self.pipeline_timeout_secs),
            max_input_chars: self.max_input_chars,
            request_suggestions: self.request_suggestions,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats blank values the same as unset ones.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_accepts_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u32 = parse_env("INGEST_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
