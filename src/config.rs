//! Process configuration.
//!
//! Loaded once at startup (after `.env` has been applied) and passed by value
//! to the provider and the HTTP layer. Nothing else reads the environment.

use anyhow::{Context, Result};
use std::fmt;

const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";
const DEFAULT_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7860;
const DEFAULT_MAX_FILE_SIZE_MB: usize = 50;
const MEGABYTE: usize = 1024 * 1024;

/// Multipart framing allowance on top of the file size limit.
pub const MULTIPART_OVERHEAD: usize = MEGABYTE;

/// Everything the server needs to start.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub host: String,
    pub port: u16,
    pub max_file_size_mb: usize,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("MISTRAL_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("MISTRAL_API_KEY environment variable is not set")?;

        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid APP_PORT: {:?}", raw))?,
            None => DEFAULT_PORT,
        };

        let max_file_size_mb = match lookup("MAX_FILE_SIZE_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid MAX_FILE_SIZE_MB: {:?}", raw))?,
            None => DEFAULT_MAX_FILE_SIZE_MB,
        };
        max_file_size_mb
            .checked_mul(MEGABYTE)
            .and_then(|bytes| bytes.checked_add(MULTIPART_OVERHEAD))
            .with_context(|| format!("MAX_FILE_SIZE_MB too large: {}", max_file_size_mb))?;

        Ok(Self {
            api_key,
            api_base: lookup("MISTRAL_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: lookup("MISTRAL_OCR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            host: lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            max_file_size_mb,
        })
    }

    /// Upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(MEGABYTE)
    }

    /// Request body limit: the file limit plus multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_file_size_bytes().saturating_add(MULTIPART_OVERHEAD)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keeps the credential out of `{:?}` output in logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .finish()
    }
}
