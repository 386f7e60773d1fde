//! Run configuration, built once at startup and passed by reference into
//! each pipeline component.

use std::env;
use std::time::Duration;

use crate::error::{Result, RowvecError};

/// Environment variable the API key is read from by [`IngestConfig::api_key_from_env`].
pub const API_KEY_ENV: &str = "ROWVEC_API_KEY";

/// Records per batch window.
pub const DEFAULT_BATCH_SIZE: usize = 16;
/// Embedding attempts per batch before the run fails.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Per-request timeout for the embedding service.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Linear backoff base: attempt `n` waits `n * DEFAULT_BACKOFF_BASE`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);
/// Default embedding service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.jina.ai/v1/embeddings";
/// Default embedding model identifier.
pub const DEFAULT_MODEL: &str = "jina-embeddings-v2-base-en";

/// Everything a run needs, validated up front.
///
/// The secret never appears in source text: supply it through
/// [`IngestConfigBuilder::api_key`] from an external secret store, or let
/// [`IngestConfig::api_key_from_env`] read [`API_KEY_ENV`].
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub collection: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub resume_offset: u64,
}

impl IngestConfig {
    /// Start a fluent builder for `IngestConfig`.
    #[must_use]
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Read the API key from [`API_KEY_ENV`].
    pub fn api_key_from_env() -> Result<String> {
        env::var(API_KEY_ENV).map_err(|_| RowvecError::Config {
            reason: format!("missing API key: set {API_KEY_ENV}"),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RowvecError::Config {
                reason: "api_key must not be empty".into(),
            });
        }
        if self.batch_size < 1 {
            return Err(RowvecError::Config {
                reason: "batch_size must be at least 1".into(),
            });
        }
        if self.max_retries < 1 {
            return Err(RowvecError::Config {
                reason: "max_retries must be at least 1".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(RowvecError::Config {
                reason: "model must not be empty".into(),
            });
        }
        if self.collection.trim().is_empty() {
            return Err(RowvecError::Config {
                reason: "collection must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfigBuilder {
    inner: IngestConfig,
}

impl Default for IngestConfigBuilder {
    fn default() -> Self {
        Self {
            inner: IngestConfig {
                api_key: String::new(),
                endpoint: DEFAULT_ENDPOINT.to_string(),
                model: DEFAULT_MODEL.to_string(),
                collection: String::new(),
                batch_size: DEFAULT_BATCH_SIZE,
                max_retries: DEFAULT_MAX_RETRIES,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                backoff_base: DEFAULT_BACKOFF_BASE,
                resume_offset: 0,
            },
        }
    }
}

impl IngestConfigBuilder {
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.inner.api_key = key.into();
        self
    }

    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.inner.endpoint = endpoint.into();
        self
    }

    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.inner.model = model.into();
        self
    }

    pub fn collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.inner.collection = collection.into();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.inner.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.inner.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.inner.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.inner.backoff_base = base;
        self
    }

    #[must_use]
    pub fn resume_offset(mut self, offset: u64) -> Self {
        self.inner.resume_offset = offset;
        self
    }

    /// Validate and return the finished configuration.
    pub fn build(self) -> Result<IngestConfig> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
