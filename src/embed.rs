//! Blocking embedding client with bounded retry and linear backoff.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::error::{Result, RowvecError};

/// Request body sent to the embedding service.
#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub input: &'a [String],
    pub model: &'a str,
}

/// Success body: one embedding per input text, in input order.
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// One failed request attempt: timeout or any transport/protocol error.
/// Always retryable; the client decides when to give up.
#[derive(Debug)]
pub struct AttemptError {
    pub reason: String,
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Seam between the retry loop and the wire. The production impl is
/// [`HttpTransport`]; tests script response sequences.
pub trait EmbeddingTransport {
    fn send(
        &self,
        request: &EmbeddingRequest<'_>,
    ) -> std::result::Result<EmbeddingResponse, AttemptError>;
}

/// Injectable time source so tests can observe backoff without sleeping.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real blocking sleep on the pipeline thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Bounded retry with linearly increasing waits: attempt `n` (1-indexed)
/// waits `backoff_base * n` before the next attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Blocking client that embeds one batch of texts per call.
///
/// Transient failures are retried per the policy; a response carrying the
/// wrong number of embeddings is a contract violation and fails immediately.
pub struct EmbeddingClient<T, S = RealSleeper> {
    transport: T,
    model: String,
    policy: RetryPolicy,
    sleeper: S,
}

impl EmbeddingClient<HttpTransport, RealSleeper> {
    /// Production client over HTTPS, configured from the run config.
    pub fn over_http(config: &IngestConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            transport,
            config.model.clone(),
            RetryPolicy {
                max_retries: config.max_retries,
                backoff_base: config.backoff_base,
            },
            RealSleeper,
        ))
    }
}

impl<T, S> EmbeddingClient<T, S>
where
    T: EmbeddingTransport,
    S: Sleeper,
{
    pub fn new(transport: T, model: impl Into<String>, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            transport,
            model: model.into(),
            policy,
            sleeper,
        }
    }

    /// Embed `texts`, returning vectors order-aligned with the input.
    ///
    /// Never returns a partial result: either every text is embedded or the
    /// call fails with [`RowvecError::RetriesExhausted`] or
    /// [`RowvecError::EmbeddingShape`].
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.policy.max_retries {
            match self.transport.send(&request) {
                Ok(response) => {
                    if response.data.len() != texts.len() {
                        return Err(RowvecError::EmbeddingShape {
                            expected: texts.len(),
                            actual: response.data.len(),
                        });
                    }
                    return Ok(response
                        .data
                        .into_iter()
                        .map(|entry| entry.embedding)
                        .collect());
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %err,
                        "embedding request failed"
                    );
                    last_error = err.reason;
                    if attempt < self.policy.max_retries {
                        self.sleeper.sleep(self.policy.backoff(attempt));
                    }
                }
            }
        }

        Err(RowvecError::RetriesExhausted {
            attempts: self.policy.max_retries,
            last_error,
        })
    }
}

/// reqwest-blocking transport with bearer auth and JSON content type baked
/// into the client's default headers.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        let mut auth_value = HeaderValue::from_str(&auth).map_err(|_| RowvecError::Transport {
            reason: "api key is not a valid header value".into(),
        })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RowvecError::Transport {
                reason: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl EmbeddingTransport for HttpTransport {
    fn send(
        &self,
        request: &EmbeddingRequest<'_>,
    ) -> std::result::Result<EmbeddingResponse, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|err| AttemptError {
                reason: if err.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {err}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AttemptError {
                reason: format!("service returned {status}: {body}"),
            });
        }

        response.json().map_err(|err| AttemptError {
            reason: format!("failed to parse embedding response: {err}"),
        })
    }
}
