//! Relay request handling, independent of the HTTP transport.
//!
//! [`RelayHandler`] validates an incoming enhancement request, builds the
//! instruction pair, and initiates exactly one streaming provider call. The
//! hosting server maps the resulting [`RelayOutcome`] onto the wire. Nothing
//! here retries, and the caller's credential is held only for the duration of
//! the outbound call.

use crate::error::RelayError;
use crate::options::EnhanceOptions;
use crate::prompt;
use crate::provider::{CompletionProvider, CompletionRequest, FragmentStream};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Fixed knobs for the outbound provider call.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub model: String,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Upper bound on stream initiation. Expiry maps to 504 TIMEOUT_ERROR.
    pub call_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: "moonshotai/kimi-k2-instruct".to_string(),
            top_p: 1.0,
            max_tokens: 4096,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// A validated enhancement request.
#[derive(Debug, Clone)]
pub struct EnhanceRequest {
    pub prompt: String,
    pub options: EnhanceOptions,
    pub api_key: String,
}

impl EnhanceRequest {
    /// Parse and validate a raw request body.
    ///
    /// Malformed JSON maps to a generic format error; missing or empty
    /// `prompt`/`apiKey` map to field-specific messages. A malformed
    /// `options` value degrades to defaults rather than failing.
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| RelayError::InvalidFormat)?;

        let prompt = value
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(RelayError::missing_prompt)?
            .to_string();

        let api_key = value
            .get("apiKey")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(RelayError::missing_api_key)?
            .to_string();

        let options = value
            .get("options")
            .cloned()
            .map(|raw| serde_json::from_value(raw).unwrap_or_default())
            .unwrap_or_default();

        Ok(Self {
            prompt,
            options,
            api_key,
        })
    }
}

/// What the transport should send back: either a fragment stream to forward
/// verbatim, or a structured error.
pub enum RelayOutcome {
    Stream(FragmentStream),
    Failure(RelayError),
}

#[derive(Clone)]
pub struct RelayHandler {
    provider: Arc<dyn CompletionProvider>,
    config: RelayConfig,
}

impl RelayHandler {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: RelayConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle one raw request body end to end.
    pub async fn handle(&self, body: &[u8]) -> RelayOutcome {
        let request = match EnhanceRequest::parse(body) {
            Ok(request) => request,
            Err(err) => return RelayOutcome::Failure(err),
        };
        self.enhance(request).await
    }

    async fn enhance(&self, request: EnhanceRequest) -> RelayOutcome {
        let completion = CompletionRequest {
            model: self.config.model.clone(),
            system: prompt::system_instruction(),
            user: prompt::user_instruction(&request.prompt, &request.options),
            temperature: request.options.temperature(),
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        };

        let call = self
            .provider
            .stream_completion(&request.api_key, completion);

        match timeout(self.config.call_timeout, call).await {
            Ok(Ok(stream)) => RelayOutcome::Stream(stream),
            Ok(Err(err)) if err.is_auth() => {
                warn!(detail = %err.detail(), "provider rejected credential");
                RelayOutcome::Failure(RelayError::Auth {
                    detail: err.detail(),
                })
            }
            Ok(Err(err)) if err.is_rate_limit() => {
                RelayOutcome::Failure(RelayError::RateLimit)
            }
            Ok(Err(err)) => {
                warn!(detail = %err.detail(), "provider call failed");
                RelayOutcome::Failure(RelayError::Api {
                    detail: err.detail(),
                })
            }
            Err(_) => {
                warn!(budget_secs = self.config.call_timeout.as_secs(), "provider call timed out");
                RelayOutcome::Failure(RelayError::Timeout)
            }
        }
    }
}
