//! Client-side enhancement controller.
//!
//! Owns the request lifecycle the way the front end sees it: a status
//! machine (idle/editing/enhancing/complete/error), the accumulated output,
//! and the failure classification. State lives behind a `RwLock` so the
//! streaming task can append fragments while a UI polls snapshots.

use crate::clipboard::{copy_payload, Clipboard};
use crate::error::EnhanceFailure;
use crate::keystore::CredentialStore;
use crate::options::EnhanceOptions;
use crate::text::StreamDecoder;
use anyhow::{Context, Result};
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Soft ceiling on draft length surfaced alongside the character count.
pub const PROMPT_CHAR_LIMIT: usize = 8000;

/// How long the controller waits for the relay to start responding before
/// dropping the request and reporting a network failure. Intentionally
/// shorter than the relay's own 30 s provider budget; a slow but eventually
/// successful provider call can therefore surface here as a network error.
/// Preserved as-is rather than reconciled (see DESIGN.md).
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the transient copied indicator stays up.
const COPIED_RESET_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Editing,
    Enhancing,
    Complete,
    Error,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    prompt: &'a str,
    options: &'a EnhanceOptions,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

struct Inner {
    prompt: String,
    api_key: String,
    api_key_saved: bool,
    options: EnhanceOptions,
    status: Status,
    enhanced: String,
    failure: Option<EnhanceFailure>,
    copied: bool,
}

#[derive(Clone)]
pub struct EnhanceController {
    inner: Arc<RwLock<Inner>>,
    http: reqwest::Client,
    keystore: CredentialStore,
    clipboard: Arc<dyn Clipboard>,
    endpoint: String,
    network_timeout: Duration,
}

impl EnhanceController {
    pub fn new(
        endpoint: impl Into<String>,
        keystore: CredentialStore,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        let saved_key = keystore.load();
        let inner = Inner {
            prompt: String::new(),
            api_key: saved_key.clone().unwrap_or_default(),
            api_key_saved: saved_key.is_some(),
            options: EnhanceOptions::for_new_session(),
            status: Status::Idle,
            enhanced: String::new(),
            failure: None,
            copied: false,
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
            http: reqwest::Client::new(),
            keystore,
            clipboard,
            endpoint: endpoint.into(),
            network_timeout: NETWORK_TIMEOUT,
        }
    }

    /// Override the connect timeout, for tests.
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    // -- editing -----------------------------------------------------------

    pub fn set_prompt(&self, text: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.prompt = text.into();
        if inner.prompt.trim().is_empty() {
            inner.status = Status::Idle;
        } else if inner.status == Status::Idle {
            inner.status = Status::Editing;
        }
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.inner.write().api_key = key.into();
    }

    pub fn set_options(&self, options: EnhanceOptions) {
        self.inner.write().options = options;
    }

    /// Persist the current credential under the fixed storage key.
    pub fn save_api_key(&self) -> Result<()> {
        let key = self.inner.read().api_key.trim().to_string();
        if key.is_empty() {
            return Ok(());
        }
        self.keystore.save(&key).context("failed to save API key")?;
        let mut inner = self.inner.write();
        inner.api_key_saved = true;
        if !inner.prompt.trim().is_empty() {
            inner.status = Status::Editing;
        }
        Ok(())
    }

    // -- snapshots ---------------------------------------------------------

    pub fn status(&self) -> Status {
        self.inner.read().status
    }

    pub fn prompt(&self) -> String {
        self.inner.read().prompt.clone()
    }

    pub fn enhanced(&self) -> String {
        self.inner.read().enhanced.clone()
    }

    pub fn failure(&self) -> Option<EnhanceFailure> {
        self.inner.read().failure.clone()
    }

    pub fn copied(&self) -> bool {
        self.inner.read().copied
    }

    pub fn api_key_saved(&self) -> bool {
        self.inner.read().api_key_saved
    }

    pub fn char_count(&self) -> usize {
        self.inner.read().prompt.chars().count()
    }

    pub fn char_limit(&self) -> usize {
        PROMPT_CHAR_LIMIT
    }

    pub fn can_enhance(&self) -> bool {
        let inner = self.inner.read();
        !inner.prompt.trim().is_empty()
            && !inner.api_key.trim().is_empty()
            && inner.status != Status::Enhancing
    }

    // -- lifecycle actions -------------------------------------------------

    /// Run one enhancement request to a terminal state.
    ///
    /// At most one submission is in flight at a time; a submission while
    /// `Enhancing` is a no-op. The request is dropped (aborted) when the
    /// relay does not start responding within the network timeout, and the
    /// terminal state set by that timeout is never overwritten.
    pub async fn submit(&self) {
        let (prompt, api_key, options) = {
            let mut inner = self.inner.write();
            if inner.prompt.trim().is_empty()
                || inner.api_key.trim().is_empty()
                || inner.status == Status::Enhancing
            {
                return;
            }
            inner.status = Status::Enhancing;
            inner.enhanced.clear();
            inner.failure = None;
            inner.copied = false;
            (
                inner.prompt.clone(),
                inner.api_key.clone(),
                inner.options.clone(),
            )
        };

        let body = SubmitBody {
            prompt: &prompt,
            options: &options,
            api_key: &api_key,
        };
        let request = self
            .http
            .post(self.cache_busted_endpoint())
            .header("Accept", "application/json, text/event-stream")
            .header("Cache-Control", "no-cache")
            .json(&body)
            .send();

        let response = match timeout(self.network_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let failure = if err.is_connect() || err.is_timeout() || err.is_request() {
                    EnhanceFailure::network("Unable to connect to the enhancement service.")
                } else {
                    EnhanceFailure::unknown(err.to_string())
                };
                warn!(error = %err, "enhancement request failed to send");
                self.fail(failure);
                return;
            }
            Err(_) => {
                debug!("network timeout elapsed before the relay responded");
                self.fail(EnhanceFailure::network_timeout());
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let failure = match response.text().await {
                Ok(text) => EnhanceFailure::classify_response(status.as_u16(), &text),
                Err(err) => EnhanceFailure::unknown(format!(
                    "Error {}: {err}",
                    status.as_u16()
                )),
            };
            self.fail(failure);
            return;
        }

        let mut stream = response.bytes_stream();
        // Reads can split a multibyte character, so decoding is stateful.
        let mut decoder = StreamDecoder::new();
        while let Some(piece) = stream.next().await {
            match piece {
                Ok(bytes) => {
                    let fragment = decoder.push(&bytes);
                    if fragment.is_empty() {
                        continue;
                    }
                    // Progressive rendering: each fragment lands in shared
                    // state as it arrives.
                    self.inner.write().enhanced.push_str(&fragment);
                }
                Err(err) => {
                    warn!(error = %err, "response stream broke mid-read");
                    self.fail(EnhanceFailure::unknown(err.to_string()));
                    return;
                }
            }
        }

        let mut inner = self.inner.write();
        inner.enhanced.push_str(&decoder.finish());
        if inner.enhanced.trim().is_empty() {
            inner.failure = Some(EnhanceFailure::empty_result());
            inner.status = Status::Error;
        } else {
            inner.status = Status::Complete;
        }
    }

    /// Discard the finished output and return to editing (or idle when the
    /// draft was cleared in the meantime). Safe to invoke repeatedly.
    pub fn start_over(&self) {
        let mut inner = self.inner.write();
        inner.enhanced.clear();
        inner.failure = None;
        inner.copied = false;
        inner.status = if inner.prompt.trim().is_empty() {
            Status::Idle
        } else {
            Status::Editing
        };
    }

    /// Leave the error state without touching the accumulated output.
    pub fn back_to_editing(&self) {
        let mut inner = self.inner.write();
        inner.status = if inner.prompt.trim().is_empty() {
            Status::Idle
        } else {
            Status::Editing
        };
    }

    /// Copy the enhanced result: the fenced markdown block's inner content
    /// when present, the full text otherwise. Sets a transient copied flag
    /// that reverts on its own.
    pub fn copy_markdown(&self) -> Result<()> {
        let payload = copy_payload(&self.inner.read().enhanced);
        self.clipboard
            .write(&payload)
            .context("failed to copy to clipboard")?;
        self.inner.write().copied = true;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            sleep(COPIED_RESET_DELAY).await;
            inner.write().copied = false;
        });
        Ok(())
    }

    fn fail(&self, failure: EnhanceFailure) {
        let mut inner = self.inner.write();
        inner.failure = Some(failure);
        inner.status = Status::Error;
    }

    fn cache_busted_endpoint(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        format!("{}?t={millis}", self.endpoint)
    }
}
