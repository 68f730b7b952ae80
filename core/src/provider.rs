//! Completion provider integration.
//!
//! [`CompletionProvider`] is the seam between the relay and the hosted model
//! API. [`GroqProvider`] speaks the OpenAI-compatible streaming chat
//! completion protocol; [`MockProvider`] replays scripted fragments for tests
//! and smoke runs. Fragments are handed off over an unbounded channel so the
//! relay can forward them as they arrive.

use crate::text::StreamDecoder;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, Duration};
use url::Url;

/// Default Groq API root.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/";

/// One incremental piece of generated text. `done` marks end-of-stream and
/// carries an empty delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            delta: String::new(),
            done: true,
        }
    }
}

/// Failure reported by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether this failure is a credential rejection. Besides the obvious
    /// 401/403, some providers report auth problems as generic errors whose
    /// message mentions authorization or access denial.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Status { status, message } => {
                matches!(status, 401 | 403)
                    || message.to_ascii_lowercase().contains("auth")
                    || message.contains("Access denied")
            }
            Self::Transport(_) => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }

    /// Human-readable detail suitable for embedding in a relay error body.
    pub fn detail(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Transport(err) => err.to_string(),
        }
    }
}

/// Fully resolved parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Receiver half of a fragment stream.
pub type FragmentStream = UnboundedReceiver<Result<StreamChunk, ProviderError>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start one streaming completion call authenticated with `api_key`.
    ///
    /// Returns once the stream is initiated; fragments then arrive on the
    /// receiver in generation order, terminated by a `done` chunk.
    async fn stream_completion(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<FragmentStream, ProviderError>;
}

/// Provider implementations selectable at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Groq,
    Mock,
}

impl ProviderKind {
    pub fn from_environment() -> Self {
        match std::env::var("BURNISH_PROVIDER") {
            Ok(value) if value.eq_ignore_ascii_case("mock") => Self::Mock,
            _ => Self::Groq,
        }
    }
}

// ---------------------------------------------------------------------------
// Groq (OpenAI-compatible) streaming client

pub struct GroqProvider {
    http: reqwest::Client,
    completions_url: Url,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Default)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl GroqProvider {
    pub fn new() -> Result<Self, url::ParseError> {
        Self::with_base_url(GROQ_BASE_URL)
    }

    /// Point the client at a different OpenAI-compatible API root.
    pub fn with_base_url(base: &str) -> Result<Self, url::ParseError> {
        let completions_url = Url::parse(base)?.join("chat/completions")?;
        Ok(Self {
            http: reqwest::Client::new(),
            completions_url,
        })
    }

    fn decode_error_message(status: u16, body: &str) -> String {
        serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|error| error.message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("provider request failed with status {status}")
                } else {
                    body.trim().to_string()
                }
            })
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    async fn stream_completion(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<FragmentStream, ProviderError> {
        let body = CompletionBody {
            model: &request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let response = self
            .http
            .post(self.completions_url.clone())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: Self::decode_error_message(status.as_u16(), &text),
            });
        }

        let (tx, rx) = unbounded_channel();
        tokio::spawn(pump_sse_stream(response, tx));
        Ok(rx)
    }
}

/// Reads the provider's SSE body and forwards content deltas as fragments.
async fn pump_sse_stream(
    response: reqwest::Response,
    tx: UnboundedSender<Result<StreamChunk, ProviderError>>,
) {
    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::new();

    while let Some(piece) = stream.next().await {
        match piece {
            Ok(bytes) => {
                for line in lines.push(&bytes) {
                    match line {
                        SseLine::Done => {
                            let _ = tx.send(Ok(StreamChunk::done()));
                            return;
                        }
                        SseLine::Delta(delta) => {
                            let _ = tx.send(Ok(StreamChunk::delta(delta)));
                        }
                        SseLine::Ignore => {}
                    }
                }
            }
            Err(err) => {
                let _ = tx.send(Err(ProviderError::Transport(err)));
                return;
            }
        }
    }

    // Stream closed without an explicit [DONE] marker; the last line may
    // also have arrived without a trailing newline.
    if let Some(SseLine::Delta(delta)) = lines.finish() {
        let _ = tx.send(Ok(StreamChunk::delta(delta)));
    }
    let _ = tx.send(Ok(StreamChunk::done()));
}

/// Line-buffers the SSE body. Network reads can split both characters and
/// lines, so bytes pass through a [`StreamDecoder`] before line splitting.
struct SseLineBuffer {
    decoder: StreamDecoder,
    buffer: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            decoder: StreamDecoder::new(),
            buffer: String::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.push_str(&self.decoder.push(bytes));
        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            lines.push(parse_sse_line(line.trim_end()));
        }
        lines
    }

    /// Parse whatever remains once the stream closes.
    fn finish(&mut self) -> Option<SseLine> {
        self.buffer.push_str(&self.decoder.finish());
        let line = self.buffer.trim().to_string();
        self.buffer.clear();
        if line.is_empty() {
            None
        } else {
            Some(parse_sse_line(&line))
        }
    }
}

enum SseLine {
    Delta(String),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignore;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => {
            let delta = event
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default();
            if delta.is_empty() {
                SseLine::Ignore
            } else {
                SseLine::Delta(delta)
            }
        }
        // Malformed events are skipped rather than killing the stream.
        Err(_) => SseLine::Ignore,
    }
}

// ---------------------------------------------------------------------------
// Scripted provider for tests and smoke runs

/// Replays a fixed fragment script, optionally after a delay or with a
/// scripted failure. Counts calls so tests can assert the relay never
/// reached the provider.
pub struct MockProvider {
    fragments: Vec<String>,
    initiation_delay: Duration,
    failure: Option<(u16, String)>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::with_fragments(["[Mock] enhanced ", "prompt"])
    }
}

impl MockProvider {
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            initiation_delay: Duration::from_millis(5),
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay stream initiation, for exercising the relay's time budget.
    pub fn delayed_by(mut self, delay: Duration) -> Self {
        self.initiation_delay = delay;
        self
    }

    /// Fail every call with the given provider status and message.
    pub fn failing_with(mut self, status: u16, message: impl Into<String>) -> Self {
        self.failure = Some((status, message.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn stream_completion(
        &self,
        _api_key: &str,
        _request: CompletionRequest,
    ) -> Result<FragmentStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.initiation_delay).await;

        if let Some((status, message)) = &self.failure {
            return Err(ProviderError::Status {
                status: *status,
                message: message.clone(),
            });
        }

        let (tx, rx) = unbounded_channel();
        let fragments = self.fragments.clone();
        tokio::spawn(async move {
            for fragment in fragments {
                sleep(Duration::from_millis(2)).await;
                if tx.send(Ok(StreamChunk::delta(fragment))).is_err() {
                    return;
                }
            }
            let _ = tx.send(Ok(StreamChunk::done()));
        });
        Ok(rx)
    }
}
