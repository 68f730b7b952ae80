//! Error surfaces on both sides of the relay.
//!
//! [`RelayError`] is what the endpoint serializes onto the wire as
//! `{ error, code?, message? }`; [`EnhanceFailure`] is the user-facing
//! classification the controller derives from a failed request. The relay
//! always attaches a stable `code` so the controller never has to parse
//! prose.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable codes attached to relay error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "TIMEOUT_ERROR")]
    Timeout,
    #[serde(rename = "AUTH_ERROR")]
    Auth,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimit,
    #[serde(rename = "API_ERROR")]
    Api,
    #[serde(rename = "SERVER_ERROR")]
    Server,
}

/// Failure produced while handling a relay request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Request body was not valid JSON.
    #[error("Invalid request format")]
    InvalidFormat,

    /// A required field was missing or empty.
    #[error("{0}")]
    MissingField(&'static str),

    /// The provider call did not start within the time budget.
    #[error("Request timed out. The enhancement process took too long to complete.")]
    Timeout,

    /// The provider rejected the caller's credential.
    #[error("Invalid API key or authorization error. Please check your Groq API key and try again.")]
    Auth { detail: String },

    /// The provider throttled the caller.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimit,

    /// Any other provider-reported failure.
    #[error("Failed to enhance prompt. Please try again later.")]
    Api { detail: String },

    /// A fault in the relay itself.
    #[error("An unexpected error occurred on the server.")]
    Internal,
}

/// Wire shape of a relay error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RelayError {
    pub fn missing_prompt() -> Self {
        Self::MissingField("Valid prompt text is required")
    }

    pub fn missing_api_key() -> Self {
        Self::MissingField("Valid API key is required")
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidFormat | Self::MissingField(_) => 400,
            Self::Auth { .. } => 401,
            Self::RateLimit => 429,
            Self::Timeout => 504,
            Self::Api { .. } | Self::Internal => 500,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::InvalidFormat | Self::MissingField(_) => None,
            Self::Timeout => Some(ErrorCode::Timeout),
            Self::Auth { .. } => Some(ErrorCode::Auth),
            Self::RateLimit => Some(ErrorCode::RateLimit),
            Self::Api { .. } => Some(ErrorCode::Api),
            Self::Internal => Some(ErrorCode::Server),
        }
    }

    /// JSON body for the error response.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            Self::Auth { detail } | Self::Api { detail } => Some(detail.clone()),
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            code: self.code(),
            message,
        }
    }
}

/// User-facing classes of enhancement failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Network,
    Auth,
    Timeout,
    RateLimit,
    Validation,
    Server,
    Unknown,
}

/// Structured failure the controller surfaces to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhanceFailure {
    pub class: FailureClass,
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub retryable: bool,
}

impl EnhanceFailure {
    fn new(
        class: FailureClass,
        title: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            class,
            title: title.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
            retryable,
        }
    }

    pub fn network_timeout() -> Self {
        Self::new(
            FailureClass::Network,
            "Network Connection Timeout",
            "Unable to connect to the enhancement service. Your internet connection may be unstable.",
            "Check your internet connection and try again.",
            true,
        )
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(
            FailureClass::Network,
            "Network Connection Error",
            detail,
            "Please check your internet connection and try again.",
            true,
        )
    }

    pub fn empty_error_body(status: u16) -> Self {
        Self::new(
            FailureClass::Server,
            format!("Server Error ({status})"),
            "The server returned an empty error response.",
            "This is likely a temporary issue. Please try again in a few moments.",
            true,
        )
    }

    pub fn empty_result() -> Self {
        Self::new(
            FailureClass::Server,
            "Empty Response",
            "The enhancement service returned an empty response.",
            "This might be due to a processing issue. Please try again.",
            true,
        )
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(
            FailureClass::Unknown,
            "Unexpected Error",
            detail,
            "Please try again. If the problem persists, try again later.",
            true,
        )
    }

    /// Classify a non-2xx relay response from its status and raw body text.
    pub fn classify_response(status: u16, body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::empty_error_body(status);
        }
        let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
            return Self::new(
                FailureClass::Unknown,
                format!("Error {status}"),
                body,
                "This is an unexpected error. Please try again later.",
                true,
            );
        };
        if parsed.code == Some(ErrorCode::Auth) || status == 401 || status == 403 {
            Self::new(
                FailureClass::Auth,
                "API Key Authentication Failed",
                "Your Groq API key could not be authenticated.",
                "1. Verify you're using a valid Groq API key\n2. Check that the API key has not expired\n3. Ensure your account has sufficient credits",
                false,
            )
        } else if parsed.code == Some(ErrorCode::RateLimit) || status == 429 {
            Self::new(
                FailureClass::RateLimit,
                "Rate Limit Exceeded",
                "You've sent too many requests in a short period of time.",
                "Please wait a moment before trying again.",
                true,
            )
        } else if parsed.code == Some(ErrorCode::Timeout) || status == 504 {
            Self::new(
                FailureClass::Timeout,
                "Request Timed Out",
                "The enhancement process took too long to complete.",
                "Try again with a shorter text or different options.",
                true,
            )
        } else if (400..500).contains(&status) {
            Self {
                class: FailureClass::Validation,
                title: "Invalid Request".into(),
                message: parsed.error,
                suggestion: Some(
                    parsed
                        .message
                        .unwrap_or_else(|| "Please check your input and try again.".into()),
                ),
                retryable: true,
            }
        } else {
            Self {
                class: FailureClass::Server,
                title: "Server Error".into(),
                message: parsed.error,
                suggestion: Some("This is likely a temporary issue. Please try again later.".into()),
                retryable: true,
            }
        }
    }
}
