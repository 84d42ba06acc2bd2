//! Transport-level error type shared by every provider.
//!
//! Providers map their native failures into [`LlmError`] so the
//! extractor can surface them unchanged, whatever backend produced
//! them. Extraction-specific outcomes (cancellation, a stream without a
//! function call) live in [`ExtractError`](crate::extract::ExtractError),
//! which wraps this type for transport failures.
//!
//! Nothing in this crate retries. Callers that want to can consult
//! [`LlmError::is_retryable`]:
//!
//! ```rust
//! use llm_extract::LlmError;
//!
//! let err = LlmError::Timeout { elapsed_ms: 5000 };
//! assert!(err.is_retryable());
//! ```

use serde_json::Value;

/// A failure reported by (or while talking to) a provider.
///
/// `Clone` so scripted providers can replay the same failure.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// The connection failed or the server answered with an error status.
    ///
    /// `status` is `None` when the failure happened below HTTP, for
    /// example a reset connection while reading the event stream.
    #[error("HTTP failure{}: {message}", .status.as_ref().map(|s| format!(" ({s})")).unwrap_or_default())]
    Http {
        /// Response status, if a response arrived.
        status: Option<http::StatusCode>,
        /// What the transport or server said.
        message: String,
        /// Sending the same request again may succeed.
        retryable: bool,
    },

    /// Credentials were missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider refused the request as malformed, or it could not
    /// be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An error object the provider sent inside an otherwise healthy
    /// response.
    #[error("provider reported `{code}`: {message}")]
    Provider {
        /// Provider error code, such as `server_error`.
        code: String,
        /// Provider message.
        message: String,
        /// Sending the same request again may succeed.
        retryable: bool,
    },

    /// A response body or event could not be decoded.
    #[error("malformed response: {message}")]
    ResponseFormat {
        /// Decoder message.
        message: String,
        /// Offending input, possibly empty.
        raw: String,
    },

    /// A value did not satisfy a JSON Schema.
    #[error("schema violation: {message}")]
    SchemaValidation {
        /// Every violation, joined by `"; "`.
        message: String,
        /// The schema checked against.
        schema: Value,
        /// The rejected value.
        actual: Value,
    },

    /// The request deadline passed.
    #[error("timed out after {elapsed_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        elapsed_ms: u64,
    },
}

impl LlmError {
    /// Whether the same request might succeed later.
    ///
    /// Timeouts always qualify; `Http` and `Provider` carry their own
    /// flag; everything else is permanent.
    ///
    /// ```rust
    /// use llm_extract::LlmError;
    ///
    /// assert!(!LlmError::Auth("revoked".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}
