//! Extraction error type.

use crate::error::LlmError;

use super::ArgumentMap;

/// Why an extraction did not produce a result.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The cancellation token fired.
    #[error("Aborted")]
    Aborted,

    /// The response ended without an `extract` call.
    #[error("extract() failed: No function call occurred")]
    NoFunctionCall,

    /// The request was rejected before anything was sent.
    #[error("Invalid extraction request: {0}")]
    InvalidRequest(String),

    /// The final arguments do not satisfy the parameter schema.
    #[error("Extracted arguments failed validation: {message}")]
    SchemaValidation {
        /// Concatenated validation messages.
        message: String,
        /// The arguments that failed.
        arguments: ArgumentMap,
    },

    /// The final arguments could not be converted to the requested type.
    #[error("Failed to deserialize extracted arguments: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The provider failed, either opening the stream or mid-stream.
    #[error(transparent)]
    Transport(#[from] LlmError),
}

impl ExtractError {
    /// Returns `true` for [`ExtractError::Aborted`].
    ///
    /// ```rust
    /// use llm_extract::ExtractError;
    ///
    /// assert!(ExtractError::Aborted.is_aborted());
    /// assert!(!ExtractError::NoFunctionCall.is_aborted());
    /// ```
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
