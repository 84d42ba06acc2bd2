//! What an extraction asks for, and what it runs against.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatMessage;
use crate::provider::DynProvider;
use crate::readable::ContextSource;
use crate::schema::Parameter;

/// Which parts of the application context go into the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Render the readable context into the system message.
    pub readable: bool,
    /// Append the conversation history after the instruction messages.
    pub messages: bool,
}

/// The kind of request, forwarded to the provider as metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RequestType {
    /// A conversational turn.
    Chat,
    /// A one-shot task. Extractions default to this.
    #[default]
    Task,
    /// Inline text completion.
    TextareaCompletion,
    /// Popover text editing.
    TextareaPopover,
    /// Follow-up suggestions.
    Suggestion,
}

impl RequestType {
    /// The wire name placed in request metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Task => "Task",
            Self::TextareaCompletion => "TextareaCompletion",
            Self::TextareaPopover => "TextareaPopover",
            Self::Suggestion => "Suggestion",
        }
    }
}

/// Sampling and transport settings passed through to the provider.
///
/// Tool selection is not configurable: every extraction pins the
/// `extract` function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardedParams {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Extra HTTP headers.
    pub extra_headers: Option<http::HeaderMap>,
}

/// One extraction: instructions, the parameters wanted back, and options.
///
/// ```rust
/// use llm_extract::{ExtractRequest, IncludeOptions, Parameter};
///
/// let request = ExtractRequest {
///     data: Some(serde_json::json!({"ticket": 4512})),
///     include: IncludeOptions { readable: true, messages: false },
///     ..ExtractRequest::new("Extract the city", vec![Parameter::string("city")])
/// };
/// assert!(!request.cancel.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtractRequest {
    /// What the model should do. Also used as the function description.
    pub instructions: String,
    /// The values the model must produce, in order.
    pub parameters: Vec<Parameter>,
    /// Extra context placed ahead of the readable context. A JSON string
    /// is used verbatim; any other value is serialized.
    pub data: Option<Value>,
    /// Which application context to include.
    pub include: IncludeOptions,
    /// Cancels the extraction when fired.
    pub cancel: CancellationToken,
    /// Request kind forwarded as metadata.
    pub request_type: RequestType,
    /// Sampling and transport settings.
    pub forwarded: ForwardedParams,
}

impl ExtractRequest {
    /// A request with default options.
    pub fn new(instructions: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            instructions: instructions.into(),
            parameters,
            ..Self::default()
        }
    }
}

/// Supplies the conversation so far.
pub trait HistorySource: Send + Sync {
    /// A snapshot of the conversation, oldest first.
    fn messages(&self) -> Vec<ChatMessage>;
}

impl HistorySource for Vec<ChatMessage> {
    fn messages(&self) -> Vec<ChatMessage> {
        self.clone()
    }
}

/// Everything an extraction runs against.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ExtractionContext {
    /// The backend requests go to.
    pub provider: Arc<dyn DynProvider>,
    /// Readable context, rendered when [`IncludeOptions::readable`] is set.
    pub readable: Option<Arc<dyn ContextSource>>,
    /// Conversation history, appended when [`IncludeOptions::messages`] is set.
    pub history: Option<Arc<dyn HistorySource>>,
}

impl ExtractionContext {
    /// A context with only a provider.
    pub fn new(provider: Arc<dyn DynProvider>) -> Self {
        Self {
            provider,
            readable: None,
            history: None,
        }
    }

    /// Attaches a readable context source.
    #[must_use]
    pub fn with_readable(mut self, readable: Arc<dyn ContextSource>) -> Self {
        self.readable = Some(readable);
        self
    }

    /// Attaches a history source.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = Some(history);
        self
    }
}

impl fmt::Debug for ExtractionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("provider", &self.provider.metadata())
            .field("readable", &self.readable.is_some())
            .field("history", &self.history.is_some())
            .finish()
    }
}
