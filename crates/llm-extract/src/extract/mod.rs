//! Streaming extraction.
//!
//! An extraction asks the model to fill in a list of [`Parameter`]s by
//! forcing one call to a function named [`EXTRACT_ACTION`]. The
//! [`StreamingExtractor`] sends a single streaming request, decodes the
//! call's arguments as they arrive, and reports each new decoding to an
//! observer before resolving with the final arguments.
//!
//! ```text
//!   ExtractRequest ──► build_params ──► DynProvider::stream_boxed
//!                                              │
//!                                         ChatStream
//!                                              │ one event at a time
//!                                     ExtractionReducer
//!                                  (MessageAccumulator + hold-back)
//!                                              │
//!                     observer(Initial) → observer(InProgress)* → observer(Complete)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_extract::{
//!     DynProvider, ExtractRequest, ExtractionContext, Parameter, StreamState,
//!     StreamingExtractor,
//! };
//!
//! # async fn example(provider: Arc<dyn DynProvider>) -> Result<(), llm_extract::ExtractError> {
//! let extractor = StreamingExtractor::new(ExtractionContext::new(provider));
//! let request = ExtractRequest::new(
//!     "Extract the destination city from the message",
//!     vec![Parameter::string("city").description("Destination city")],
//! );
//!
//! let args = extractor
//!     .extract_with(&request, |state: &StreamState| {
//!         println!("{:?}", state.arguments());
//!     })
//!     .await?;
//! println!("city = {}", args["city"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Cancellation
//!
//! [`ExtractRequest::cancel`] is checked before the request is sent,
//! before each event is processed and once more when the stream ends. A fired token yields [`ExtractError::Aborted`] and no
//! further observer calls.

mod error;
mod prompt;
mod request;
mod state;

pub use error::ExtractError;
pub use request::{
    ExtractRequest, ExtractionContext, ForwardedParams, HistorySource, IncludeOptions, RequestType,
};
pub use state::{ExtractionReducer, StreamState};

use std::collections::HashMap;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::chat::ChatMessage;
use crate::error::LlmError;
use crate::provider::{Capability, ChatParams, ToolChoice, ToolDefinition};
use crate::readable::DEFAULT_CATEGORY;
use crate::schema::{Parameter, parameters_to_json_schema};

/// Untyped arguments of a function call.
pub type ArgumentMap = serde_json::Map<String, Value>;

/// Name of the single function every extraction declares.
pub const EXTRACT_ACTION: &str = "extract";

/// Metadata key carrying the [`RequestType`].
pub const REQUEST_TYPE_KEY: &str = "request_type";

/// Runs extractions against an [`ExtractionContext`].
#[derive(Debug, Clone)]
pub struct StreamingExtractor {
    ctx: ExtractionContext,
}

impl StreamingExtractor {
    /// An extractor for the given context.
    pub fn new(ctx: ExtractionContext) -> Self {
        Self { ctx }
    }

    /// The context this extractor runs against.
    pub fn context(&self) -> &ExtractionContext {
        &self.ctx
    }

    /// Runs an extraction without observing intermediate states.
    pub async fn extract(&self, request: &ExtractRequest) -> Result<ArgumentMap, ExtractError> {
        self.extract_with(request, |_| {}).await
    }

    /// Runs an extraction, calling `observer` for every state.
    ///
    /// The observer runs on the task driving the returned future,
    /// between reads of the response stream.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidRequest`] for blank instructions.
    /// - [`ExtractError::Aborted`] when the cancellation token fires.
    /// - [`ExtractError::NoFunctionCall`] when the response holds no
    ///   `extract` call.
    /// - [`ExtractError::SchemaValidation`] when the final arguments do
    ///   not satisfy the parameters. No `Complete` state is reported.
    /// - [`ExtractError::Transport`] for provider failures.
    #[instrument(
        skip_all,
        fields(
            parameters = request.parameters.len(),
            include_readable = request.include.readable,
            include_messages = request.include.messages,
        )
    )]
    pub async fn extract_with<F>(
        &self,
        request: &ExtractRequest,
        mut observer: F,
    ) -> Result<ArgumentMap, ExtractError>
    where
        F: FnMut(&StreamState),
    {
        let params = self.build_params(request)?;

        if request.cancel.is_cancelled() {
            tracing::debug!("extraction cancelled before request");
            return Err(ExtractError::Aborted);
        }

        let mut stream = self.ctx.provider.stream_boxed(&params).await?;
        let mut reducer = ExtractionReducer::new();

        while let Some(event) = stream.next().await {
            if request.cancel.is_cancelled() {
                tracing::debug!("extraction cancelled mid-stream");
                return Err(ExtractError::Aborted);
            }
            let event = event?;
            let had_call = reducer.has_call();
            if let Some(state) = reducer.push(&event) {
                observer(&state);
            }
            if !had_call && reducer.has_call() {
                tracing::debug!(index = ?event.call_index(), "extract call started");
            }
        }

        if request.cancel.is_cancelled() {
            tracing::debug!("extraction cancelled at stream end");
            return Err(ExtractError::Aborted);
        }

        let Some((arguments, initial_reported)) = reducer.finish() else {
            tracing::debug!("stream ended without an extract call");
            return Err(ExtractError::NoFunctionCall);
        };

        validate(&request.parameters, &arguments)?;

        if !initial_reported {
            observer(&StreamState::Initial(arguments.clone()));
        }
        observer(&StreamState::Complete(arguments.clone()));
        tracing::debug!("extraction complete");
        Ok(arguments)
    }

    /// Runs an extraction and deserializes the result into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`extract_with`](Self::extract_with) returns, plus
    /// [`ExtractError::Deserialize`].
    pub async fn extract_as<T, F>(
        &self,
        request: &ExtractRequest,
        observer: F,
    ) -> Result<T, ExtractError>
    where
        T: DeserializeOwned,
        F: FnMut(&StreamState),
    {
        let arguments = self.extract_with(request, observer).await?;
        serde_json::from_value(Value::Object(arguments)).map_err(ExtractError::Deserialize)
    }

    /// Builds the request an extraction sends.
    ///
    /// # Errors
    ///
    /// [`ExtractError::InvalidRequest`] for blank instructions.
    pub fn build_params(&self, request: &ExtractRequest) -> Result<ChatParams, ExtractError> {
        if request.instructions.trim().is_empty() {
            return Err(ExtractError::InvalidRequest(
                "instructions must not be empty".into(),
            ));
        }

        let meta = self.ctx.provider.metadata();
        if !meta.supports(Capability::Tools) {
            tracing::warn!(
                provider = %meta.name,
                model = %meta.model,
                "provider does not advertise tool support"
            );
        }

        let readable = if request.include.readable {
            self.ctx
                .readable
                .as_ref()
                .map(|source| source.context_string(&[DEFAULT_CATEGORY]))
        } else {
            None
        };
        let context = prompt::context_block(request.data.as_ref(), readable.as_deref());

        let mut messages = vec![
            ChatMessage::system(prompt::system_message(&context)),
            ChatMessage::user(prompt::instructions_message(&request.instructions)),
        ];
        if request.include.messages {
            if let Some(history) = &self.ctx.history {
                messages.extend(history.messages());
            }
        }

        let tool = ToolDefinition {
            name: EXTRACT_ACTION.into(),
            description: request.instructions.clone(),
            parameters: parameters_to_json_schema(&request.parameters),
        };

        let forwarded = &request.forwarded;
        Ok(ChatParams {
            messages,
            tools: Some(vec![tool]),
            tool_choice: Some(ToolChoice::Specific(EXTRACT_ACTION.into())),
            temperature: forwarded.temperature,
            max_tokens: forwarded.max_tokens,
            timeout: forwarded.timeout,
            extra_headers: forwarded.extra_headers.clone(),
            metadata: HashMap::from([(
                REQUEST_TYPE_KEY.to_owned(),
                Value::String(request.request_type.as_str().to_owned()),
            )]),
        })
    }
}

fn validate(parameters: &[Parameter], arguments: &ArgumentMap) -> Result<(), ExtractError> {
    let schema = parameters_to_json_schema(parameters);
    match schema.validate(&Value::Object(arguments.clone())) {
        Ok(()) => Ok(()),
        Err(LlmError::SchemaValidation { message, .. }) => Err(ExtractError::SchemaValidation {
            message,
            arguments: arguments.clone(),
        }),
        Err(other) => Err(ExtractError::InvalidRequest(other.to_string())),
    }
}

#[cfg(test)]
mod tests;
