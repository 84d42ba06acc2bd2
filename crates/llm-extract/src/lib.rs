//! # llm-extract
//!
//! Streaming structured extraction from large language models.
//!
//! Given natural-language instructions and a list of [`Parameter`]s, the
//! [`StreamingExtractor`] sends one streaming chat request that forces the
//! model to call a single function named `extract`, decodes the call's
//! partial arguments as they stream in, reports every new decoding to an
//! observer, and resolves with the final argument map.
//!
//! The backend is any [`Provider`] (or its object-safe counterpart
//! [`DynProvider`]). Concrete providers live in sibling crates.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────┐
//!              │  llm-extract-openai  │
//!              └──────────┬───────────┘
//!                         │ implements Provider
//!                         ▼
//!   ┌──────────────────────────────────────────────┐
//!   │                 llm-extract                  │  ← you are here
//!   │  StreamingExtractor, Parameter, ChatStream,  │
//!   │  ReadableRegistry, partial JSON decoding     │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_extract::{
//!     DynProvider, ExtractRequest, ExtractionContext, Parameter, StreamingExtractor,
//! };
//!
//! # async fn example(provider: Arc<dyn DynProvider>) -> Result<(), llm_extract::ExtractError> {
//! let extractor = StreamingExtractor::new(ExtractionContext::new(provider));
//! let request = ExtractRequest {
//!     data: Some("Flying out to Lisbon on Monday".into()),
//!     ..ExtractRequest::new("Extract the destination", vec![Parameter::string("city")])
//! };
//!
//! let args = extractor.extract(&request).await?;
//! assert!(args.contains_key("city"));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Messages, content blocks and tool calls |
//! | [`error`] | Unified [`LlmError`] across all providers |
//! | [`extract`] | The [`StreamingExtractor`] and its request, state and error types |
//! | [`message`] | Folding stream events into response messages |
//! | [`partial_json`] | Decoding truncated JSON argument buffers |
//! | [`provider`] | The [`Provider`] trait and request parameters |
//! | [`readable`] | Readable application context and its outline rendering |
//! | [`schema`] | [`Parameter`] declarations and their JSON Schema projection |
//! | [`stream`] | Stream event types and the [`ChatStream`] alias |
//! | [`usage`] | Token counts |

#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod extract;
pub mod message;
pub mod partial_json;
pub mod provider;
pub mod readable;
pub mod schema;
pub mod stream;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

// ── Core re-exports ────────────────────────────────────────────────
//
// Only the types that appear in nearly every program are re-exported
// at the crate root. Everything else lives in its submodule:
//
//   llm_extract::extract::*   — ExtractionReducer, RequestType, ForwardedParams
//   llm_extract::provider::*  — capabilities, metadata
//   llm_extract::readable::*  — ContextSource, Readable, ContextId
//   llm_extract::message::*   — MessageAccumulator, ResponseMessage
//   llm_extract::mock::*      — MockProvider (test-utils feature)

pub use chat::{ChatMessage, ChatRole, ContentBlock, StopReason, ToolCall, ToolResult};
pub use error::LlmError;
pub use extract::{
    ArgumentMap, ExtractError, ExtractRequest, ExtractionContext, IncludeOptions, StreamState,
    StreamingExtractor,
};
pub use provider::{
    ChatParams, DynProvider, Provider, ProviderMetadata, ToolChoice, ToolDefinition,
};
pub use readable::ReadableRegistry;
pub use schema::{JsonSchema, Parameter, ParameterType};
pub use stream::{ChatStream, StreamEvent};
pub use usage::Usage;
