//! The seam between the extractor and an LLM backend.
//!
//! A backend implements [`Provider`]: open one streaming response for a
//! [`ChatParams`], and describe itself. The extractor stores backends as
//! `Arc<dyn DynProvider>`; every `Provider` is a `DynProvider` through a
//! blanket impl, so implementors never write the boxed version.
//!
//! Extraction needs exactly one kind of request, so there is no
//! non-streaming method.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::ChatMessage;
use crate::error::LlmError;
use crate::schema::JsonSchema;
use crate::stream::ChatStream;

/// A backend that can stream a chat completion.
///
/// Written with async fn in traits and therefore not object safe; use
/// [`DynProvider`] behind a pointer.
pub trait Provider: Send + Sync {
    /// Opens the response stream for `params`.
    ///
    /// An `Err` here means nothing was streamed: the request could not
    /// be sent or was refused. Failures after that point are `Err`
    /// items of the returned stream.
    fn stream(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    /// Describes this backend.
    fn metadata(&self) -> ProviderMetadata;
}

/// Object-safe form of [`Provider`], implemented for every provider.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use llm_extract::provider::{Capability, DynProvider};
///
/// fn can_extract(provider: &Arc<dyn DynProvider>) -> bool {
///     provider.metadata().supports(Capability::Tools)
/// }
/// ```
pub trait DynProvider: Send + Sync {
    /// [`Provider::stream`] with a boxed future.
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>>;

    /// [`Provider::metadata`].
    fn metadata(&self) -> ProviderMetadata;
}

impl<P: Provider> DynProvider for P {
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>> {
        Box::pin(Provider::stream(self, params))
    }

    fn metadata(&self) -> ProviderMetadata {
        Provider::metadata(self)
    }
}

/// Identity and features of a provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Backend name, e.g. `"openai"`.
    pub name: Cow<'static, str>,
    /// Model the requests go to.
    pub model: String,
    /// What the backend can do.
    pub capabilities: HashSet<Capability>,
}

impl ProviderMetadata {
    /// Whether `capability` is advertised.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// An optional backend feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Function calling, which extraction depends on.
    Tools,
    /// Hidden reasoning before the answer.
    Reasoning,
}

/// One streaming request.
///
/// Serializable for logging and replay; the transport-only fields
/// [`timeout`](Self::timeout) and [`extra_headers`](Self::extra_headers)
/// are left out.
///
/// ```rust
/// use llm_extract::{ChatMessage, ChatParams, ToolChoice};
///
/// let params = ChatParams {
///     messages: vec![ChatMessage::user("Ship it to Oslo")],
///     tool_choice: Some(ToolChoice::Specific("extract".into())),
///     ..Default::default()
/// };
/// assert!(params.tool("extract").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// Prompt messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Functions the model may call.
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model must use `tools`. `None` leaves it to the provider.
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Cap on generated tokens.
    pub max_tokens: Option<u32>,
    /// Deadline for this request, overriding the provider default.
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Headers added to this request.
    #[serde(skip)]
    pub extra_headers: Option<http::HeaderMap>,
    /// Request annotations such as the request type. Providers may log
    /// them; they are never sent to the model.
    pub metadata: HashMap<String, Value>,
}

impl ChatParams {
    /// The declared function named `name`.
    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.as_deref()?.iter().find(|t| t.name == name)
    }
}

/// Constraint on the model's function use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ToolChoice {
    /// Call a function or answer in text, at the model's discretion.
    Auto,
    /// Call the named function and nothing else.
    Specific(String),
}

/// A function offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name the model calls it by.
    pub name: String,
    /// What the function is for, shown to the model.
    pub description: String,
    /// Schema of the arguments.
    pub parameters: JsonSchema,
}
