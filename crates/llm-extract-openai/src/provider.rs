//! [`OpenAiProvider`]: the `Provider` implementation.

use std::collections::HashSet;
use std::time::Duration;

use http::StatusCode;
use llm_extract::error::LlmError;
use llm_extract::provider::{Capability, ChatParams, Provider, ProviderMetadata, ToolChoice};
use llm_extract::stream::ChatStream;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::OpenAiConfig;
use crate::{convert, stream};

const ORGANIZATION: &str = "openai-organization";

/// Streams Chat Completions from `OpenAI`, or from any server speaking
/// the same protocol at [`OpenAiConfig::base_url`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use llm_extract::{ExtractRequest, ExtractionContext, Parameter, StreamingExtractor};
/// use llm_extract_openai::{OpenAiConfig, OpenAiProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = OpenAiProvider::new(OpenAiConfig::from_env()?);
/// let extractor = StreamingExtractor::new(ExtractionContext::new(Arc::new(provider)));
///
/// let request = ExtractRequest {
///     data: Some("Meet me in Porto on Friday".into()),
///     ..ExtractRequest::new("Extract the city", vec![Parameter::string("city")])
/// };
/// let args = extractor.extract(&request).await?;
/// println!("{}", args["city"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Uses `config.client` when set, so providers can share a
    /// connection pool. Otherwise builds a client with `config.timeout`.
    pub fn new(config: OpenAiConfig) -> Self {
        let client = match &config.client {
            Some(client) => client.clone(),
            None => build_client(config.timeout),
        };
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Auth and content negotiation, then the caller's extra headers,
    /// which override on conflict.
    fn headers(&self, extra: Option<&HeaderMap>) -> Result<HeaderMap, LlmError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| LlmError::Auth("API key is not a valid header value".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(org) = &self.config.organization {
            let value = HeaderValue::from_str(org).map_err(|_| {
                LlmError::InvalidRequest("organization id is not a valid header value".into())
            })?;
            headers.insert(ORGANIZATION, value);
        }
        for (name, value) in extra.into_iter().flatten() {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    /// POST the request; resolves once a 2xx status line has arrived.
    async fn open(&self, params: &ChatParams) -> Result<reqwest::Response, LlmError> {
        let timeout = params.timeout.or(self.config.timeout);
        let mut request = self
            .client
            .post(self.endpoint())
            .headers(self.headers(params.extra_headers.as_ref())?)
            .json(&convert::request_body(params, &self.config));
        if let Some(per_request) = params.timeout {
            request = request.timeout(per_request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| send_error(&e, timeout))?;

        let status = status_code(response.status().as_u16());
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, "chat completion request rejected");
        Err(convert::status_error(status, &body))
    }
}

fn build_client(timeout: Option<Duration>) -> reqwest::Client {
    let builder = match timeout {
        Some(timeout) => reqwest::Client::builder().timeout(timeout),
        None => reqwest::Client::builder(),
    };
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default HTTP client");
        reqwest::Client::new()
    })
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Failure before any status line was received.
fn send_error(e: &reqwest::Error, timeout: Option<Duration>) -> LlmError {
    if e.is_timeout() {
        let elapsed = timeout.unwrap_or_default().as_millis();
        return LlmError::Timeout {
            elapsed_ms: u64::try_from(elapsed).unwrap_or(u64::MAX),
        };
    }
    LlmError::Http {
        status: e.status().map(|s| status_code(s.as_u16())),
        message: e.to_string(),
        retryable: e.is_connect(),
    }
}

/// o-series models reason before answering.
fn reasons(model: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|prefix| model.starts_with(prefix))
}

impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model, messages = params.messages.len()))]
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        if let Some(kind) = params.metadata.get("request_type") {
            tracing::debug!(request_type = %kind, "opening chat completion stream");
        }
        if let Some(ToolChoice::Specific(name)) = &params.tool_choice {
            if params.tool(name).is_none() {
                return Err(LlmError::InvalidRequest(format!(
                    "tool_choice pins `{name}`, which is not among the declared tools"
                )));
            }
        }
        let response = self.open(params).await?;
        Ok(stream::into_stream(response))
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut capabilities = HashSet::from([Capability::Tools]);
        if reasons(&self.config.model) {
            capabilities.insert(Capability::Reasoning);
        }
        ProviderMetadata {
            name: "openai".into(),
            model: self.config.model.clone(),
            capabilities,
        }
    }
}
