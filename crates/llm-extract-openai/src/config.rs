//! Connection settings for [`OpenAiProvider`](crate::OpenAiProvider).

use std::fmt;
use std::time::Duration;

use llm_extract::LlmError;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "OPENAI_MODEL";
const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_ORG: &str = "OPENAI_ORG_ID";

/// Where and how to reach a Chat Completions endpoint.
///
/// Fill in what differs from [`Default`]:
///
/// ```rust
/// use llm_extract_openai::OpenAiConfig;
///
/// let config = OpenAiConfig {
///     api_key: "sk-...".into(),
///     base_url: "http://localhost:11434/v1".into(),
///     ..Default::default()
/// };
/// assert_eq!(config.model, "gpt-4o");
/// ```
///
/// `Debug` output never contains the key.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Model id, `"gpt-4o"` unless set.
    pub model: String,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,
    /// Timeout for requests whose
    /// [`ChatParams::timeout`](llm_extract::ChatParams::timeout) is unset.
    pub timeout: Option<Duration>,
    /// Client to share a connection pool with. `timeout` is not applied
    /// to a client supplied here.
    pub client: Option<reqwest::Client>,
}

impl OpenAiConfig {
    /// Settings from `OPENAI_API_KEY` (required), `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL` and `OPENAI_ORG_ID`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// [`LlmError::Auth`] when no API key is available.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let Some(api_key) = var(ENV_API_KEY) else {
            return Err(LlmError::Auth(format!("{ENV_API_KEY} is not set")));
        };

        let mut config = Self {
            api_key,
            organization: var(ENV_ORG),
            ..Self::default()
        };
        if let Some(model) = var(ENV_MODEL) {
            config.model = model;
        }
        if let Some(base_url) = var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            organization: None,
            timeout: None,
            client: None,
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("OpenAiConfig")
            .field("api_key", &key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("shared_client", &self.client.is_some())
            .finish()
    }
}
