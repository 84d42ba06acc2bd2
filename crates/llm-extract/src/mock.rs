//! Scripted provider for tests.
//!
//! [`MockProvider`] answers each `stream` call with the next scripted
//! [`MockResponse`] and remembers every [`ChatParams`] it was given, so
//! a test can both drive the extractor and inspect the request it built.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_extract::mock::MockProvider;
//! use llm_extract::{ExtractRequest, ExtractionContext, Parameter, StreamingExtractor};
//!
//! # async fn example() {
//! let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
//! mock.queue_extract(&[r#"{"city": "Ri"#, r#"ga"}"#]);
//!
//! let extractor = StreamingExtractor::new(ExtractionContext::new(mock.clone()));
//! let args = extractor
//!     .extract(&ExtractRequest::new("Extract the city", vec![Parameter::string("city")]))
//!     .await
//!     .unwrap();
//! assert_eq!(args["city"], "Riga");
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use crate::stream::{ChatStream, StreamEvent};
use crate::test_helpers::extract_call_events;

/// One scripted answer to a `stream` call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The stream opens and yields these items, then ends.
    Stream(Vec<Result<StreamEvent, LlmError>>),
    /// The stream never opens.
    Refuse(LlmError),
}

/// A provider that replays scripted responses in order.
///
/// When the script runs out, `stream` fails with
/// [`LlmError::InvalidRequest`].
pub struct MockProvider {
    meta: ProviderMetadata,
    script: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<ChatParams>>,
}

impl MockProvider {
    /// A mock with an empty script.
    pub fn new(meta: ProviderMetadata) -> Self {
        Self {
            meta,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock that advertises [`Capability::Tools`].
    pub fn with_tools(name: &str, model: &str) -> Self {
        Self::new(ProviderMetadata {
            name: name.to_owned().into(),
            model: model.to_owned(),
            capabilities: HashSet::from([Capability::Tools]),
        })
    }

    /// Appends a response to the script.
    pub fn queue(&self, response: MockResponse) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    /// Appends a stream that yields `events` without errors.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) -> &Self {
        self.queue(MockResponse::Stream(events.into_iter().map(Ok).collect()))
    }

    /// Appends a stream whose items may fail after it has opened.
    pub fn queue_stream_results(&self, items: Vec<Result<StreamEvent, LlmError>>) -> &Self {
        self.queue(MockResponse::Stream(items))
    }

    /// Appends a refusal: the next `stream` call returns `error`.
    pub fn queue_stream_error(&self, error: LlmError) -> &Self {
        self.queue(MockResponse::Refuse(error))
    }

    /// Appends a well-formed `extract` call streaming `chunks` as its
    /// argument fragments. See [`extract_call_events`].
    pub fn queue_extract(&self, chunks: &[&str]) -> &Self {
        self.queue_stream(extract_call_events(chunks))
    }

    /// Every request received so far, oldest first.
    pub fn recorded_calls(&self) -> Vec<ChatParams> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("meta", &self.meta)
            .field("remaining", &self.remaining())
            .field("recorded", &self.recorded_calls().len())
            .finish()
    }
}

impl Provider for MockProvider {
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(MockResponse::Stream(items)) => Ok(Box::pin(futures::stream::iter(items))),
            Some(MockResponse::Refuse(error)) => Err(error),
            None => Err(LlmError::InvalidRequest(
                "mock script exhausted: no response queued".into(),
            )),
        }
    }

    fn metadata(&self) -> ProviderMetadata {
        self.meta.clone()
    }
}
