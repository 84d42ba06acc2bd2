//! Live tests against the `OpenAI` API.
//!
//! Every test returns early, and passes, unless `OPENAI_API_KEY` is set:
//!
//! ```sh
//! OPENAI_API_KEY=sk-... cargo test -p llm-extract-openai --test integration
//! ```

use std::sync::Arc;

use futures::StreamExt;
use llm_extract::chat::{ChatMessage, StopReason};
use llm_extract::provider::{ChatParams, Provider, ToolChoice, ToolDefinition};
use llm_extract::schema::parameters_to_json_schema;
use llm_extract::{
    ExtractError, ExtractRequest, ExtractionContext, LlmError, Parameter, ParameterType,
    StreamEvent, StreamState, StreamingExtractor,
};
use llm_extract_openai::{OpenAiConfig, OpenAiProvider};
use tokio_util::sync::CancellationToken;

const LIVE_MODEL: &str = "gpt-4o-mini";

/// Environment settings with the model pinned to a small one.
fn live_config() -> Option<OpenAiConfig> {
    let config = OpenAiConfig::from_env().ok()?;
    Some(OpenAiConfig {
        model: LIVE_MODEL.into(),
        ..config
    })
}

macro_rules! live_provider_or_skip {
    () => {
        match live_config() {
            Some(config) => OpenAiProvider::new(config),
            None => {
                eprintln!("skipping: {} is not set", "OPENAI_API_KEY");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_plain_text_stream_reports_usage() {
    let provider = live_provider_or_skip!();

    let params = ChatParams {
        messages: vec![ChatMessage::user("Reply with the single digit 4.")],
        max_tokens: Some(16),
        ..Default::default()
    };

    let mut text = String::new();
    let mut stop = None;
    let mut input_tokens = 0;
    let mut events = provider.stream(&params).await.unwrap();
    while let Some(event) = events.next().await {
        match event.unwrap() {
            StreamEvent::TextDelta(delta) => text += &delta,
            StreamEvent::Done { stop_reason } => stop = Some(stop_reason),
            StreamEvent::Usage(usage) => input_tokens = usage.input_tokens,
            _ => {}
        }
    }

    assert!(text.contains('4'), "unexpected reply: {text}");
    assert_eq!(stop, Some(StopReason::EndTurn));
    assert!(input_tokens > 0, "include_usage should add a usage chunk");
}

#[tokio::test]
async fn test_stream_forced_tool_call() {
    let provider = live_provider_or_skip!();

    let params = ChatParams {
        messages: vec![ChatMessage::user("I'm flying to Lisbon next week.")],
        tools: Some(vec![ToolDefinition {
            name: "extract".into(),
            description: "Extract the destination city".into(),
            parameters: parameters_to_json_schema(&[Parameter::string("city")]),
        }]),
        tool_choice: Some(ToolChoice::Specific("extract".into())),
        max_tokens: Some(64),
        ..Default::default()
    };

    let mut stream = provider.stream(&params).await.unwrap();
    let mut started = false;
    let mut deltas = 0;
    let mut complete = None;

    while let Some(event) = stream.next().await {
        match event.unwrap() {
            StreamEvent::ToolCallStart { name, .. } => {
                assert_eq!(name, "extract");
                started = true;
            }
            StreamEvent::ToolCallDelta { .. } => deltas += 1,
            StreamEvent::ToolCallComplete { call, .. } => complete = Some(call),
            _ => {}
        }
    }

    assert!(started);
    assert!(deltas > 0);
    let call = complete.expect("forced call should complete");
    let city = call.arguments["city"].as_str().unwrap_or_default();
    assert!(city.contains("Lisbon"), "unexpected city: {city}");
}

#[tokio::test]
async fn test_extract_end_to_end() {
    let provider = live_provider_or_skip!();
    let extractor = StreamingExtractor::new(ExtractionContext::new(Arc::new(provider)));

    let request = ExtractRequest {
        data: Some("Invoice 77: 3 chairs shipped to Bergen, paid by card.".into()),
        ..ExtractRequest::new(
            "Extract the invoice details",
            vec![
                Parameter::string("city").description("Destination city"),
                Parameter::new("quantity", ParameterType::Number),
                Parameter::string("payment")
                    .one_of(["card", "cash", "transfer"])
                    .description("Payment method"),
            ],
        )
    };

    let mut states = Vec::new();
    let args = extractor
        .extract_with(&request, |state| states.push(state.clone()))
        .await
        .unwrap();

    assert!(matches!(states.first(), Some(StreamState::Initial(_))));
    assert!(matches!(states.last(), Some(StreamState::Complete(a)) if *a == args));
    assert_eq!(args["payment"], "card");
    assert_eq!(args["quantity"], 3);
}

#[tokio::test]
async fn test_extract_cancelled_before_send() {
    let provider = live_provider_or_skip!();
    let extractor = StreamingExtractor::new(ExtractionContext::new(Arc::new(provider)));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = ExtractRequest {
        cancel,
        ..ExtractRequest::new("Extract the city", vec![Parameter::string("city")])
    };

    let err = extractor.extract(&request).await.unwrap_err();
    assert!(err.is_aborted());
}

#[tokio::test]
async fn test_invalid_api_key() {
    let live = live_provider_or_skip!();
    let provider = OpenAiProvider::new(OpenAiConfig {
        api_key: "sk-invalid-key-for-testing".into(),
        model: live.metadata().model,
        ..Default::default()
    });
    let extractor = StreamingExtractor::new(ExtractionContext::new(Arc::new(provider)));

    let err = extractor
        .extract(&ExtractRequest::new(
            "Extract the city",
            vec![Parameter::string("city")],
        ))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ExtractError::Transport(LlmError::Auth(_))),
        "Expected Auth error, got: {err:?}"
    );
}
