//! Tests for the extract module.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use super::*;
use crate::chat::{ChatRole, StopReason};
use crate::mock::MockProvider;
use crate::provider::DynProvider;
use crate::readable::{Readable, ReadableRegistry};
use crate::schema::ParameterType;
use crate::stream::StreamEvent;
use crate::test_helpers::{extract_call_events, sample_history};

fn extractor(mock: &Arc<MockProvider>) -> StreamingExtractor {
    let provider: Arc<dyn DynProvider> = mock.clone();
    StreamingExtractor::new(ExtractionContext::new(provider))
}

fn city_request() -> ExtractRequest {
    ExtractRequest::new("extract the city", vec![Parameter::string("city")])
}

fn map(v: Value) -> ArgumentMap {
    v.as_object().cloned().unwrap()
}

async fn run(
    extractor: &StreamingExtractor,
    request: &ExtractRequest,
) -> (Result<ArgumentMap, ExtractError>, Vec<StreamState>) {
    let mut states = Vec::new();
    let result = extractor
        .extract_with(request, |s| states.push(s.clone()))
        .await;
    (result, states)
}

#[tokio::test]
async fn test_city_is_reported_initial_then_complete() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[
        r#"{"city": "San"#,
        r#" Francisco"}"#,
    ]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert_eq!(result.unwrap(), map(json!({"city": "San Francisco"})));
    assert_eq!(
        states,
        vec![
            StreamState::Initial(map(json!({"city": "San"}))),
            StreamState::Complete(map(json!({"city": "San Francisco"}))),
        ]
    );
}

#[tokio::test]
async fn test_single_chunk_reports_initial_and_complete() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[r#"{"city": "Oslo"}"#]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    let oslo = map(json!({"city": "Oslo"}));
    assert_eq!(result.unwrap(), oslo);
    assert_eq!(
        states,
        vec![StreamState::Initial(oslo.clone()), StreamState::Complete(oslo)]
    );
}

#[tokio::test]
async fn test_states_are_ordered() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[
        r#"{"city": "L"#,
        "o",
        "n",
        "d",
        "o",
        r#"n"}"#,
    ]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert!(result.is_ok());
    assert!(matches!(states.first(), Some(StreamState::Initial(_))));
    assert!(matches!(states.last(), Some(StreamState::Complete(_))));
    assert_eq!(states.iter().filter(|s| s.is_complete()).count(), 1);
    assert!(
        states[1..states.len() - 1]
            .iter()
            .all(|s| matches!(s, StreamState::InProgress(_)))
    );
    assert_eq!(states.last().unwrap().arguments()["city"], "London");
}

#[tokio::test]
async fn test_text_before_call_is_skipped() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    let mut events = vec![StreamEvent::TextDelta("Let me look.".into())];
    events.extend(extract_call_events(&[r#"{"city": "Rome"}"#]));
    mock.queue_stream(events);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert_eq!(result.unwrap()["city"], "Rome");
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].arguments()["city"], "Rome");
}

#[tokio::test]
async fn test_no_function_call() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_stream(vec![
        StreamEvent::TextDelta("Which city do you mean?".into()),
        StreamEvent::Done {
            stop_reason: StopReason::EndTurn,
        },
    ]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert!(matches!(result, Err(ExtractError::NoFunctionCall)));
    assert!(states.is_empty());
}

#[tokio::test]
async fn test_other_function_is_not_an_extraction() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_stream(vec![
        StreamEvent::ToolCallStart {
            index: 0,
            id: "c1".into(),
            name: "search".into(),
        },
        StreamEvent::ToolCallDelta {
            index: 0,
            json_chunk: r#"{"q": "paris"}"#.into(),
        },
    ]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert!(matches!(result, Err(ExtractError::NoFunctionCall)));
    assert!(states.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    let request = city_request();
    request.cancel.cancel();

    let (result, states) = run(&extractor(&mock), &request).await;

    assert!(result.unwrap_err().is_aborted());
    assert!(states.is_empty());
    assert!(mock.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_from_observer_mid_stream() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[
        r#"{"city": "Ber"#,
        "li",
        r#"n"}"#,
    ]);
    let request = city_request();
    let token = request.cancel.clone();

    let mut states = Vec::new();
    let result = extractor(&mock)
        .extract_with(&request, |s| {
            states.push(s.clone());
            token.cancel();
        })
        .await;

    assert!(matches!(result, Err(ExtractError::Aborted)));
    assert_eq!(states, vec![StreamState::Initial(map(json!({"city": "Ber"})))]);
}

#[tokio::test]
async fn test_missing_required_parameter_fails_validation() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[r#"{"country": "Peru"}"#]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    match result {
        Err(ExtractError::SchemaValidation { arguments, message }) => {
            assert_eq!(arguments["country"], "Peru");
            assert!(message.contains("city"));
        }
        other => panic!("expected SchemaValidation, got {other:?}"),
    }
    assert!(states.iter().all(|s| !s.is_complete()));
}

#[tokio::test]
async fn test_mid_stream_transport_error_propagates() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_stream_results(vec![
        Ok(StreamEvent::ToolCallStart {
            index: 0,
            id: "c1".into(),
            name: EXTRACT_ACTION.into(),
        }),
        Ok(StreamEvent::ToolCallDelta {
            index: 0,
            json_chunk: r#"{"city": "Li"#.into(),
        }),
        Err(LlmError::Http {
            status: None,
            message: "connection reset".into(),
            retryable: true,
        }),
    ]);

    let (result, states) = run(&extractor(&mock), &city_request()).await;

    assert!(matches!(
        result,
        Err(ExtractError::Transport(LlmError::Http { ref message, .. })) if message == "connection reset"
    ));
    assert!(states.is_empty());
}

#[tokio::test]
async fn test_stream_open_error_propagates() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_stream_error(LlmError::Auth("bad key".into()));

    let (result, _) = run(&extractor(&mock), &city_request()).await;

    assert!(matches!(
        result,
        Err(ExtractError::Transport(LlmError::Auth(_)))
    ));
}

#[tokio::test]
async fn test_blank_instructions_rejected() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    let request = ExtractRequest::new("   ", vec![Parameter::string("city")]);

    let (result, _) = run(&extractor(&mock), &request).await;

    assert!(matches!(result, Err(ExtractError::InvalidRequest(_))));
    assert!(mock.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_request_pins_single_extract_tool() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[r#"{"city": "Kyoto"}"#]);
    let request = ExtractRequest {
        forwarded: ForwardedParams {
            temperature: Some(0.0),
            max_tokens: Some(200),
            timeout: Some(Duration::from_secs(5)),
            extra_headers: None,
        },
        ..city_request()
    };

    extractor(&mock).extract(&request).await.unwrap();

    let calls = mock.recorded_calls();
    assert_eq!(calls.len(), 1);
    let params = &calls[0];
    let tools = params.tools.as_ref().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "extract");
    assert_eq!(tools[0].description, "extract the city");
    assert_eq!(tools[0].parameters.as_value()["required"], json!(["city"]));
    assert_eq!(
        params.tool_choice,
        Some(ToolChoice::Specific("extract".into()))
    );
    assert_eq!(params.metadata[REQUEST_TYPE_KEY], "Task");
    assert_eq!(params.temperature, Some(0.0));
    assert_eq!(params.max_tokens, Some(200));
    assert_eq!(params.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn test_history_excluded_unless_requested() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    let provider: Arc<dyn DynProvider> = mock.clone();
    let history: Arc<dyn HistorySource> =
        Arc::new(sample_history(&[("I live in Lyon", "Noted")]));
    let extractor =
        StreamingExtractor::new(ExtractionContext::new(provider).with_history(history));

    let without = extractor.build_params(&city_request()).unwrap();
    assert_eq!(without.messages.len(), 2);
    assert!(
        without
            .messages
            .iter()
            .all(|m| m.text() != Some("I live in Lyon"))
    );

    let request = ExtractRequest {
        include: IncludeOptions {
            readable: false,
            messages: true,
        },
        ..city_request()
    };
    let with = extractor.build_params(&request).unwrap();
    assert_eq!(with.messages.len(), 4);
    assert_eq!(with.messages[0].role, ChatRole::System);
    assert_eq!(with.messages[1].role, ChatRole::User);
    assert_eq!(with.messages[2].text(), Some("I live in Lyon"));
}

#[test]
fn test_system_message_carries_data_and_readable_context() {
    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    let provider: Arc<dyn DynProvider> = mock.clone();
    let registry = Arc::new(ReadableRegistry::new());
    registry.add(Readable::new("Current user", "Ada"));
    let extractor = StreamingExtractor::new(ExtractionContext::new(provider).with_readable(registry));

    let request = ExtractRequest {
        data: Some(json!({"ticket": 7})),
        include: IncludeOptions {
            readable: true,
            messages: false,
        },
        ..city_request()
    };
    let params = extractor.build_params(&request).unwrap();
    let system = params.messages[0].text().unwrap();
    assert!(system.contains("{\"ticket\":7}\n\n1. Current user: Ada"));

    let user = params.messages[1].text().unwrap();
    assert!(user.contains("```\nextract the city\n```"));

    let hidden = extractor.build_params(&city_request()).unwrap();
    assert!(!hidden.messages[0].text().unwrap().contains("Current user"));
}

#[tokio::test]
async fn test_extract_as_typed() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Trip {
        city: String,
        nights: u32,
    }

    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[r#"{"city": "Nice", "nights": 3}"#]);
    let request = ExtractRequest::new(
        "plan the trip",
        vec![
            Parameter::string("city"),
            Parameter::new("nights", ParameterType::Number),
        ],
    );

    let trip: Trip = extractor(&mock).extract_as(&request, |_| {}).await.unwrap();
    assert_eq!(
        trip,
        Trip {
            city: "Nice".into(),
            nights: 3
        }
    );
}

#[tokio::test]
async fn test_extract_as_deserialize_error() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        nights: u32,
    }

    let mock = Arc::new(MockProvider::with_tools("mock", "test-model"));
    mock.queue_extract(&[r#"{"city": "Nice"}"#]);

    let result: Result<Strict, _> = extractor(&mock).extract_as(&city_request(), |_| {}).await;
    assert!(matches!(result, Err(ExtractError::Deserialize(_))));
}
