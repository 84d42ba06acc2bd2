//! Mapping between `llm-extract` values and the Chat Completions wire
//! format: request bodies going out, stop reasons, usage and errors
//! coming back.

use std::borrow::Cow;

use http::StatusCode;
use llm_extract::chat::{ChatMessage, ChatRole, ContentBlock, StopReason};
use llm_extract::error::LlmError;
use llm_extract::provider::{ChatParams, ToolChoice};
use llm_extract::usage::Usage;
use serde_json::{Value, json};

use crate::config::OpenAiConfig;
use crate::types::{
    ApiError, CalledFunction, ChunkUsage, CompletionRequest, FunctionSpec, FunctionTool,
    UsageOption, WireCall, WireMessage,
};

/// Streaming request body for `params`, always asking for a usage chunk.
pub(crate) fn request_body<'a>(
    params: &'a ChatParams,
    config: &'a OpenAiConfig,
) -> CompletionRequest<'a> {
    let tools = params.tools.as_ref().map(|defs| {
        defs.iter()
            .map(|def| FunctionTool {
                kind: "function",
                function: FunctionSpec {
                    name: &def.name,
                    description: &def.description,
                    parameters: def.parameters.as_value(),
                },
            })
            .collect()
    });

    CompletionRequest {
        model: &config.model,
        messages: params.messages.iter().map(wire_message).collect(),
        temperature: params.temperature,
        max_completion_tokens: params.max_tokens,
        stream: true,
        stream_options: UsageOption {
            include_usage: true,
        },
        tools,
        tool_choice: params.tool_choice.as_ref().map(tool_choice_value),
    }
}

/// Text blocks of a message. A single block is borrowed, several are
/// joined with newlines.
fn text_of(content: &[ContentBlock]) -> Option<Cow<'_, str>> {
    let mut texts = content.iter().filter_map(|block| match block {
        ContentBlock::Text(text) => Some(text.as_str()),
        _ => None,
    });
    let first = texts.next()?;
    let rest: Vec<&str> = texts.collect();
    if rest.is_empty() {
        return Some(Cow::Borrowed(first));
    }
    let mut joined = first.to_owned();
    for text in rest {
        joined.push('\n');
        joined.push_str(text);
    }
    Some(Cow::Owned(joined))
}

fn wire_message(msg: &ChatMessage) -> WireMessage<'_> {
    let text = || text_of(&msg.content).unwrap_or_default();
    match msg.role {
        ChatRole::System => WireMessage::plain("system", text()),
        ChatRole::Assistant => WireMessage {
            role: "assistant",
            content: text_of(&msg.content),
            tool_calls: msg
                .tool_calls()
                .into_iter()
                .map(|call| WireCall {
                    id: &call.id,
                    kind: "function",
                    function: CalledFunction {
                        name: &call.name,
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: None,
        },
        ChatRole::Tool => {
            let result = msg.content.iter().find_map(|block| match block {
                ContentBlock::ToolResult(result) => Some(result),
                _ => None,
            });
            WireMessage {
                tool_call_id: result.map(|r| r.tool_call_id.as_str()),
                ..WireMessage::plain(
                    "tool",
                    result.map_or_else(text, |r| Cow::Borrowed(r.content.as_str())),
                )
            }
        }
        _ => WireMessage::plain("user", text()),
    }
}

/// `auto`, or the object form that pins one function.
fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Specific(name) => json!({
            "type": "function",
            "function": { "name": name }
        }),
        _ => json!("auto"),
    }
}

pub(crate) fn stop_reason(finish_reason: &str) -> StopReason {
    match finish_reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        other => {
            tracing::warn!(finish_reason = other, "unrecognized finish_reason");
            StopReason::EndTurn
        }
    }
}

pub(crate) fn usage(wire: &ChunkUsage) -> Usage {
    Usage {
        input_tokens: wire.prompt_tokens,
        output_tokens: wire.completion_tokens,
        reasoning_tokens: wire
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens),
    }
}

/// Error for a non-2xx response. `body` is used verbatim when it is not
/// an `{"error": ...}` object.
pub(crate) fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiError>(body)
        .map_or_else(|_| body.to_owned(), |api| api.error.message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(message),
        StatusCode::BAD_REQUEST => LlmError::InvalidRequest(message),
        _ => LlmError::Http {
            status: Some(status),
            message,
            retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        },
    }
}

/// Error for an `{"error": ...}` payload received mid-stream.
pub(crate) fn in_stream_error(api: ApiError) -> LlmError {
    let code = match api.error.code {
        Some(Value::String(code)) => Some(code),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
    .or(api.error.kind)
    .unwrap_or_else(|| "stream_error".into());

    LlmError::Provider {
        retryable: matches!(code.as_str(), "rate_limit_exceeded" | "server_error"),
        code,
        message: api.error.message,
    }
}
