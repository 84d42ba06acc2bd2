//! Builders for tests of code that uses `llm-extract`.
//!
//! Available with the `test-utils` feature and in this crate's own
//! tests. The centerpiece is [`extract_call_events`], which scripts the
//! events a provider emits for one forced `extract` call.

use crate::chat::{ChatMessage, StopReason, ToolCall};
use crate::extract::EXTRACT_ACTION;
use crate::stream::StreamEvent;
use crate::usage::Usage;

/// Call id used by [`extract_call_events`].
pub const SCRIPTED_CALL_ID: &str = "call_0";

/// A small, fixed [`Usage`] report.
pub fn sample_usage() -> Usage {
    Usage {
        input_tokens: 120,
        output_tokens: 24,
        reasoning_tokens: None,
    }
}

/// Events for one `extract` call at index 0.
///
/// Start, one delta per entry of `chunks`, a completion carrying the
/// parsed concatenation, usage, then a `ToolUse` stop.
///
/// # Panics
///
/// When the concatenated chunks are not valid JSON.
pub fn extract_call_events(chunks: &[&str]) -> Vec<StreamEvent> {
    let arguments = serde_json::from_str(&chunks.concat())
        .unwrap_or_else(|e| panic!("scripted extract arguments are not JSON: {e}"));

    let start = StreamEvent::ToolCallStart {
        index: 0,
        id: SCRIPTED_CALL_ID.into(),
        name: EXTRACT_ACTION.into(),
    };
    let deltas = chunks.iter().map(|chunk| StreamEvent::ToolCallDelta {
        index: 0,
        json_chunk: (*chunk).to_owned(),
    });
    let tail = [
        StreamEvent::ToolCallComplete {
            index: 0,
            call: ToolCall {
                id: SCRIPTED_CALL_ID.into(),
                name: EXTRACT_ACTION.into(),
                arguments,
            },
        },
        StreamEvent::Usage(sample_usage()),
        StreamEvent::Done {
            stop_reason: StopReason::ToolUse,
        },
    ];

    std::iter::once(start).chain(deltas).chain(tail).collect()
}

/// A short conversation to use as extraction history.
pub fn sample_history(turns: &[(&str, &str)]) -> Vec<ChatMessage> {
    turns
        .iter()
        .flat_map(|(user, assistant)| [ChatMessage::user(*user), ChatMessage::assistant(*assistant)])
        .collect()
}
