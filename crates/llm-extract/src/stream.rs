//! The event stream a provider returns.
//!
//! A [`ChatStream`] is read once, front to back. There is no rewind:
//! after the last item (or after dropping it) the response is gone and
//! only a new request can reproduce it. The extractor relies on this by
//! taking the stream by value and reading one item at a time.
//!
//! Function calls are spread over several events that share an
//! `index`: one [`ToolCallStart`](StreamEvent::ToolCallStart), any
//! number of [`ToolCallDelta`](StreamEvent::ToolCallDelta) argument
//! fragments, and usually a closing
//! [`ToolCallComplete`](StreamEvent::ToolCallComplete).

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::chat::{StopReason, ToolCall};
use crate::error::LlmError;
use crate::usage::Usage;

/// Single-pass response stream. Errors may appear at any position.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// One decoded unit of a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StreamEvent {
    /// Assistant text.
    TextDelta(String),
    /// A function call begins.
    ToolCallStart {
        /// Position of the call within the response.
        index: u32,
        /// Call id chosen by the provider.
        id: String,
        /// Function name.
        name: String,
    },
    /// Raw argument text for the call at `index`, to be appended to
    /// what came before.
    ToolCallDelta {
        /// Position of the call within the response.
        index: u32,
        /// Argument fragment; usually not valid JSON on its own.
        json_chunk: String,
    },
    /// The provider's final view of the call at `index`.
    ToolCallComplete {
        /// Position of the call within the response.
        index: u32,
        /// Id, name and fully parsed arguments.
        call: ToolCall,
    },
    /// Token accounting.
    Usage(Usage),
    /// Generation ended.
    Done {
        /// Reason reported by the provider.
        stop_reason: StopReason,
    },
}

impl StreamEvent {
    /// The function-call index this event belongs to, if any.
    pub fn call_index(&self) -> Option<u32> {
        match self {
            Self::ToolCallStart { index, .. }
            | Self::ToolCallDelta { index, .. }
            | Self::ToolCallComplete { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_call_index() {
        let delta = StreamEvent::ToolCallDelta {
            index: 2,
            json_chunk: "{\"ci".into(),
        };
        assert_eq!(delta.call_index(), Some(2));
        assert_eq!(StreamEvent::TextDelta("hi".into()).call_index(), None);
        assert_eq!(
            StreamEvent::Done {
                stop_reason: StopReason::ToolUse
            }
            .call_index(),
            None
        );
    }

    #[tokio::test]
    async fn test_stream_is_exhausted_after_one_read() {
        let mut stream: ChatStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::ToolCallStart {
                index: 0,
                id: "c1".into(),
                name: "extract".into(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                index: 0,
                json_chunk: "{}".into(),
            }),
        ]));
        let read: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(read.len(), 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_error_item_does_not_end_stream_type() {
        let stream: ChatStream = Box::pin(futures::stream::iter(vec![
            Err(LlmError::Timeout { elapsed_ms: 30 }),
            Ok(StreamEvent::TextDelta("late".into())),
        ]));
        let items: Vec<_> = stream.collect().await;
        assert!(items[0].is_err());
        assert!(items[1].is_ok());
    }

    #[test]
    fn test_events_serialize() {
        let event = StreamEvent::ToolCallDelta {
            index: 0,
            json_chunk: "{\"city\":".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["ToolCallDelta"]["json_chunk"], "{\"city\":");
    }
}
