//! Turning stream events into observer states.

use serde::{Deserialize, Serialize};

use crate::message::MessageAccumulator;
use crate::stream::StreamEvent;

use super::{ArgumentMap, EXTRACT_ACTION};

/// An observation of the `extract` call's arguments.
///
/// A successful extraction reports exactly one `Initial`, then any number
/// of `InProgress`, then exactly one `Complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "args", rename_all = "camelCase")]
pub enum StreamState {
    /// The first arguments seen.
    Initial(ArgumentMap),
    /// Arguments changed while the response was still streaming.
    InProgress(ArgumentMap),
    /// The final arguments. They satisfy the parameter schema.
    Complete(ArgumentMap),
}

impl StreamState {
    /// The arguments carried by this state.
    pub fn arguments(&self) -> &ArgumentMap {
        match self {
            Self::Initial(a) | Self::InProgress(a) | Self::Complete(a) => a,
        }
    }

    /// Whether this is the terminal state.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Reduces stream events to observer states.
///
/// The newest decoded arguments are held back until a different decoding
/// arrives, so the last one can be reported as `Complete` once the
/// stream ends. Events that leave the arguments unchanged produce nothing.
///
/// ```rust
/// use llm_extract::extract::{ExtractionReducer, StreamState};
/// use llm_extract::StreamEvent;
///
/// let mut reducer = ExtractionReducer::new();
/// let start = StreamEvent::ToolCallStart { index: 0, id: "c1".into(), name: "extract".into() };
/// let first = StreamEvent::ToolCallDelta { index: 0, json_chunk: r#"{"city": "San"#.into() };
/// let second = StreamEvent::ToolCallDelta { index: 0, json_chunk: r#" Jose"}"#.into() };
///
/// assert_eq!(reducer.push(&start), None);
/// assert_eq!(reducer.push(&first), None);
/// assert!(matches!(reducer.push(&second), Some(StreamState::Initial(_))));
///
/// let (last, initial_reported) = reducer.finish().unwrap();
/// assert_eq!(last["city"], "San Jose");
/// assert!(initial_reported);
/// ```
#[derive(Debug, Default)]
pub struct ExtractionReducer {
    accumulator: MessageAccumulator,
    pending: Option<ArgumentMap>,
    initial_reported: bool,
}

impl ExtractionReducer {
    /// A reducer that has seen nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event in, returning a state ready to report, if any.
    pub fn push(&mut self, event: &StreamEvent) -> Option<StreamState> {
        self.accumulator.apply(event);
        let action = self.accumulator.latest_action(EXTRACT_ACTION)?;
        if self.pending.as_ref() == Some(&action.arguments) {
            return None;
        }
        let previous = self.pending.replace(action.arguments.clone())?;
        Some(self.label(previous))
    }

    /// Whether an `extract` call has been seen.
    pub fn has_call(&self) -> bool {
        self.pending.is_some()
    }

    /// Consumes the reducer at stream end.
    ///
    /// Returns the final arguments and whether `Initial` has already been
    /// reported, or `None` if no `extract` call was seen.
    pub fn finish(self) -> Option<(ArgumentMap, bool)> {
        self.pending.map(|args| (args, self.initial_reported))
    }

    fn label(&mut self, arguments: ArgumentMap) -> StreamState {
        if self.initial_reported {
            StreamState::InProgress(arguments)
        } else {
            self.initial_reported = true;
            StreamState::Initial(arguments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{StopReason, ToolCall};
    use crate::usage::Usage;
    use serde_json::json;

    fn start() -> StreamEvent {
        StreamEvent::ToolCallStart {
            index: 0,
            id: "c1".into(),
            name: EXTRACT_ACTION.into(),
        }
    }

    fn delta(chunk: &str) -> StreamEvent {
        StreamEvent::ToolCallDelta {
            index: 0,
            json_chunk: chunk.into(),
        }
    }

    fn map(v: serde_json::Value) -> ArgumentMap {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_nothing_before_a_call() {
        let mut r = ExtractionReducer::new();
        assert_eq!(r.push(&StreamEvent::TextDelta("thinking".into())), None);
        assert_eq!(r.push(&start()), None);
        assert!(!r.has_call());
        assert!(r.finish().is_none());
    }

    #[test]
    fn test_single_decoding_is_held_until_finish() {
        let mut r = ExtractionReducer::new();
        r.push(&start());
        assert_eq!(r.push(&delta(r#"{"a": 1}"#)), None);
        assert!(r.has_call());
        let (args, initial_reported) = r.finish().unwrap();
        assert_eq!(args, map(json!({"a": 1})));
        assert!(!initial_reported);
    }

    #[test]
    fn test_initial_then_in_progress() {
        let mut r = ExtractionReducer::new();
        r.push(&start());
        let states: Vec<StreamState> = [r#"{"a": "x"#, "y", "z", r#""}"#]
            .iter()
            .filter_map(|c| r.push(&delta(c)))
            .collect();
        assert_eq!(
            states,
            vec![
                StreamState::Initial(map(json!({"a": "x"}))),
                StreamState::InProgress(map(json!({"a": "xy"}))),
            ]
        );
        let (args, initial_reported) = r.finish().unwrap();
        assert_eq!(args, map(json!({"a": "xyz"})));
        assert!(initial_reported);
    }

    #[test]
    fn test_unchanged_events_are_coalesced() {
        let mut r = ExtractionReducer::new();
        r.push(&start());
        r.push(&delta(r#"{"a": 1}"#));
        assert_eq!(r.push(&StreamEvent::Usage(Usage::default())), None);
        assert_eq!(
            r.push(&StreamEvent::ToolCallComplete {
                index: 0,
                call: ToolCall {
                    id: "c1".into(),
                    name: EXTRACT_ACTION.into(),
                    arguments: json!({"a": 1}),
                },
            }),
            None
        );
        assert_eq!(
            r.push(&StreamEvent::Done {
                stop_reason: StopReason::ToolUse
            }),
            None
        );
        let (_, initial_reported) = r.finish().unwrap();
        assert!(!initial_reported);
    }

    #[test]
    fn test_other_functions_are_ignored() {
        let mut r = ExtractionReducer::new();
        r.push(&StreamEvent::ToolCallStart {
            index: 0,
            id: "c0".into(),
            name: "lookup".into(),
        });
        r.push(&delta(r#"{"q": "x"}"#));
        assert!(!r.has_call());
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let s = StreamState::InProgress(map(json!({"a": 1})));
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"status": "inProgress", "args": {"a": 1}})
        );
        assert!(!s.is_complete());
        assert_eq!(s.arguments()["a"], 1);
    }
}
