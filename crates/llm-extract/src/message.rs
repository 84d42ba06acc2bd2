//! Folding stream events into response messages.
//!
//! A streaming response is a flat sequence of [`StreamEvent`]s. The
//! [`MessageAccumulator`] turns it into the list of messages the
//! response contains so far: text messages and action executions
//! (function calls), each carrying the best decoding of its arguments
//! at this point in the stream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::ArgumentMap;
use crate::partial_json::parse_partial_object;
use crate::stream::StreamEvent;

/// A message produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseMessage {
    /// Plain assistant text.
    Text {
        /// Text received so far.
        content: String,
    },
    /// An invocation of a declared function.
    ActionExecution(ActionExecutionMessage),
}

/// A function call and its (possibly partial) arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionMessage {
    /// Provider-assigned call id.
    pub id: String,
    /// Name of the function being called.
    pub name: String,
    /// Decoded arguments.
    pub arguments: ArgumentMap,
    /// Whether the provider has delivered the whole call.
    pub complete: bool,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    raw: String,
    /// Index into `messages` once the call is visible.
    position: Option<usize>,
}

/// Incrementally converts stream events into [`ResponseMessage`]s.
///
/// A call becomes visible as a message once its first argument bytes
/// decode, or when it completes, whichever comes first.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    messages: Vec<ResponseMessage>,
    calls: HashMap<u32, PendingCall>,
}

impl MessageAccumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the message list.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => self.push_text(text),
            StreamEvent::ToolCallStart { index, id, name } => {
                let call = self.calls.entry(*index).or_default();
                call.id.clone_from(id);
                call.name.clone_from(name);
                if let Some(pos) = call.position {
                    if let Some(ResponseMessage::ActionExecution(msg)) = self.messages.get_mut(pos)
                    {
                        msg.id.clone_from(id);
                        msg.name.clone_from(name);
                    }
                }
            }
            StreamEvent::ToolCallDelta { index, json_chunk } => {
                let call = self.calls.entry(*index).or_default();
                call.raw.push_str(json_chunk);
                let Some(arguments) = parse_partial_object(&call.raw) else {
                    return;
                };
                match call.position {
                    Some(pos) => {
                        if let Some(ResponseMessage::ActionExecution(msg)) =
                            self.messages.get_mut(pos)
                        {
                            msg.arguments = arguments;
                        }
                    }
                    None => {
                        call.position = Some(self.messages.len());
                        self.messages
                            .push(ResponseMessage::ActionExecution(ActionExecutionMessage {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                arguments,
                                complete: false,
                            }));
                    }
                }
            }
            StreamEvent::ToolCallComplete { index, call: done } => {
                let call = self.calls.entry(*index).or_default();
                call.id.clone_from(&done.id);
                call.name.clone_from(&done.name);
                let position = *call.position.get_or_insert(self.messages.len());
                if position == self.messages.len() {
                    self.messages
                        .push(ResponseMessage::ActionExecution(ActionExecutionMessage {
                            id: String::new(),
                            name: String::new(),
                            arguments: ArgumentMap::new(),
                            complete: false,
                        }));
                }
                if let Some(ResponseMessage::ActionExecution(msg)) = self.messages.get_mut(position)
                {
                    msg.id.clone_from(&done.id);
                    msg.name.clone_from(&done.name);
                    if let Value::Object(arguments) = &done.arguments {
                        msg.arguments.clone_from(arguments);
                    }
                    msg.complete = true;
                }
            }
            StreamEvent::Usage(_) | StreamEvent::Done { .. } => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(ResponseMessage::Text { content }) = self.messages.last_mut() {
            content.push_str(text);
        } else {
            self.messages.push(ResponseMessage::Text {
                content: text.to_owned(),
            });
        }
    }

    /// The most recent visible action execution named `name`.
    pub fn latest_action(&self, name: &str) -> Option<&ActionExecutionMessage> {
        self.messages.iter().rev().find_map(|m| match m {
            ResponseMessage::ActionExecution(msg) if msg.name == name => Some(msg),
            _ => None,
        })
    }

    /// Messages visible so far, in arrival order.
    pub fn messages(&self) -> &[ResponseMessage] {
        &self.messages
    }

    /// Consumes the accumulator, returning its messages.
    pub fn into_messages(self) -> Vec<ResponseMessage> {
        self.messages
    }
}
