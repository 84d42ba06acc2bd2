//! Server-sent events to [`StreamEvent`]s.
//!
//! [`SseDecoder`] is a push parser: each network read goes in, the events
//! it completes come out. It copes with events and UTF-8 sequences split
//! across reads, skips bytes that can never decode, and reassembles
//! function calls from their argument fragments. Calls still open when
//! the body ends are flushed as complete.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use llm_extract::chat::ToolCall;
use llm_extract::error::LlmError;
use llm_extract::stream::{ChatStream, StreamEvent};
use serde_json::{Map, Value};

use crate::convert;
use crate::types::{ApiError, Chunk};

/// Upper bound for undecoded bytes and unterminated event text.
const MAX_BUF: usize = 16 * 1024 * 1024;

type Decoded = Result<StreamEvent, LlmError>;

#[derive(Debug)]
struct OpenCall {
    id: String,
    name: String,
    arguments: String,
}

impl OpenCall {
    fn close(self) -> ToolCall {
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&self.arguments).unwrap_or_else(|e| {
                tracing::warn!(call = %self.name, error = %e, "call arguments are not valid JSON");
                Value::Null
            })
        };
        ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

#[derive(Debug, Default)]
struct SseDecoder {
    /// Bytes not yet decoded, at most one incomplete UTF-8 sequence once
    /// [`decode_pending`](Self::decode_pending) has run.
    bytes: Vec<u8>,
    /// Decoded text not yet terminated by a blank line.
    text: String,
    open: BTreeMap<u32, OpenCall>,
    /// Set after the first error; nothing is emitted afterwards.
    failed: bool,
}

impl SseDecoder {
    fn feed(&mut self, read: &[u8]) -> Vec<Decoded> {
        if self.failed {
            return Vec::new();
        }
        self.bytes.extend_from_slice(read);
        if self.bytes.len() > MAX_BUF || self.text.len() > MAX_BUF {
            return vec![self.fail(LlmError::ResponseFormat {
                message: format!("SSE event exceeds {} MiB", MAX_BUF >> 20),
                raw: String::new(),
            })];
        }
        self.decode_pending();
        self.complete_events()
    }

    /// Body ended: decode what is left and close every open call.
    fn finish(&mut self) -> Vec<Decoded> {
        if self.failed {
            return Vec::new();
        }
        self.decode_pending();
        if !self.bytes.is_empty() {
            tracing::debug!(bytes = self.bytes.len(), "body ended inside a UTF-8 sequence");
            self.bytes.clear();
        }
        let mut out = self.complete_events();
        let tail = std::mem::take(&mut self.text);
        if !self.failed && !tail.trim().is_empty() {
            out.extend(self.event(&tail));
        }
        if !self.failed {
            out.extend(self.close_calls().into_iter().map(Ok));
        }
        out
    }

    fn fail(&mut self, err: LlmError) -> Decoded {
        self.failed = true;
        self.bytes.clear();
        self.text.clear();
        self.open.clear();
        Err(err)
    }

    /// Move decodable bytes into `text`. Invalid bytes are dropped and
    /// decoding resumes after them; an incomplete trailing sequence waits
    /// for the next read.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.bytes) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.bytes.clear();
                    return;
                }
                Err(e) => {
                    let good = e.valid_up_to();
                    if let Ok(prefix) = std::str::from_utf8(&self.bytes[..good]) {
                        self.text.push_str(prefix);
                    }
                    let Some(bad) = e.error_len() else {
                        self.bytes.drain(..good);
                        return;
                    };
                    tracing::debug!(bytes = bad, "dropping invalid UTF-8 in event stream");
                    self.bytes.drain(..good + bad);
                }
            }
        }
    }

    /// Parse every blank-line terminated event in `text`.
    fn complete_events(&mut self) -> Vec<Decoded> {
        let mut out = Vec::new();
        while let Some(end) = self.text.find("\n\n") {
            let raw: String = self.text.drain(..end + 2).collect();
            out.extend(self.event(&raw));
            if self.failed {
                break;
            }
        }
        out
    }

    fn event(&mut self, raw: &str) -> Vec<Decoded> {
        let Some(data) = data_field(raw) else {
            return Vec::new();
        };
        if data == "[DONE]" {
            return self.close_calls().into_iter().map(Ok).collect();
        }
        if let Ok(api) = serde_json::from_str::<ApiError>(data) {
            return vec![self.fail(convert::in_stream_error(api))];
        }
        match serde_json::from_str::<Chunk>(data) {
            Ok(chunk) => self.chunk(chunk).into_iter().map(Ok).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized SSE payload");
                Vec::new()
            }
        }
    }

    fn chunk(&mut self, chunk: Chunk) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            let delta = choice.delta;
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                out.push(StreamEvent::TextDelta(text));
            }

            for fragment in delta.tool_calls {
                let index = fragment.index;
                if let Some(id) = fragment.id {
                    let name = fragment.function.name.unwrap_or_default();
                    self.open.insert(
                        index,
                        OpenCall {
                            id: id.clone(),
                            name: name.clone(),
                            arguments: String::new(),
                        },
                    );
                    out.push(StreamEvent::ToolCallStart { index, id, name });
                }
                let Some(json_chunk) = fragment.function.arguments.filter(|a| !a.is_empty())
                else {
                    continue;
                };
                match self.open.get_mut(&index) {
                    Some(call) => call.arguments.push_str(&json_chunk),
                    None => tracing::debug!(index, "argument fragment for a call never opened"),
                }
                out.push(StreamEvent::ToolCallDelta { index, json_chunk });
            }

            // A pinned function finishes with "stop" rather than
            // "tool_calls", so every finish closes open calls.
            if let Some(reason) = choice.finish_reason {
                out.extend(self.close_calls());
                out.push(StreamEvent::Done {
                    stop_reason: convert::stop_reason(&reason),
                });
            }
        }

        if let Some(usage) = &chunk.usage {
            out.push(StreamEvent::Usage(convert::usage(usage)));
        }
        out
    }

    /// `ToolCallComplete` for each open call, lowest index first.
    fn close_calls(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.open)
            .into_iter()
            .map(|(index, call)| StreamEvent::ToolCallComplete {
                index,
                call: call.close(),
            })
            .collect()
    }
}

/// Decode a successful streaming response.
pub(crate) fn into_stream(response: reqwest::Response) -> ChatStream {
    let mut decoder = SseDecoder::default();
    let reads = response
        .bytes_stream()
        .map(Some)
        .chain(stream::once(async { None }));

    Box::pin(reads.flat_map(move |read| {
        let decoded = match read {
            Some(Ok(bytes)) => decoder.feed(&bytes),
            Some(Err(e)) if !decoder.failed => vec![decoder.fail(LlmError::Http {
                status: None,
                message: format!("reading event stream: {e}"),
                retryable: true,
            })],
            Some(Err(_)) => Vec::new(),
            None => decoder.finish(),
        };
        stream::iter(decoded)
    }))
}

/// Payload of the first `data:` line of an event.
fn data_field(raw: &str) -> Option<&str> {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
}
