use std::collections::VecDeque;
use std::pin::Pin;

use anyhow::Result;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

/// Decoded completion-stream item, provider framing stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A text fragment of the reply.
    Delta(String),
    /// The provider finished the completion.
    Done { finish_reason: Option<String> },
}

// Wire shape of one `data:` payload from an OpenAI-compatible
// chat-completions stream. Only the fields we consume.

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Decode an SSE byte stream into [`StreamEvent`]s.
///
/// Chunk boundaries are arbitrary, so bytes are buffered and split on
/// newlines; `data: [DONE]` is the end-of-stream sentinel.
pub fn decode_sse<S, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(byte_stream);
        let mut buffer = VecDeque::with_capacity(8192);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        let Ok(line_str) = std::str::from_utf8(&line_bytes) else {
                            continue;
                        };
                        let line = line_str.trim();
                        if line.is_empty() {
                            continue;
                        }

                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                yield Ok(StreamEvent::Done { finish_reason: None });
                                return;
                            }

                            match serde_json::from_str::<ChatStreamChunk>(data) {
                                Ok(chunk) => {
                                    for event in chunk_events(chunk) {
                                        yield Ok(event);
                                    }
                                }
                                Err(e) => {
                                    yield Err(anyhow::anyhow!("Failed to parse stream chunk: {}", e));
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    return;
                }
            }
        }
    })
}

fn chunk_events(chunk: ChatStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(StreamEvent::Delta(content));
        }

        if let Some(finish_reason) = choice.finish_reason {
            events.push(StreamEvent::Done {
                finish_reason: Some(finish_reason),
            });
        }
    }

    events
}
