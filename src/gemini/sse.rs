//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! Converts the raw byte stream of a `streamGenerateContent?alt=sse` call into
//! parsed [`GenerateContentResponse`] chunks.  Bytes are buffered until a full
//! event arrives, so multi-byte characters split across network chunks decode
//! correctly.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::types::{ErrorDetail, GenerateContentResponse};
use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Error { error: ErrorDetail },
    Response(GenerateContentResponse),
}

/// Process a stream of bytes into a stream of response chunks.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some(event) = split_event(&mut buffer) {
                    match parse_event(&event) {
                        Some(item) => return Some((item, (stream, buffer, false))),
                        None => continue,
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (stream, buffer, true))),
                    None => {
                        let rest = std::mem::take(&mut buffer);
                        return parse_event(&rest).map(|item| (item, (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Removes the first complete event from `buffer`, without its delimiter.
fn split_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, len) = find_delimiter(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + len);
    Some(event)
}

fn find_delimiter(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let tail = &buffer[i..];
        if tail.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if tail.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

/// Parses one event.  Events without data, and the `[DONE]` marker, yield `None`.
fn parse_event(event: &[u8]) -> Option<Result<GenerateContentResponse>> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if data.is_empty() {
        return None;
    }
    let data = data.join("\n");
    if data.trim() == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<Payload>(&data) {
        Ok(Payload::Response(response)) => Some(Ok(response)),
        Ok(Payload::Error { error }) => {
            let message = error
                .message
                .unwrap_or_else(|| "stream reported an error".to_string());
            Some(Err(Error::api(
                error.code.unwrap_or(500),
                error.status,
                message,
            )))
        }
        Err(e) => Some(Err(Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        ))),
    }
}
