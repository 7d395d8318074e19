//! Accumulates streamed text into the chat history while passing fragments through.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;

use super::client::ResponseStream;
use super::types::Content;
use crate::error::Error;
use crate::observability::{STREAM_BYTES, STREAM_DURATION, STREAM_ERRORS, STREAM_EVENTS};

/// A stream wrapper that yields the text of each response chunk and, once the
/// stream drains without error, records the exchange in the shared history.
///
/// Chunks that carry no visible text are skipped.  A failed or abandoned turn
/// leaves the history untouched.
pub struct AccumulatingStream {
    inner: ResponseStream,
    history: Arc<Mutex<Vec<Content>>>,
    user_turn: Option<Content>,
    text: String,
    failed: bool,
    started: Instant,
}

impl AccumulatingStream {
    /// Wraps `inner`; `user_turn` is the content that was sent.
    pub fn new(
        inner: ResponseStream,
        history: Arc<Mutex<Vec<Content>>>,
        user_turn: Content,
    ) -> Self {
        Self {
            inner,
            history,
            user_turn: Some(user_turn),
            text: String::new(),
            failed: false,
            started: Instant::now(),
        }
    }

    /// The text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn finalize(&mut self) {
        let Some(user_turn) = self.user_turn.take() else {
            return;
        };
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
        if self.failed || self.text.is_empty() {
            return;
        }
        match self.history.lock() {
            Ok(mut history) => {
                history.push(user_turn);
                history.push(Content::model(std::mem::take(&mut self.text)));
            }
            Err(_) => tracing::error!("chat history lock poisoned; turn not recorded"),
        }
    }
}

impl Stream for AccumulatingStream {
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(response))) => {
                    let text = response.text();
                    if text.is_empty() {
                        continue;
                    }
                    STREAM_EVENTS.click();
                    STREAM_BYTES.count(text.len() as u64);
                    self.text.push_str(&text);
                    return Poll::Ready(Some(Ok(text)));
                }
                Poll::Ready(Some(Err(e))) => {
                    STREAM_ERRORS.click();
                    self.failed = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.finalize();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::gemini::types::{GenerateContentResponse, Part, Role};
    use futures::StreamExt;
    use futures::stream;

    fn chunk(text: &str) -> Result<GenerateContentResponse> {
        Ok(serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
        .unwrap())
    }

    fn wrap(items: Vec<Result<GenerateContentResponse>>) -> (AccumulatingStream, Arc<Mutex<Vec<Content>>>) {
        let history = Arc::new(Mutex::new(Vec::new()));
        let stream = AccumulatingStream::new(
            Box::pin(stream::iter(items)),
            Arc::clone(&history),
            Content::user(vec![Part::text("hi")]),
        );
        (stream, history)
    }

    #[tokio::test]
    async fn records_turn_on_success() {
        let (stream, history) = wrap(vec![chunk("Hel"), chunk(""), chunk("lo")]);
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Hel", "lo"]);
        let history = history.lock().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Some(Role::User));
        assert_eq!(history[1], Content::model("Hello"));
    }

    #[tokio::test]
    async fn failed_turn_is_not_recorded() {
        let (stream, history) = wrap(vec![
            chunk("partial"),
            Err(Error::streaming("connection reset", None)),
        ]);
        let items: Vec<_> = stream.collect().await;
        assert!(items[1].is_err());
        assert!(history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_not_recorded() {
        let (mut stream, history) = wrap(vec![chunk("")]);
        assert!(stream.next().await.is_none());
        assert_eq!(stream.text(), "");
        assert!(history.lock().unwrap().is_empty());
    }
}
