//! Streaming client for the Gemini API.

mod accumulating_stream;
mod chat;
mod client;
mod sse;
pub mod types;

pub use accumulating_stream::AccumulatingStream;
pub use chat::{GeminiChat, GeminiFactory};
pub use client::{API_KEY_ENV, DEFAULT_MODEL, Gemini, ResponseStream};
pub use sse::process_sse;
