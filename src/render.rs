//! Terminal rendering of chat messages and streamed replies.
//!
//! The controller hands the renderer a snapshot of the AI message each time
//! it grows; [`PlainTextRenderer`] prints only the part not yet on screen.

use std::io::{self, Stdout, Write};

use crate::types::{Message, Part, Sender};

/// ANSI escape code for dim text (timestamps, info lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for yellow text (attachments).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (errors).
const ANSI_RED: &str = "\x1b[31m";

/// Display name of the assistant.
pub const ASSISTANT_NAME: &str = "Densé AI";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a complete message.
    fn print_message(&mut self, message: &Message);

    /// Called when a reply is requested, before any text arrives.
    fn start_reply(&mut self);

    /// Called with the reply as it stands after each received fragment.
    fn update_reply(&mut self, message: &Message);

    /// Called when the reply is complete or abandoned.
    fn finish_reply(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

impl Renderer for () {
    fn print_message(&mut self, _: &Message) {}
    fn start_reply(&mut self) {}
    fn update_reply(&mut self, _: &Message) {}
    fn finish_reply(&mut self) {}
    fn print_error(&mut self, _: &str) {}
    fn print_info(&mut self, _: &str) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    reply_id: Option<String>,
    printed: String,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            reply_id: None,
            printed: String::new(),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn header(&self, message: &Message) -> String {
        let (label, style) = match message.sender {
            Sender::User => ("You", ANSI_GREEN),
            Sender::Ai => (ASSISTANT_NAME, ANSI_CYAN),
        };
        let clock = crate::utils::time::clock(&message.timestamp);
        format!(
            "{} {}\n",
            self.styled(style, &format!("[{label}]")),
            self.styled(ANSI_DIM, &clock)
        )
    }

    fn attachments(&self, message: &Message) -> String {
        message
            .parts
            .iter()
            .filter_map(Part::as_inline_data)
            .map(|data| {
                self.styled(
                    ANSI_YELLOW,
                    &format!("[file: {} ({})]\n", data.file_name, data.mime_type),
                )
            })
            .collect()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &Message) {
        let mut text = self.header(message);
        text.push_str(&self.attachments(message));
        let body = message.text();
        if !body.is_empty() {
            text.push_str(&body);
            text.push('\n');
        }
        self.write(&text);
    }

    fn start_reply(&mut self) {
        self.reply_id = None;
        self.printed.clear();
        let waiting = self.styled(ANSI_DIM, "...");
        self.write(&format!("{waiting}\r"));
    }

    fn update_reply(&mut self, message: &Message) {
        let text = message.text();
        if self.reply_id.as_deref() != Some(message.id.as_str()) {
            let header = self.header(message);
            self.write(&format!("   \r{header}"));
            self.reply_id = Some(message.id.clone());
            self.printed.clear();
        }
        match text.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                let suffix = suffix.to_string();
                self.write(&suffix);
            }
            None => {
                self.write(&format!("\n{text}"));
            }
        }
        self.printed = text;
    }

    fn finish_reply(&mut self) {
        if self.reply_id.take().is_some() {
            self.write("\n");
        } else {
            self.write("   \r");
        }
        self.printed.clear();
    }

    fn print_error(&mut self, error: &str) {
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write(&format!("{line}\n"));
    }

    fn print_info(&mut self, info: &str) {
        self.write(&format!("{info}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reply(text: &str) -> Message {
        let mut message = Message::ai_text("ai", text);
        message.id = "ai-1".to_string();
        message.timestamp = datetime!(2024-01-01 09:30:00 UTC);
        message
    }

    fn output(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn streamed_reply_prints_only_new_text() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.start_reply();
        renderer.update_reply(&reply("Hel"));
        renderer.update_reply(&reply("Hello"));
        renderer.update_reply(&reply("Hello!"));
        renderer.finish_reply();
        let out = output(renderer);
        assert!(out.ends_with("[Densé AI] 09:30:00\nHello!\n"));
        assert_eq!(out.matches("Hel").count(), 1);
    }

    #[test]
    fn user_message_lists_attachments() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut message = Message::user(vec![
            Part::text("see this"),
            Part::inline_data("image/png", "AAAA", "cat.png"),
        ]);
        message.timestamp = datetime!(2024-01-01 09:30:00 UTC);
        renderer.print_message(&message);
        assert_eq!(
            output(renderer),
            "[You] 09:30:00\n[file: cat.png (image/png)]\nsee this\n"
        );
    }

    #[test]
    fn colored_error() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.print_error("boom");
        assert_eq!(output(renderer), format!("{ANSI_RED}Error: boom{ANSI_RESET}\n"));
    }
}
