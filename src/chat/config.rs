//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the binary runs with.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::storage::{FileStore, LocalStorage};
use crate::transport::MockConfig;

/// Command-line arguments for the densechat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// File that keeps the auth token and preferences between runs.
    #[arrrg(optional, "Preferences file (default: in-memory only)", "PATH")]
    pub store: Option<String>,

    /// Provider model serving both chat variants.
    #[arrrg(optional, "Gemini model (default: gemini-2.5-flash)", "MODEL")]
    pub gemini_model: Option<String>,

    /// Fixed latency of the simulated backend.
    #[arrrg(optional, "Simulated backend latency in ms (default: 200-700)", "MS")]
    pub latency_ms: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for a chat run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Preferences file; `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,

    /// Provider model override.
    pub gemini_model: Option<String>,

    /// Simulated backend settings.
    pub mock: MockConfig,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            store_path: None,
            gemini_model: None,
            mock: MockConfig::default(),
            use_color: true,
        }
    }

    /// Persists preferences at `path`.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Overrides the provider model.
    pub fn with_gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = Some(model.into());
        self
    }

    /// Uses a fixed simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.mock = self.mock.with_latency(latency);
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Opens the configured local storage.
    pub fn storage(&self) -> LocalStorage {
        match &self.store_path {
            Some(path) => LocalStorage::new(Arc::new(FileStore::new(path))),
            None => LocalStorage::in_memory(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let mut config = ChatConfig {
            store_path: args.store.map(PathBuf::from),
            gemini_model: args.gemini_model,
            use_color: !args.no_color,
            ..ChatConfig::new()
        };
        if let Some(ms) = args.latency_ms {
            config = config.with_latency(Duration::from_millis(ms));
        }
        config
    }
}
