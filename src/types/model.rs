use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The model variants a chat session can select.
///
/// Both variants run on the same provider model; they differ only in whether
/// the provider's "thinking" phase is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportedModel {
    /// Reasoning variant with thinking enabled at the provider default budget.
    #[default]
    DenseAiReasoner,

    /// Low-latency variant with thinking disabled.
    DenseAiChat,
}

impl SupportedModel {
    /// All selectable variants, in menu order.
    pub const ALL: [SupportedModel; 2] = [SupportedModel::DenseAiReasoner, SupportedModel::DenseAiChat];

    /// The identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedModel::DenseAiReasoner => "dense-ai-reasoner",
            SupportedModel::DenseAiChat => "dense-ai-chat",
        }
    }

    /// A human-friendly label.
    pub fn display_name(&self) -> &'static str {
        match self {
            SupportedModel::DenseAiReasoner => "Dense AI Reasoner",
            SupportedModel::DenseAiChat => "Dense AI Chat",
        }
    }

    /// Thinking budget to request from the provider.
    ///
    /// `None` leaves the provider default (thinking enabled); `Some(0)` disables it.
    pub fn thinking_budget(&self) -> Option<u32> {
        match self {
            SupportedModel::DenseAiReasoner => None,
            SupportedModel::DenseAiChat => Some(0),
        }
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SupportedModel {
    type Err = String;

    /// Accepts the wire identifier or the short names `reasoner` and `chat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense-ai-reasoner" | "reasoner" => Ok(SupportedModel::DenseAiReasoner),
            "dense-ai-chat" | "chat" => Ok(SupportedModel::DenseAiChat),
            other => Err(format!(
                "unknown model '{other}' (expected reasoner or chat)"
            )),
        }
    }
}
