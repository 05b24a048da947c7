use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KeepsakeError;

/// Unique identifier for a chat session.
pub type SessionId = Uuid;

/// Unique identifier for a child profile.
pub type ChildId = Uuid;

/// Unique identifier for a short-term memory fragment.
pub type FragmentId = Uuid;

/// Unique identifier for a long-term memory embedding.
pub type EmbeddingId = Uuid;

/// Where a long-term memory originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A message exchanged during a chat session.
    ChatMessage,
    /// A calendar-day entry the child opened.
    CalendarDay,
    /// A memory entered by hand (parent dashboard).
    ManualEntry,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::ChatMessage => "chat_message",
            SourceType::CalendarDay => "calendar_day",
            SourceType::ManualEntry => "manual_entry",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = KeepsakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat_message" => Ok(SourceType::ChatMessage),
            "calendar_day" => Ok(SourceType::CalendarDay),
            "manual_entry" => Ok(SourceType::ManualEntry),
            other => Err(KeepsakeError::validation(
                "source_type",
                format!("unknown value: {other}"),
            )),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
