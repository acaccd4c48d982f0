//! Common types exchanged with the remote chat service

use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_complete: bool,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            is_complete: true,
        }
    }
}

/// A conversation as the service knows it.
///
/// `messages` is oldest first and never reordered; the id of the last
/// message anchors the next prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            title: None,
            model: None,
            messages,
        }
    }

    /// Id of the last message, used to thread the next prompt
    pub fn anchor_id(&self) -> Option<&str> {
        self.messages.last().map(|m| m.id.as_str())
    }
}

/// The remote model backing new conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveModel {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ActiveModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }
}

/// A prompt submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// `None` only when the conversation has no messages yet
    pub previous_message_id: Option<String>,
    pub input_text: String,
    pub web_search_enabled: bool,
}

/// Full current rendering of the assistant message being generated.
///
/// Each snapshot replaces the previous one; it is never a diff.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageSnapshot {
    /// Empty until the service has assigned an id
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub is_complete: bool,
    /// Service-side progress text (e.g. web search status)
    #[serde(default)]
    pub status: Option<String>,
}

impl MessageSnapshot {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
