//! Effects produced by state transitions

use super::state::RequestId;
use crate::stream::StreamId;
use crate::transport::ActiveModel;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the active model
    FetchActiveModel { request: RequestId },

    /// Create a conversation backed by `model`
    CreateConversation {
        request: RequestId,
        model: ActiveModel,
    },

    /// Fetch the authoritative copy of a conversation
    FetchConversation {
        request: RequestId,
        conversation_id: String,
    },

    /// Start a stream aggregator. The web search toggle is read when the
    /// request is built from this effect.
    StartStream {
        stream: StreamId,
        conversation_id: String,
        previous_message_id: Option<String>,
        input: String,
    },

    /// Cancel a stream aggregator (no-op if it already finished)
    CancelStream { stream: StreamId },

    /// Abandon an outstanding transport request
    CancelRequest { request: RequestId },

    /// Write the current conversation id to the session slot
    PublishSession { conversation_id: String },
}

impl Effect {
    pub fn publish_session(conversation_id: impl Into<String>) -> Self {
        Effect::PublishSession {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn clear_session() -> Self {
        Self::publish_session("")
    }
}
