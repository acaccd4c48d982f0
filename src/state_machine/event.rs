//! Events that drive the orchestrator

use super::state::RequestId;
use crate::error::{ErrorState, TransportError};
use crate::stream::StreamId;
use crate::transport::{ActiveModel, Conversation, MessageSnapshot};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User commands
    SendPrompt {
        text: String,
    },
    StopGenerating,
    Reset,
    RefreshActiveModel,

    // Transport results
    ActiveModelFetched {
        request: RequestId,
        result: Result<ActiveModel, TransportError>,
    },
    ConversationCreated {
        request: RequestId,
        result: Result<Conversation, TransportError>,
    },
    ConversationRefreshed {
        request: RequestId,
        result: Result<Conversation, TransportError>,
    },

    // Stream aggregator output
    StreamDelta {
        stream: StreamId,
        seq: u64,
        snapshot: MessageSnapshot,
    },
    StreamCompleted {
        stream: StreamId,
    },
    StreamFailed {
        stream: StreamId,
        error: ErrorState,
    },
}

impl Event {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::SendPrompt { .. } => "send_prompt",
            Event::StopGenerating => "stop_generating",
            Event::Reset => "reset",
            Event::RefreshActiveModel => "refresh_active_model",
            Event::ActiveModelFetched { .. } => "active_model_fetched",
            Event::ConversationCreated { .. } => "conversation_created",
            Event::ConversationRefreshed { .. } => "conversation_refreshed",
            Event::StreamDelta { .. } => "stream_delta",
            Event::StreamCompleted { .. } => "stream_completed",
            Event::StreamFailed { .. } => "stream_failed",
        }
    }
}
