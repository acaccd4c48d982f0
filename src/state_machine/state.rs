//! Orchestrator state types

use crate::error::ErrorState;
use crate::stream::StreamId;
use crate::transport::{ActiveModel, Conversation, MessageSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Conversation State
// ============================================================================

/// Externally observable phase of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No model known yet
    #[default]
    None,
    /// Model known, no conversation
    Empty,
    /// Conversation present (or being created), nothing generating
    Loaded,
    /// Reserved for collaborators; no transition here enters it
    Loading,
    /// A prompt stream is active
    Generating,
    /// The last operation failed; see the error state
    Error,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::None => "none",
            ConversationState::Empty => "empty",
            ConversationState::Loaded => "loaded",
            ConversationState::Loading => "loading",
            ConversationState::Generating => "generating",
            ConversationState::Error => "error",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// In-flight bookkeeping
// ============================================================================

/// Identity of one transport request (model fetch, creation, refresh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// The prompt stream currently allowed to update the message row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveStream {
    pub id: StreamId,
    /// Highest delta sequence number applied so far, 0 before the first
    pub last_seq: u64,
}

/// Conversation creation waiting to submit its first prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreate {
    pub request: RequestId,
    pub prompt: String,
}

/// At most one outstanding operation per concern.
///
/// Results whose id does not match are stale and get discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InFlight {
    pub stream: Option<ActiveStream>,
    pub model_fetch: Option<RequestId>,
    pub create: Option<PendingCreate>,
    pub refresh: Option<RequestId>,
}

// ============================================================================
// Orchestrator State
// ============================================================================

/// Everything the orchestrator knows. Only the runtime owns a mutable copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrchestratorState {
    pub phase: ConversationState,
    pub conversation: Option<Conversation>,
    /// Assistant message currently (or last) being generated
    pub message: Option<MessageSnapshot>,
    pub error: Option<ErrorState>,
    pub is_interacting: bool,
    pub active_model: Option<ActiveModel>,
    pub in_flight: InFlight,
    next_id: u64,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_request(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId::new(self.next_id)
    }

    pub(crate) fn allocate_stream(&mut self) -> StreamId {
        self.next_id += 1;
        StreamId::new(self.next_id)
    }

    /// Whether a prompt is being submitted or answered
    pub fn is_busy(&self) -> bool {
        self.in_flight.stream.is_some() || self.in_flight.create.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from(self)
    }
}

/// Read-only view published to observers after every change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: ConversationState,
    pub conversation: Option<Conversation>,
    pub message: Option<MessageSnapshot>,
    pub error: Option<ErrorState>,
    pub is_interacting: bool,
    pub active_model: Option<ActiveModel>,
}

impl From<&OrchestratorState> for Snapshot {
    fn from(state: &OrchestratorState) -> Self {
        Self {
            state: state.phase,
            conversation: state.conversation.clone(),
            message: state.message.clone(),
            error: state.error.clone(),
            is_interacting: state.is_interacting,
            active_model: state.active_model.clone(),
        }
    }
}
