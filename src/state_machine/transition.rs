//! Pure state transition function
//!
//! Every state change of the orchestrator goes through [`transition`]. It
//! performs no I/O; side effects are returned as [`Effect`]s for the runtime
//! to execute.

use super::state::{ActiveStream, ConversationState, OrchestratorState, PendingCreate};
use super::{Effect, Event};
use crate::error::{classify, ErrorState, Operation};
use crate::stream::StreamId;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: OrchestratorState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: OrchestratorState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events rejected without changing anything. None of these are surfaced
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("A prompt is already in flight")]
    Busy,
    #[error("Stale {0} ignored")]
    Stale(&'static str),
}

/// Pure transition function
pub fn transition(
    state: &OrchestratorState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut next = state.clone();

    let effects = match event {
        // ============================================================
        // User commands
        // ============================================================
        Event::SendPrompt { text } => send_prompt(&mut next, &text)?,

        Event::StopGenerating => stop_generating(&mut next),

        Event::Reset => reset(&mut next),

        Event::RefreshActiveModel => refresh_active_model(&mut next),

        // ============================================================
        // Transport results
        // ============================================================
        Event::ActiveModelFetched { request, result } => {
            if next.in_flight.model_fetch != Some(request) {
                return Err(TransitionError::Stale("active model"));
            }
            next.in_flight.model_fetch = None;
            match result {
                Ok(model) => {
                    next.active_model = Some(model);
                    if next.phase == ConversationState::None {
                        next.phase = ConversationState::Empty;
                        next.error = None;
                    }
                    vec![]
                }
                Err(e) => fail(&mut next, classify(&e, Operation::FetchActiveModel)),
            }
        }

        Event::ConversationCreated { request, result } => {
            let pending = match next.in_flight.create.take() {
                Some(pending) if pending.request == request => pending,
                _ => return Err(TransitionError::Stale("conversation creation")),
            };
            match result {
                Ok(conversation) => {
                    let conversation_id = conversation.id.clone();
                    let anchor = conversation.anchor_id().map(str::to_string);
                    next.conversation = Some(conversation);

                    let mut effects = vec![Effect::publish_session(conversation_id.clone())];
                    effects.extend(start_stream(
                        &mut next,
                        conversation_id,
                        anchor,
                        pending.prompt,
                    ));
                    effects
                }
                Err(e) => fail(&mut next, classify(&e, Operation::CreateConversation)),
            }
        }

        Event::ConversationRefreshed { request, result } => {
            if next.in_flight.refresh != Some(request) {
                return Err(TransitionError::Stale("conversation refresh"));
            }
            next.in_flight.refresh = None;
            match result {
                Ok(conversation) => {
                    // Replaced wholesale, never merged
                    let effect = Effect::publish_session(conversation.id.clone());
                    next.conversation = Some(conversation);
                    vec![effect]
                }
                Err(e) => fail(&mut next, classify(&e, Operation::RefreshConversation)),
            }
        }

        // ============================================================
        // Stream aggregator output
        // ============================================================
        Event::StreamDelta {
            stream,
            seq,
            snapshot,
        } => {
            let Some(active) = next.in_flight.stream.as_mut().filter(|s| s.id == stream) else {
                return Err(TransitionError::Stale("stream delta"));
            };
            if seq <= active.last_seq {
                return Err(TransitionError::Stale("out-of-order delta"));
            }
            let first = active.last_seq == 0;
            active.last_seq = seq;
            next.message = Some(snapshot);

            // The server has assigned real message ids once the first delta
            // arrives; later deltas only touch the message row.
            if first {
                refresh_conversation(&mut next)
            } else {
                vec![]
            }
        }

        Event::StreamCompleted { stream } => {
            take_stream(&mut next, stream)?;
            next.phase = ConversationState::Loaded;
            next.is_interacting = false;
            next.error = None;
            if let Some(message) = next.message.as_mut() {
                message.is_complete = true;
            }
            vec![Effect::CancelStream { stream }]
        }

        Event::StreamFailed { stream, error } => {
            if next.in_flight.stream.map(|s| s.id) != Some(stream) {
                return Err(TransitionError::Stale("stream failure"));
            }
            fail(&mut next, error)
        }
    };

    Ok(TransitionResult::new(next).with_effects(effects))
}

fn send_prompt(state: &mut OrchestratorState, text: &str) -> Result<Vec<Effect>, TransitionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TransitionError::EmptyPrompt);
    }
    if state.is_busy() {
        return Err(TransitionError::Busy);
    }

    if let Some(conversation) = &state.conversation {
        let conversation_id = conversation.id.clone();
        let anchor = conversation.anchor_id().map(str::to_string);
        return Ok(start_stream(state, conversation_id, anchor, text.to_string()));
    }

    let Some(model) = state.active_model.clone() else {
        return Ok(fail(state, ErrorState::no_active_model()));
    };

    let request = state.allocate_request();
    state.in_flight.create = Some(PendingCreate {
        request,
        prompt: text.to_string(),
    });
    state.phase = ConversationState::Loaded;
    state.error = None;
    Ok(vec![Effect::CreateConversation { request, model }])
}

fn start_stream(
    state: &mut OrchestratorState,
    conversation_id: String,
    previous_message_id: Option<String>,
    input: String,
) -> Vec<Effect> {
    let stream = state.allocate_stream();
    state.in_flight.stream = Some(ActiveStream {
        id: stream,
        last_seq: 0,
    });
    state.phase = ConversationState::Generating;
    state.is_interacting = true;
    state.error = None;
    state.message = None;

    vec![Effect::StartStream {
        stream,
        conversation_id,
        previous_message_id,
        input,
    }]
}

fn refresh_conversation(state: &mut OrchestratorState) -> Vec<Effect> {
    let Some(conversation_id) = state.conversation.as_ref().map(|c| c.id.clone()) else {
        return vec![];
    };
    let mut effects = Vec::new();
    if let Some(previous) = state.in_flight.refresh.take() {
        effects.push(Effect::CancelRequest { request: previous });
    }
    let request = state.allocate_request();
    state.in_flight.refresh = Some(request);
    effects.push(Effect::FetchConversation {
        request,
        conversation_id,
    });
    effects
}

fn stop_generating(state: &mut OrchestratorState) -> Vec<Effect> {
    let effects = cancel_prompt_work(state);
    if effects.is_empty() {
        // Nothing in flight
        return effects;
    }
    // A creation abandoned before it returned leaves no conversation to show
    state.phase = if state.conversation.is_some() {
        ConversationState::Loaded
    } else {
        ConversationState::Empty
    };
    state.error = None;
    state.is_interacting = false;
    effects
}

fn reset(state: &mut OrchestratorState) -> Vec<Effect> {
    let mut effects = cancel_prompt_work(state);
    state.conversation = None;
    state.message = None;
    state.error = None;
    state.is_interacting = false;
    state.phase = ConversationState::Empty;
    effects.push(Effect::clear_session());
    effects.extend(refresh_active_model(state));
    effects
}

fn refresh_active_model(state: &mut OrchestratorState) -> Vec<Effect> {
    let mut effects = Vec::new();
    if let Some(previous) = state.in_flight.model_fetch.take() {
        effects.push(Effect::CancelRequest { request: previous });
    }
    let request = state.allocate_request();
    state.in_flight.model_fetch = Some(request);
    effects.push(Effect::FetchActiveModel { request });
    effects
}

/// Enter the error state, dropping every prompt-related operation
fn fail(state: &mut OrchestratorState, error: ErrorState) -> Vec<Effect> {
    let effects = cancel_prompt_work(state);
    state.phase = ConversationState::Error;
    state.error = Some(error);
    state.is_interacting = false;
    effects
}

/// Cancel the active stream, pending creation and pending refresh
fn cancel_prompt_work(state: &mut OrchestratorState) -> Vec<Effect> {
    let mut effects = Vec::new();
    if let Some(stream) = state.in_flight.stream.take() {
        effects.push(Effect::CancelStream { stream: stream.id });
    }
    if let Some(pending) = state.in_flight.create.take() {
        effects.push(Effect::CancelRequest {
            request: pending.request,
        });
    }
    if let Some(request) = state.in_flight.refresh.take() {
        effects.push(Effect::CancelRequest { request });
    }
    effects
}

fn take_stream(state: &mut OrchestratorState, stream: StreamId) -> Result<(), TransitionError> {
    match state.in_flight.stream {
        Some(active) if active.id == stream => {
            state.in_flight.stream = None;
            Ok(())
        }
        _ => Err(TransitionError::Stale("stream completion")),
    }
}
