//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::error::{ErrorKind, ErrorState, TransportError};
use crate::stream::StreamId;
use crate::transport::{ActiveModel, Conversation, Message, MessageSnapshot, Role};
use proptest::prelude::*;

// ============================================================================
// Actions
// ============================================================================

/// Abstract inputs, resolved against the current state so that transport
/// results usually match what is in flight.
#[derive(Debug, Clone)]
enum Action {
    Send(String),
    Stop,
    Reset,
    RefreshModel,
    ResolveModel(bool),
    ResolveCreate(bool),
    ResolveRefresh(bool),
    Delta(u64),
    Complete,
    Fail(ErrorKind),
    ForeignDelta,
}

const UNKNOWN_REQUEST: u64 = u64::MAX;

fn conversation(id: &str) -> Conversation {
    Conversation::new(id, vec![Message::new(format!("{id}-m1"), Role::System, "")])
}

fn to_event(state: &OrchestratorState, action: Action) -> Event {
    let request_or_unknown = |id: Option<RequestId>| id.unwrap_or(RequestId::new(UNKNOWN_REQUEST));
    let stream_or_unknown = state
        .in_flight
        .stream
        .map_or(StreamId::new(UNKNOWN_REQUEST), |s| s.id);

    match action {
        Action::Send(text) => Event::SendPrompt { text },
        Action::Stop => Event::StopGenerating,
        Action::Reset => Event::Reset,
        Action::RefreshModel => Event::RefreshActiveModel,
        Action::ResolveModel(ok) => Event::ActiveModelFetched {
            request: request_or_unknown(state.in_flight.model_fetch),
            result: if ok {
                Ok(ActiveModel::new("model"))
            } else {
                Err(TransportError::Timeout("slow".into()))
            },
        },
        Action::ResolveCreate(ok) => Event::ConversationCreated {
            request: request_or_unknown(state.in_flight.create.as_ref().map(|p| p.request)),
            result: if ok {
                Ok(conversation("created"))
            } else {
                Err(TransportError::Other("nope".into()))
            },
        },
        Action::ResolveRefresh(ok) => Event::ConversationRefreshed {
            request: request_or_unknown(state.in_flight.refresh),
            result: if ok {
                Ok(conversation("created"))
            } else {
                Err(TransportError::Closed)
            },
        },
        Action::Delta(seq) => Event::StreamDelta {
            stream: stream_or_unknown,
            seq,
            snapshot: MessageSnapshot::text(seq.to_string()),
        },
        Action::Complete => Event::StreamCompleted {
            stream: stream_or_unknown,
        },
        Action::Fail(kind) => Event::StreamFailed {
            stream: stream_or_unknown,
            error: ErrorState::new(kind, "failed"),
        },
        Action::ForeignDelta => Event::StreamDelta {
            stream: StreamId::new(UNKNOWN_REQUEST - 1),
            seq: 1,
            snapshot: MessageSnapshot::text("foreign"),
        },
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![
        Just(ErrorKind::RateLimited),
        Just(ErrorKind::Connectivity),
        Just(ErrorKind::Generic),
    ]
}

fn arb_prompt() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{1,20}",
        "[ \t\n]{0,5}",
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        arb_prompt().prop_map(Action::Send),
        Just(Action::Stop),
        Just(Action::Reset),
        Just(Action::RefreshModel),
        any::<bool>().prop_map(Action::ResolveModel),
        any::<bool>().prop_map(Action::ResolveCreate),
        any::<bool>().prop_map(Action::ResolveRefresh),
        (1u64..10).prop_map(Action::Delta),
        Just(Action::Complete),
        arb_error_kind().prop_map(Action::Fail),
        Just(Action::ForeignDelta),
    ]
}

fn arb_actions() -> impl Strategy<Value = Vec<Action>> {
    proptest::collection::vec(arb_action(), 0..30)
}

/// Apply actions, skipping rejected ones
fn run(actions: Vec<Action>) -> OrchestratorState {
    let mut state = OrchestratorState::new();
    for action in actions {
        let event = to_event(&state, action);
        if let Ok(result) = transition(&state, event) {
            state = result.new_state;
        }
    }
    state
}

fn check_invariants(state: &OrchestratorState) -> Result<(), String> {
    let streaming = state.in_flight.stream.is_some();
    if (state.phase == ConversationState::Generating) != streaming {
        return Err(format!("phase {} with stream {streaming}", state.phase));
    }
    if state.is_interacting != streaming {
        return Err(format!("is_interacting {} with stream {streaming}", state.is_interacting));
    }
    if (state.phase == ConversationState::Error) != state.error.is_some() {
        return Err(format!("phase {} with error {:?}", state.phase, state.error));
    }
    if state.in_flight.create.is_some()
        && (state.phase != ConversationState::Loaded || state.conversation.is_some())
    {
        return Err(format!("pending creation in phase {}", state.phase));
    }
    if streaming && state.conversation.is_none() {
        return Err("streaming without a conversation".to_string());
    }
    Ok(())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Observable state stays consistent after any accepted event
    #[test]
    fn prop_transitions_preserve_invariants(actions in arb_actions()) {
        let mut state = OrchestratorState::new();
        for action in actions {
            let event = to_event(&state, action);
            if let Ok(result) = transition(&state, event) {
                state = result.new_state;
                if let Err(msg) = check_invariants(&state) {
                    prop_assert!(false, "{}: {:?}", msg, state);
                }
            }
        }
    }

    // Invariant 2: The message row always shows the highest sequence applied
    #[test]
    fn prop_deltas_apply_monotonically(seqs in proptest::collection::vec(1u64..50, 1..40)) {
        let mut state = run(vec![
            Action::RefreshModel,
            Action::ResolveModel(true),
            Action::Send("Hello".into()),
            Action::ResolveCreate(true),
        ]);
        prop_assert_eq!(state.phase, ConversationState::Generating);

        let mut highest = 0;
        for seq in seqs {
            let event = to_event(&state, Action::Delta(seq));
            match transition(&state, event) {
                Ok(result) => {
                    prop_assert!(seq > highest, "applied {} after {}", seq, highest);
                    highest = seq;
                    state = result.new_state;
                }
                Err(e) => {
                    prop_assert!(seq <= highest);
                    prop_assert_eq!(e, TransitionError::Stale("out-of-order delta"));
                }
            }
            let shown = state.message.as_ref().map(|m| m.content.clone());
            prop_assert_eq!(shown, Some(highest.to_string()));
        }
    }

    // Invariant 3: Reset always lands in Empty with a cleared session
    #[test]
    fn prop_reset_always_empty(actions in arb_actions()) {
        let state = run(actions);
        let result = transition(&state, Event::Reset).expect("reset never fails");

        prop_assert_eq!(result.new_state.phase, ConversationState::Empty);
        prop_assert!(result.new_state.conversation.is_none());
        prop_assert!(result.new_state.error.is_none());
        prop_assert!(!result.new_state.is_interacting);
        prop_assert!(!result.new_state.is_busy());
        prop_assert!(result.effects.contains(&Effect::clear_session()));

        let Some(Effect::FetchActiveModel { request }) = result.effects.last().cloned() else {
            return Err(TestCaseError::fail("reset must refetch the model"));
        };
        let fetched = transition(
            &result.new_state,
            Event::ActiveModelFetched { request, result: Ok(ActiveModel::new("m")) },
        )
        .expect("fresh fetch result is accepted");
        prop_assert_eq!(fetched.new_state.phase, ConversationState::Empty);
    }

    // Invariant 4: Blank prompts never change anything
    #[test]
    fn prop_blank_prompt_is_noop(actions in arb_actions(), blank in "[ \t\n\r]{0,8}") {
        let state = run(actions);
        let result = transition(&state, Event::SendPrompt { text: blank });
        prop_assert_eq!(result.unwrap_err(), TransitionError::EmptyPrompt);
    }

    // Invariant 5: Stopping twice is the same as stopping once
    #[test]
    fn prop_stop_is_idempotent(actions in arb_actions()) {
        let state = run(actions);
        let once = transition(&state, Event::StopGenerating).expect("stop never fails");
        prop_assert!(!once.new_state.is_busy());
        prop_assert!(once.new_state.in_flight.refresh.is_none());

        let twice = transition(&once.new_state, Event::StopGenerating).expect("stop never fails");
        prop_assert_eq!(&twice.new_state, &once.new_state);
        prop_assert!(twice.effects.is_empty());
    }

    // Invariant 6: A stream result never applies once its stream is gone
    #[test]
    fn prop_no_delta_after_stop(seq in 1u64..10) {
        let state = run(vec![
            Action::RefreshModel,
            Action::ResolveModel(true),
            Action::Send("Hello".into()),
            Action::ResolveCreate(true),
        ]);
        let stream = state.in_flight.stream.map(|s| s.id).expect("streaming");
        let stopped = transition(&state, Event::StopGenerating).unwrap().new_state;

        let late = transition(
            &stopped,
            Event::StreamDelta { stream, seq, snapshot: MessageSnapshot::text("late") },
        );
        prop_assert!(late.is_err());
        let late = transition(&stopped, Event::StreamCompleted { stream });
        prop_assert!(late.is_err());
    }
}
