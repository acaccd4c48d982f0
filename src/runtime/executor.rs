//! Orchestrator runtime executor

use super::OrchestratorHandle;
use crate::config::{OrchestratorConfig, Preferences};
use crate::error::TransportError;
use crate::session::SessionStore;
use crate::state_machine::{
    transition, ConversationState, Effect, Event, OrchestratorState, RequestId, Snapshot,
    TransitionError,
};
use crate::stream::{StreamAggregator, StreamHandle, StreamId, StreamUpdate};
use crate::transport::{PromptRequest, Transport};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// An outstanding transport request and the token that abandons it
struct PendingRequest {
    id: RequestId,
    cancel: CancellationToken,
}

impl PendingRequest {
    fn cancel(self) {
        self.cancel.cancel();
    }
}

/// Owns the orchestrator state and executes the effects of each transition.
///
/// Commands from handles and results from background transport tasks arrive
/// on channels and are processed one at a time, so no two mutations of the
/// state ever interleave.
pub struct OrchestratorRuntime<T, P>
where
    T: Transport + ?Sized + 'static,
    P: Preferences + 'static,
{
    state: OrchestratorState,
    transport: Arc<T>,
    preferences: P,
    session: SessionStore,
    command_rx: mpsc::Receiver<Event>,
    internal_tx: mpsc::Sender<Event>,
    internal_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<Snapshot>,
    snapshot_tx: watch::Sender<Snapshot>,
    /// The single active stream aggregator
    stream: Option<StreamHandle>,
    model_fetch: Option<PendingRequest>,
    create: Option<PendingRequest>,
    refresh: Option<PendingRequest>,
}

impl<T, P> OrchestratorRuntime<T, P>
where
    T: Transport + ?Sized + 'static,
    P: Preferences + 'static,
{
    pub fn new(
        transport: Arc<T>,
        preferences: P,
        session: SessionStore,
        config: &OrchestratorConfig,
    ) -> (Self, OrchestratorHandle) {
        let state = OrchestratorState::new();
        let (command_tx, command_rx) = mpsc::channel(config.event_buffer);
        let (internal_tx, internal_rx) = mpsc::channel(config.event_buffer);
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

        let handle = OrchestratorHandle {
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            snapshot_rx,
        };

        let runtime = Self {
            state,
            transport,
            preferences,
            session,
            command_rx,
            internal_tx,
            internal_rx,
            broadcast_tx,
            snapshot_tx,
            stream: None,
            model_fetch: None,
            create: None,
            refresh: None,
        };

        (runtime, handle)
    }

    pub async fn run(mut self) {
        tracing::info!("Starting conversation orchestrator");

        // The model is fetched once on startup
        self.process_event(Event::RefreshActiveModel);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(event) => self.process_event(event),
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => self.process_event(event),
            }
        }

        self.shutdown();
        tracing::info!("Conversation orchestrator stopped");
    }

    fn process_event(&mut self, event: Event) {
        let name = event.name();
        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(e) => {
                match e {
                    TransitionError::Stale(_) => tracing::trace!(event = name, "{e}"),
                    TransitionError::EmptyPrompt | TransitionError::Busy => {
                        tracing::debug!(event = name, reason = %e, "Command ignored");
                    }
                }
                return;
            }
        };

        let old_phase = self.state.phase;
        self.state = result.new_state;

        if old_phase != self.state.phase {
            tracing::debug!(event = name, from = %old_phase, to = %self.state.phase, "State changed");
            if let (ConversationState::Error, Some(error)) = (self.state.phase, &self.state.error) {
                tracing::warn!(kind = ?error.kind, detail = %error.detail, "Conversation error");
            }
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        self.publish();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchActiveModel { request } => {
                let transport = Arc::clone(&self.transport);
                let pending = self.spawn_request(
                    request,
                    async move { transport.get_active_model().await },
                    move |result| Event::ActiveModelFetched { request, result },
                );
                replace(&mut self.model_fetch, pending);
            }

            Effect::CreateConversation { request, model } => {
                let transport = Arc::clone(&self.transport);
                let pending = self.spawn_request(
                    request,
                    async move { transport.create_conversation(&model).await },
                    move |result| Event::ConversationCreated { request, result },
                );
                replace(&mut self.create, pending);
            }

            Effect::FetchConversation {
                request,
                conversation_id,
            } => {
                let transport = Arc::clone(&self.transport);
                let pending = self.spawn_request(
                    request,
                    async move { transport.get_conversation(&conversation_id).await },
                    move |result| Event::ConversationRefreshed { request, result },
                );
                replace(&mut self.refresh, pending);
            }

            Effect::StartStream {
                stream,
                conversation_id,
                previous_message_id,
                input,
            } => {
                let request = PromptRequest {
                    previous_message_id,
                    input_text: input,
                    web_search_enabled: self.preferences.web_search_enabled(),
                };
                self.start_stream(stream, conversation_id, request);
            }

            Effect::CancelStream { stream } => {
                if let Some(handle) = self.stream.take_if(|h| h.id() == stream) {
                    handle.cancel();
                }
            }

            Effect::CancelRequest { request } => {
                for slot in [&mut self.model_fetch, &mut self.create, &mut self.refresh] {
                    if let Some(pending) = slot.take_if(|p| p.id == request) {
                        pending.cancel();
                    }
                }
            }

            Effect::PublishSession { conversation_id } => {
                tracing::debug!(conv_id = %conversation_id, "Publishing current conversation");
                self.session.set_current_conversation(&conversation_id);
            }
        }
    }

    /// Run a transport call in the background and report its result as an
    /// event, unless cancelled first
    fn spawn_request<F, V, M>(&self, id: RequestId, call: F, into_event: M) -> PendingRequest
    where
        F: Future<Output = Result<V, TransportError>> + Send + 'static,
        V: Send + 'static,
        M: FnOnce(Result<V, TransportError>) -> Event + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(request = %id, "Transport request abandoned");
                    return;
                }
                result = call => result,
            };
            let _ = tx.send(into_event(result)).await;
        });

        PendingRequest { id, cancel }
    }

    fn start_stream(&mut self, id: StreamId, conversation_id: String, request: PromptRequest) {
        tracing::info!(
            conv_id = %conversation_id,
            stream = %id,
            web_search = request.web_search_enabled,
            "Submitting prompt"
        );

        let aggregator = StreamAggregator::new(id);
        let handle = aggregator.handle();
        let mut updates = aggregator.start(Arc::clone(&self.transport), conversation_id, request);
        if let Some(previous) = self.stream.replace(handle) {
            previous.cancel();
        }

        // Tag each update with the stream's identity and hand it to the
        // event loop
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                let event = match update {
                    StreamUpdate::Delta { seq, snapshot } => Event::StreamDelta {
                        stream: id,
                        seq,
                        snapshot,
                    },
                    StreamUpdate::Completed => Event::StreamCompleted { stream: id },
                    StreamUpdate::Failed(error) => Event::StreamFailed { stream: id, error },
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Notify observers if anything they can see has changed
    fn publish(&self) {
        let snapshot = self.state.snapshot();
        if *self.snapshot_tx.borrow() == snapshot {
            return;
        }
        self.snapshot_tx.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.broadcast_tx.send(snapshot);
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.stream.take() {
            handle.cancel();
        }
        for slot in [&mut self.model_fetch, &mut self.create, &mut self.refresh] {
            if let Some(pending) = slot.take() {
                pending.cancel();
            }
        }
    }
}

/// Store a new pending request, abandoning the one it replaces
fn replace(slot: &mut Option<PendingRequest>, pending: PendingRequest) {
    if let Some(previous) = slot.replace(pending) {
        previous.cancel();
    }
}
