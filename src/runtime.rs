//! Runtime for driving the conversation state machine
//!
//! [`OrchestratorRuntime`] owns the only mutable copy of the orchestrator
//! state and runs on a single task. [`OrchestratorHandle`] is the cloneable
//! front door: it sends commands and observes published snapshots.

mod executor;


pub use executor::OrchestratorRuntime;

use crate::config::{OrchestratorConfig, Preferences};
use crate::session::SessionStore;
use crate::state_machine::{Event, Snapshot};
use crate::transport::Transport;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

/// Errors returned by [`OrchestratorHandle`] commands
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Orchestrator runtime has stopped")]
    RuntimeStopped,
}

/// Handle to interact with a running orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<Snapshot>,
    snapshot_rx: watch::Receiver<Snapshot>,
}

impl OrchestratorHandle {
    async fn send(&self, event: Event) -> Result<(), HandleError> {
        self.command_tx
            .send(event)
            .await
            .map_err(|_| HandleError::RuntimeStopped)
    }

    /// Submit a prompt. Blank text is ignored; so is a prompt while another
    /// one is in flight.
    pub async fn send_prompt(&self, text: impl Into<String>) -> Result<(), HandleError> {
        self.send(Event::SendPrompt { text: text.into() }).await
    }

    /// Cancel the active prompt, if any
    pub async fn stop_generating(&self) -> Result<(), HandleError> {
        self.send(Event::StopGenerating).await
    }

    /// Drop the conversation and start over with a freshly fetched model
    pub async fn reset(&self) -> Result<(), HandleError> {
        self.send(Event::Reset).await
    }

    pub async fn refresh_active_model(&self) -> Result<(), HandleError> {
        self.send(Event::RefreshActiveModel).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.broadcast_tx.subscribe()
    }

    /// Latest state, coalescing intermediate changes
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }
}

/// Build a runtime and spawn it on the current tokio runtime.
///
/// The runtime stops once every handle has been dropped.
pub fn spawn_orchestrator<T, P>(
    transport: Arc<T>,
    preferences: P,
    session: SessionStore,
    config: &OrchestratorConfig,
) -> OrchestratorHandle
where
    T: Transport + ?Sized + 'static,
    P: Preferences + 'static,
{
    let (runtime, handle) = OrchestratorRuntime::new(transport, preferences, session, config);
    tokio::spawn(runtime.run());
    handle
}
