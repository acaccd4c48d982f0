//! Conversation orchestration for a streaming chat client.
//!
//! The orchestrator drives a single conversation with a remote chat service:
//! it resolves the active model, creates a conversation on the first prompt,
//! consumes the streamed reply as whole-message snapshots, and surfaces every
//! state change to observers.
//!
//! The pieces:
//!
//! - [`transport`]: the async contract with the remote service
//! - [`stream`]: turns one prompt stream into numbered, cancellable updates
//! - [`error`]: classifies transport failures into user-facing errors
//! - [`state_machine`]: the pure transition function
//! - [`runtime`]: executes effects and publishes [`Snapshot`]s

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod stream;
pub mod transport;

pub use config::{OrchestratorConfig, Preferences, SharedPreferences};
pub use error::{ErrorKind, ErrorState, TransportError};
pub use runtime::{spawn_orchestrator, HandleError, OrchestratorHandle, OrchestratorRuntime};
pub use session::SessionStore;
pub use state_machine::{ConversationState, Snapshot};
pub use transport::{LoggingTransport, Transport};
