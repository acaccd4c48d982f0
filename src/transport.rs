//! Transport contract to the remote chat service
//!
//! The wire protocol lives behind [`Transport`]; this crate only consumes it.

mod logging;
mod types;

pub use logging::LoggingTransport;
pub use types::*;

use crate::error::TransportError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Incremental snapshots of the assistant message. Dropping the stream
/// closes the underlying channel.
pub type SnapshotStream = BoxStream<'static, Result<MessageSnapshot, TransportError>>;

/// Remote chat service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create an empty conversation backed by `model`
    async fn create_conversation(&self, model: &ActiveModel)
        -> Result<Conversation, TransportError>;

    /// Fetch the authoritative copy of a conversation
    async fn get_conversation(&self, id: &str) -> Result<Conversation, TransportError>;

    /// Fetch the model new conversations should use
    async fn get_active_model(&self) -> Result<ActiveModel, TransportError>;

    /// Submit a prompt and stream the assistant's reply
    async fn open_prompt_stream(
        &self,
        conversation_id: &str,
        request: &PromptRequest,
    ) -> Result<SnapshotStream, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn create_conversation(
        &self,
        model: &ActiveModel,
    ) -> Result<Conversation, TransportError> {
        (**self).create_conversation(model).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, TransportError> {
        (**self).get_conversation(id).await
    }

    async fn get_active_model(&self) -> Result<ActiveModel, TransportError> {
        (**self).get_active_model().await
    }

    async fn open_prompt_stream(
        &self,
        conversation_id: &str,
        request: &PromptRequest,
    ) -> Result<SnapshotStream, TransportError> {
        (**self).open_prompt_stream(conversation_id, request).await
    }
}
