//! Logging wrapper for transports

use super::{ActiveModel, Conversation, PromptRequest, SnapshotStream, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Instant;

/// Logs every transport call with its duration and outcome
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

fn log_outcome<V>(operation: &'static str, start: Instant, result: &Result<V, TransportError>) {
    let duration = start.elapsed();
    match result {
        Ok(_) => {
            tracing::debug!(
                operation,
                duration_ms = %duration.as_millis(),
                "Transport call completed"
            );
        }
        Err(e) => {
            tracing::warn!(
                operation,
                duration_ms = %duration.as_millis(),
                error = %e,
                "Transport call failed"
            );
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn create_conversation(
        &self,
        model: &ActiveModel,
    ) -> Result<Conversation, TransportError> {
        let start = Instant::now();
        let result = self.inner.create_conversation(model).await;
        log_outcome("create_conversation", start, &result);
        if let Ok(conv) = &result {
            tracing::info!(conv_id = %conv.id, model = %model.id, "Conversation created");
        }
        result
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, TransportError> {
        let start = Instant::now();
        let result = self.inner.get_conversation(id).await;
        log_outcome("get_conversation", start, &result);
        result
    }

    async fn get_active_model(&self) -> Result<ActiveModel, TransportError> {
        let start = Instant::now();
        let result = self.inner.get_active_model().await;
        log_outcome("get_active_model", start, &result);
        result
    }

    async fn open_prompt_stream(
        &self,
        conversation_id: &str,
        request: &PromptRequest,
    ) -> Result<SnapshotStream, TransportError> {
        tracing::debug!(
            conv_id = %conversation_id,
            anchor = ?request.previous_message_id,
            web_search = request.web_search_enabled,
            "Opening prompt stream"
        );
        let start = Instant::now();
        let result = self.inner.open_prompt_stream(conversation_id, request).await;
        log_outcome("open_prompt_stream", start, &result);
        result
    }
}
