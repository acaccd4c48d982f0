//! Stream aggregator: one prompt submission, start to finish
//!
//! Turns a transport snapshot stream into numbered [`StreamUpdate`]s and
//! exposes cooperative cancellation through a [`StreamHandle`].

use crate::error::{classify, ErrorState, Operation};
use crate::transport::{MessageSnapshot, PromptRequest, Transport};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const UPDATE_BUFFER: usize = 32;

/// Identity of one aggregator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Output of a running aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Full message so far; `seq` starts at 1 and strictly increases
    Delta { seq: u64, snapshot: MessageSnapshot },
    /// Terminal: the service finished the reply
    Completed,
    /// Terminal: the submission failed
    Failed(ErrorState),
}

/// Cancels a started aggregator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: StreamId,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Stop the stream. No update is yielded afterwards; calling it again or
    /// after completion does nothing.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(stream = %self.id, "Cancelling prompt stream");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A single prompt submission. Consumed by [`StreamAggregator::start`], so
/// each instance runs at most once.
#[derive(Debug)]
pub struct StreamAggregator {
    id: StreamId,
    cancel: CancellationToken,
}

impl StreamAggregator {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            id: self.id,
            cancel: self.cancel.clone(),
        }
    }

    /// Open the prompt stream in a background task and return its updates.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T>(
        self,
        transport: Arc<T>,
        conversation_id: String,
        request: PromptRequest,
    ) -> DeltaStream
    where
        T: Transport + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let cancel = self.cancel.clone();
        let id = self.id;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(stream = %id, "Prompt stream closed by cancellation");
                }
                () = pump(id, transport.as_ref(), &conversation_id, &request, &tx) => {}
            }
        });

        DeltaStream {
            id,
            cancel: self.cancel,
            inner: ReceiverStream::new(rx),
        }
    }
}

/// Forward transport snapshots as numbered updates until a terminal update
async fn pump<T: Transport + ?Sized>(
    id: StreamId,
    transport: &T,
    conversation_id: &str,
    request: &PromptRequest,
    tx: &mpsc::Sender<StreamUpdate>,
) {
    let mut snapshots = match transport.open_prompt_stream(conversation_id, request).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(stream = %id, error = %e, "Failed to open prompt stream");
            let _ = tx
                .send(StreamUpdate::Failed(classify(&e, Operation::Stream)))
                .await;
            return;
        }
    };

    let mut seq = 0;
    while let Some(item) = snapshots.next().await {
        match item {
            Ok(snapshot) => {
                seq += 1;
                if tx.send(StreamUpdate::Delta { seq, snapshot }).await.is_err() {
                    // Consumer went away
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(stream = %id, seq, error = %e, "Prompt stream failed");
                let _ = tx
                    .send(StreamUpdate::Failed(classify(&e, Operation::Stream)))
                    .await;
                return;
            }
        }
    }

    tracing::info!(stream = %id, deltas = seq, "Prompt stream completed");
    let _ = tx.send(StreamUpdate::Completed).await;
}

/// Updates of a started aggregator. Ends as soon as it is cancelled, even if
/// updates are still buffered.
pub struct DeltaStream {
    id: StreamId,
    cancel: CancellationToken,
    inner: ReceiverStream<StreamUpdate>,
}

impl DeltaStream {
    pub fn id(&self) -> StreamId {
        self.id
    }
}

impl Stream for DeltaStream {
    type Item = StreamUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
