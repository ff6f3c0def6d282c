//! Callbacks receiving envelopes from the broker.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;

use crate::broker::domain::MessageEnvelope;
use crate::error::HandlerResult;

/// Local consumer of envelopes seen on the message channel.
///
/// Handlers receive every envelope, whatever its target, and filter for
/// themselves (see [`MessageEnvelope::is_addressed_to`]). Deliveries reach
/// a handler one at a time, in channel order. A failing handler is logged
/// and not retried.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one envelope.
    async fn handle(&self, envelope: MessageEnvelope) -> HandlerResult;
}

/// Handler backed by an async closure.
pub struct FnHandler<F>(F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wraps an async closure as a [`MessageHandler`].
pub fn handler_fn<F, Fut>(callback: F) -> FnHandler<F>
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler(callback)
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, envelope: MessageEnvelope) -> HandlerResult {
        (self.0)(envelope).await
    }
}
