//! Channel listeners running on duplicated connections.

use std::future::Future;

use tracing::{debug, warn};

use crate::background::BackgroundTask;
use crate::store::ports::{StoreConnection, StoreResult, Subscription};

/// A subscription loop that owns its own store connection.
///
/// The listener duplicates the command connection it is given, subscribes
/// the duplicate, and feeds every payload to a callback. Stopping the
/// listener joins the loop and closes the duplicate.
pub(crate) struct ChannelListener<S: StoreConnection> {
    channel: String,
    connection: S,
    task: BackgroundTask,
}

impl<S: StoreConnection> ChannelListener<S> {
    /// Subscribes a duplicate of `commands` to `channel`.
    ///
    /// Each payload is awaited through `on_payload` before the next one is
    /// read, so payloads from one publisher are handled in publish order.
    ///
    /// # Errors
    ///
    /// Returns the store error when duplication or subscription fails. A
    /// duplicate that was opened is closed again before returning.
    pub(crate) async fn spawn<F, Fut>(
        commands: &S,
        channel: String,
        on_payload: F,
    ) -> StoreResult<Self>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let connection = commands.duplicate().await?;
        let mut subscription = match connection.subscribe(&channel).await {
            Ok(subscription) => subscription,
            Err(err) => {
                if let Err(close_err) = connection.close().await {
                    warn!(%channel, error = %close_err, "failed to close listener connection");
                }
                return Err(err);
            }
        };
        debug!(%channel, "listening");
        let task = BackgroundTask::spawn(move |token| async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    payload = subscription.next_payload() => match payload {
                        Some(payload) => on_payload(payload).await,
                        None => break,
                    },
                }
            }
            debug!(channel = subscription.channel(), "listener stopped");
        });
        Ok(Self {
            channel,
            connection,
            task,
        })
    }

    /// Returns the channel this listener is subscribed to.
    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    /// Stops the loop and closes the listener's connection.
    ///
    /// # Errors
    ///
    /// Returns the store error reported while closing the connection.
    pub(crate) async fn stop(self) -> StoreResult<()> {
        self.task.stop().await;
        self.connection.close().await
    }
}
