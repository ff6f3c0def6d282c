//! Cancellable background tasks.
//!
//! Heartbeats, the discovery sweep, and channel listeners all run as a
//! [`BackgroundTask`]. Stopping a task cancels its token and then joins it,
//! so once [`BackgroundTask::stop`] returns the task can no longer touch the
//! store. Dropping a task cancels it without joining.
//!
//! Message handlers and agent watchers are fed through a [`CallbackQueue`],
//! one per consumer, so each consumer sees items in arrival order.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::HandlerResult;

/// Smallest period accepted by [`BackgroundTask::periodic`].
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle on a spawned task that owns a cancellation token.
#[derive(Debug)]
pub(crate) struct BackgroundTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawns `body` with a fresh cancellation token.
    pub(crate) fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(body(token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Spawns a loop that runs `tick` once per `period`.
    ///
    /// The first tick happens one full period after spawning. The loop ends
    /// when the task is cancelled or `tick` returns [`ControlFlow::Break`].
    pub(crate) fn periodic<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let effective = period.max(MIN_PERIOD);
        Self::spawn(move |token| async move {
            let mut ticker = interval_at(Instant::now() + effective, effective);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tick().await.is_break() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Returns `true` once the task body has returned.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancels the task and waits for it to finish.
    pub(crate) async fn stop(mut self) {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = handle.await {
            if err.is_panic() {
                warn!(error = %err, "background task panicked");
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Ordered delivery queue in front of one application callback.
///
/// Items are handed to the callback one at a time in push order. Each call
/// runs on its own task, so a failure or panic is logged against `owner` and
/// the queue moves on to the next item. Pushing never waits. Dropping the
/// queue cancels its worker; a call already in flight runs to completion.
#[derive(Debug)]
pub(crate) struct CallbackQueue<T> {
    sender: mpsc::UnboundedSender<T>,
    worker: BackgroundTask,
}

impl<T: Send + 'static> CallbackQueue<T> {
    /// Starts a worker that feeds queued items to `callback`.
    pub(crate) fn spawn<F, Fut>(kind: &'static str, owner: String, callback: F) -> Self
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<T>();
        let worker = BackgroundTask::spawn(move |token| async move {
            loop {
                let item = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(item) => item,
                        None => break,
                    },
                };
                let call = tokio::spawn(callback(item));
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    outcome = call => report(kind, &owner, outcome),
                }
            }
            debug!(kind, %owner, "callback queue stopped");
        });
        Self { sender, worker }
    }

    /// Queues `item` behind everything pushed earlier. Returns `false` once
    /// the worker has stopped.
    pub(crate) fn push(&self, item: T) -> bool {
        self.sender.send(item).is_ok()
    }

    /// Cancels the worker and waits for it to finish.
    pub(crate) async fn stop(self) {
        self.worker.stop().await;
    }
}

fn report(kind: &'static str, owner: &str, outcome: Result<HandlerResult, JoinError>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(kind, %owner, error = %err, "callback failed"),
        Err(err) if err.is_panic() => warn!(kind, %owner, "callback panicked"),
        Err(_) => debug!(kind, %owner, "callback cancelled"),
    }
}
