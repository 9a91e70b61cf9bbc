//! Lifetime-bound background execution for write commands.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::AppError;

type Job = BoxFuture<'static, ()>;

/// Runs submitted operations one at a time, in submission order, until the
/// scope is closed or dropped.
///
/// Closing cancels the operation in flight and discards queued ones; their
/// [`Pending`] handles resolve to [`AppError::Cancelled`].
#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    jobs: mpsc::UnboundedSender<Job>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Scope {
    /// Must be called from within a tokio runtime.
    pub fn new(name: &'static str) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(run_jobs(name, rx, token.clone()));
        tracker.close();

        Self {
            name,
            jobs,
            token,
            tracker,
        }
    }

    /// Queues `operation`. The returned handle may be awaited for the
    /// outcome or dropped; failures are logged either way.
    pub fn launch<T, Fut>(&self, operation: &'static str, fut: Fut) -> Pending<T>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let scope = self.name;
        let job = async move {
            let result = fut.await;
            if let Err(err) = &result {
                warn!(scope, operation, "write failed: {}", err);
            }
            let _ = tx.send(result);
        }
        .boxed();

        if self.jobs.send(job).is_err() {
            debug!(scope, operation, "scope already closed, write discarded");
        }
        Pending { rx }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels outstanding work and waits for the worker to stop.
    pub async fn close(&self) {
        self.token.cancel();
        self.tracker.wait().await;
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_jobs(
    scope: &'static str,
    mut rx: mpsc::UnboundedReceiver<Job>,
    token: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(scope, "write cancelled in flight");
                break;
            }
            _ = job => {}
        }
    }
    debug!(scope, "scope closed");
}

/// Outcome of a launched operation.
#[derive(Debug)]
#[must_use = "drop the handle explicitly to ignore the outcome"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, AppError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, AppError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(AppError::Cancelled)))
    }
}
