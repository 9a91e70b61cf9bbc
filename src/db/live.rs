//! Observable query results that re-run whenever their table changes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::db::changes::{ChangeNotifier, TableChange};
use crate::error::AppError;

/// What the refresher has published so far. `Err` is only ever published
/// while no result has been delivered.
type Delivery<T> = Option<Result<T, Arc<AppError>>>;

/// Continuously updated result of one query.
///
/// A background refresher delivers the first result shortly after
/// construction and a fresh one after every committed write to the watched
/// table. If the first run fails, that failure is published instead, so
/// [`LiveQuery::current`] can report it; once a result has been delivered,
/// later failures keep it. Dropping the `LiveQuery` stops the refresher.
#[derive(Debug)]
pub struct LiveQuery<T> {
    rx: watch::Receiver<Delivery<T>>,
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(
        table: TableChange,
        changes: &ChangeNotifier,
        shutdown: CancellationToken,
        query: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send,
    {
        let (tx, rx) = watch::channel(None);
        // Subscribe before the first run so no write can slip between the two.
        let mut events = changes.subscribe();

        tokio::spawn(async move {
            if !refresh(&tx, &query, table).await {
                return;
            }
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tx.closed() => break,
                    event = events.recv() => {
                        let mut stale = match event {
                            Ok(changed) => changed == table,
                            Err(RecvError::Lagged(skipped)) => {
                                debug!(?table, skipped, "live query lagged behind writes");
                                true
                            }
                            Err(RecvError::Closed) => break,
                        };
                        // Coalesce whatever else is already queued into this refresh.
                        loop {
                            match events.try_recv() {
                                Ok(changed) => stale |= changed == table,
                                Err(TryRecvError::Lagged(_)) => stale = true,
                                Err(_) => break,
                            }
                        }
                        if stale && !refresh(&tx, &query, table).await {
                            break;
                        }
                    }
                }
            }
            debug!(?table, "live query stopped");
        });

        Self { rx }
    }

    /// Outcome of the first run, or the latest result if one has already
    /// been delivered. `Cancelled` if the query stopped before running.
    pub async fn current(&mut self) -> Result<T, AppError> {
        let delivery = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AppError::Cancelled)?;
        match &*delivery {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(err)) => Err(AppError::Query(err.clone())),
            None => Err(AppError::Cancelled),
        }
    }

    /// Waits for the next result. `None` once the query has stopped.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(Ok(value)) = &*self.rx.borrow_and_update() {
                return Some(value.clone());
            }
        }
    }

    /// Most recent result, if one has been delivered yet.
    pub fn latest(&self) -> Option<T> {
        match &*self.rx.borrow() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Waits until a delivered result satisfies `predicate`, checking the
    /// current one first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let delivery = self
            .rx
            .wait_for(|delivery| match delivery {
                Some(Ok(value)) => predicate(value),
                _ => false,
            })
            .await
            .ok()?;
        match &*delivery {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static {
        WatchStream::new(self.rx).filter_map(|delivery| delivery.and_then(Result::ok))
    }
}

async fn refresh<T, F, Fut>(tx: &watch::Sender<Delivery<T>>, query: &F, table: TableChange) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match query().await {
        Ok(value) => tx.send(Some(Ok(value))).is_ok(),
        Err(err) => {
            let delivered = matches!(*tx.borrow(), Some(Ok(_)));
            if delivered {
                warn!(?table, "live query failed, keeping last result: {}", err);
                !tx.is_closed()
            } else {
                warn!(?table, "live query failed before its first result: {}", err);
                tx.send(Some(Err(Arc::new(err)))).is_ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn counting_query(
        notifier: &ChangeNotifier,
        token: CancellationToken,
    ) -> (LiveQuery<usize>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let live = LiveQuery::spawn(TableChange::Tasks, notifier, token, move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        (live, runs)
    }

    #[tokio::test]
    async fn delivers_initial_result() {
        let notifier = ChangeNotifier::new();
        let (mut live, _) = counting_query(&notifier, CancellationToken::new());
        assert_eq!(live.next().await, Some(1));
        assert_eq!(live.latest(), Some(1));
    }

    #[tokio::test]
    async fn reruns_on_matching_table_only() {
        let notifier = ChangeNotifier::new();
        let (mut live, runs) = counting_query(&notifier, CancellationToken::new());
        assert_eq!(live.next().await, Some(1));

        notifier.notify(&[TableChange::Categories]);
        notifier.notify(&[TableChange::Tasks]);
        assert_eq!(live.next().await, Some(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_the_query_stops_the_refresher() {
        let notifier = ChangeNotifier::new();
        let (mut live, _) = counting_query(&notifier, CancellationToken::new());
        live.next().await;
        assert_eq!(notifier.subscriber_count(), 1);
        drop(live);

        tokio::time::timeout(Duration::from_secs(2), async {
            while notifier.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("refresher did not stop");
    }

    #[tokio::test]
    async fn shutdown_token_ends_the_stream() {
        let notifier = ChangeNotifier::new();
        let token = CancellationToken::new();
        let (mut live, _) = counting_query(&notifier, token.clone());
        assert_eq!(live.next().await, Some(1));
        token.cancel();
        assert_eq!(live.next().await, None);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_result() {
        let notifier = ChangeNotifier::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut live = LiveQuery::spawn(
            TableChange::Tasks,
            &notifier,
            CancellationToken::new(),
            move || {
                let counter = counter.clone();
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        1 => Err(AppError::Storage(sqlx::Error::PoolClosed)),
                        n => Ok(n),
                    }
                }
            },
        );
        assert_eq!(live.next().await, Some(0));

        notifier.notify(&[TableChange::Tasks]);
        tokio::time::timeout(Duration::from_secs(2), async {
            while runs.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("refresh did not run");
        assert_eq!(live.latest(), Some(0));

        notifier.notify(&[TableChange::Tasks]);
        assert_eq!(live.wait_for(|n| *n == 2).await, Some(2));
    }

    #[tokio::test]
    async fn first_failure_reaches_the_reader() {
        let notifier = ChangeNotifier::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut live = LiveQuery::spawn(
            TableChange::Tasks,
            &notifier,
            CancellationToken::new(),
            move || {
                let counter = counter.clone();
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(AppError::Storage(sqlx::Error::PoolClosed)),
                        n => Ok(n),
                    }
                }
            },
        );

        let err = tokio::time::timeout(Duration::from_secs(2), live.current())
            .await
            .expect("failure was not delivered")
            .unwrap_err();
        assert!(matches!(err, AppError::Query(ref inner) if matches!(**inner, AppError::Storage(_))));
        assert_eq!(live.latest(), None);

        // The refresher keeps listening and recovers on the next write.
        notifier.notify(&[TableChange::Tasks]);
        assert_eq!(live.next().await, Some(1));
        assert_eq!(live.current().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn current_returns_the_delivered_result() {
        let notifier = ChangeNotifier::new();
        let (mut live, _) = counting_query(&notifier, CancellationToken::new());
        assert_eq!(live.current().await.unwrap(), 1);
        assert_eq!(live.current().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wait_for_matches_current_value() {
        let notifier = ChangeNotifier::new();
        let (mut live, _) = counting_query(&notifier, CancellationToken::new());
        assert_eq!(live.wait_for(|n| *n == 1).await, Some(1));
        assert_eq!(live.wait_for(|n| *n == 1).await, Some(1));
    }
}
