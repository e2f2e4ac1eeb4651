//! Live queries.
//!
//! A [`Subscription`] re-runs its query every time its table changes and
//! delivers each fresh result set to the listener. It never completes on
//! its own; it ends when the store closes or the listener lets go.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use rusqlite::Connection;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::db::notify::Notification;
use crate::db::schema::Table;
use crate::db::Database;
use crate::error::StoreResult;

/// Result sets buffered ahead of a slow listener.
const EMISSION_BUFFER: usize = 16;

pub struct Subscription<T> {
    rx: mpsc::Receiver<StoreResult<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Start watching `table`. Must be called inside a tokio runtime.
    pub fn spawn<F>(db: Database, table: Table, query: F) -> Self
    where
        F: Fn(&Connection) -> StoreResult<T> + Send + Sync + 'static,
    {
        // Listen before the first read so nothing slips in between.
        let mut changes = db.notifier().subscribe(table);
        let query = Arc::new(query);
        let (tx, rx) = mpsc::channel(EMISSION_BUFFER);

        let task = tokio::spawn(async move {
            debug!(%table, "Subscription started");
            loop {
                // A store closed before `subscribe` never sends us `Closed`.
                if db.is_closed() {
                    debug!(%table, "Subscription on closed store");
                    break;
                }
                let run = Arc::clone(&query);
                let result = db.call(move |conn| run(conn)).await;
                if tx.send(result).await.is_err() {
                    break;
                }

                match changes.recv().await {
                    Ok(Notification::Changed(_)) => {}
                    Ok(Notification::Closed) | Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%table, skipped, "Subscription lagged, re-running");
                    }
                }

                // One re-run covers every change already queued.
                loop {
                    match changes.try_recv() {
                        Ok(Notification::Changed(_)) | Err(TryRecvError::Lagged(_)) => continue,
                        Ok(Notification::Closed) | Err(TryRecvError::Closed) => {
                            debug!(%table, "Subscription ended by close");
                            return;
                        }
                        Err(TryRecvError::Empty) => break,
                    }
                }
            }
            debug!(%table, "Subscription ended");
        });

        Self {
            rx,
            task: Some(task),
        }
    }
}

impl<T> Subscription<T> {
    /// Subscription fed by an arbitrary channel, for store test doubles.
    pub fn from_receiver(rx: mpsc::Receiver<StoreResult<T>>) -> Self {
        Self { rx, task: None }
    }

    /// Next result set, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<StoreResult<T>> {
        self.rx.recv().await
    }

    /// Stop receiving. No emissions happen after this returns.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = StoreResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
