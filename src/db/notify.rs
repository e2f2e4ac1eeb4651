use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::db::schema::Table;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A write to this table committed.
    Changed(Table),
    /// The store was closed; no further notifications follow.
    Closed,
}

/// Table-keyed change broadcasts.
///
/// Writers publish after commit; every live subscription on the table
/// re-runs its query. Invalidation is per table, not per row.
#[derive(Clone)]
pub struct ChangeNotifier {
    senders: Arc<HashMap<Table, broadcast::Sender<Notification>>>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let senders = Table::ALL
            .into_iter()
            .map(|table| {
                let (tx, _) = broadcast::channel(capacity);
                (table, tx)
            })
            .collect();
        Self {
            senders: Arc::new(senders),
        }
    }

    pub fn subscribe(&self, table: Table) -> broadcast::Receiver<Notification> {
        self.senders[&table].subscribe()
    }

    pub fn publish(&self, table: Table) {
        // No subscribers is not an error.
        let delivered = self.senders[&table]
            .send(Notification::Changed(table))
            .unwrap_or(0);
        debug!(%table, subscribers = delivered, "Table changed");
    }

    pub fn close(&self) {
        for sender in self.senders.values() {
            let _ = sender.send(Notification::Closed);
        }
    }

    pub fn subscriber_count(&self, table: Table) -> usize {
        self.senders[&table].receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
