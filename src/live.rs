//! Live summaries that follow a user's ledger as it changes.
//!
//! Ledger endpoints publish a [LedgerEvent] for every committed mutation.
//! Subscribers keep a running [PeriodSummary] for their query and update it
//! incrementally from those events instead of re-querying the database.
//!
//! Events are published while the database lock is held, and subscriptions
//! take their snapshot under the same lock. Every event a subscriber receives
//! therefore describes a mutation that is not yet part of its snapshot.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::{
    Error,
    db::lock_connection,
    summary::PeriodSummary,
    transaction::{LedgerFilter, Transaction, query_summary},
    user::UserID,
};

/// The number of events a slow subscriber may fall behind by before it has
/// to resynchronise from the database.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A committed change to a ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    /// A transaction was added.
    Inserted(Transaction),
    /// A transaction was edited.
    Updated {
        /// The transaction before the edit.
        old: Transaction,
        /// The transaction after the edit.
        new: Transaction,
    },
    /// A transaction was removed.
    Deleted(Transaction),
}

/// A change to the ledger of `user_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    /// The owner of the ledger that changed.
    pub user_id: UserID,
    /// What changed.
    pub change: LedgerChange,
}

/// Broadcasts ledger events to live subscribers.
#[derive(Debug, Clone)]
pub struct LedgerEvents {
    sender: Sender<LedgerEvent>,
}

impl Default for LedgerEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl LedgerEvents {
    /// Create a channel that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self { sender }
    }

    /// Send `event` to every current subscriber.
    ///
    /// Should be called while holding the database lock the mutation was made
    /// under. Having no subscribers is not an error.
    pub fn publish(&self, event: LedgerEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::debug!("Published ledger event to {receiver_count} subscribers")
            }
            Err(_) => tracing::trace!("Dropped ledger event, there are no subscribers"),
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

/// A running summary of the transactions selected by one ledger query.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSummary {
    user_id: UserID,
    filter: LedgerFilter,
    summary: PeriodSummary,
}

impl LiveSummary {
    /// Start following the transactions of `user_id` that match `filter`.
    ///
    /// `initial` must be the summary of those transactions at the time of
    /// subscribing.
    pub fn new(user_id: UserID, filter: LedgerFilter, initial: PeriodSummary) -> Self {
        Self {
            user_id,
            filter,
            summary: initial,
        }
    }

    /// The current totals.
    pub fn summary(&self) -> PeriodSummary {
        self.summary
    }

    /// Replace the totals after resynchronising with the database.
    pub fn reset(&mut self, summary: PeriodSummary) {
        self.summary = summary;
    }

    /// Fold `event` into the totals.
    ///
    /// Returns whether the totals changed. Events for other users and
    /// transactions outside the filter are ignored. An edit that moves a
    /// transaction in or out of the filter counts as a removal and/or an
    /// addition.
    pub fn apply(&mut self, event: &LedgerEvent) -> bool {
        if event.user_id != self.user_id {
            return false;
        }

        let before = self.summary;

        match &event.change {
            LedgerChange::Inserted(transaction) => {
                if self.filter.matches(transaction) {
                    self.summary.add(transaction);
                }
            }
            LedgerChange::Updated { old, new } => {
                if self.filter.matches(old) {
                    self.summary.remove(old);
                }
                if self.filter.matches(new) {
                    self.summary.add(new);
                }
            }
            LedgerChange::Deleted(transaction) => {
                if self.filter.matches(transaction) {
                    self.summary.remove(transaction);
                }
            }
        }

        self.summary != before
    }
}

/// A [LiveSummary] attached to the event channel.
#[derive(Debug)]
pub struct LiveSummarySubscription {
    live: LiveSummary,
    receiver: Receiver<LedgerEvent>,
    db_connection: Arc<Mutex<Connection>>,
}

/// Subscribe to the summary of the transactions of `user_id` matching `filter`.
///
/// # Errors
/// Returns an error if the database lock cannot be acquired or the initial
/// summary cannot be queried.
pub fn subscribe_to_summary(
    user_id: UserID,
    filter: LedgerFilter,
    events: &LedgerEvents,
    db_connection: Arc<Mutex<Connection>>,
) -> Result<LiveSummarySubscription, Error> {
    let (receiver, initial) = {
        let connection = lock_connection(&db_connection)?;
        let receiver = events.subscribe();
        let initial = query_summary(user_id, &filter, &connection)?;
        (receiver, initial)
    };

    tracing::debug!("User {user_id} subscribed to live summary for {filter:?}");

    Ok(LiveSummarySubscription {
        live: LiveSummary::new(user_id, filter, initial),
        receiver,
        db_connection,
    })
}

impl LiveSummarySubscription {
    /// The current totals.
    pub fn current(&self) -> PeriodSummary {
        self.live.summary()
    }

    /// Wait until the totals change and return them.
    ///
    /// Returns `Ok(None)` once the event channel has closed. If the
    /// subscriber fell behind and missed events, the totals are recomputed
    /// from the database.
    ///
    /// # Errors
    /// Returns an error if resynchronising with the database fails.
    pub async fn next_change(&mut self) -> Result<Option<PeriodSummary>, Error> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.live.apply(&event) {
                        return Ok(Some(self.live.summary()));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Live summary for user {} missed {skipped} events, resynchronising",
                        self.live.user_id
                    );
                    self.resync()?;
                    return Ok(Some(self.live.summary()));
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    fn resync(&mut self) -> Result<(), Error> {
        let connection = lock_connection(&self.db_connection)?;
        // Anything still queued was published before we took the lock and is
        // already part of the new snapshot.
        self.receiver = self.receiver.resubscribe();
        let summary = query_summary(self.live.user_id, &self.live.filter, &connection)?;
        self.live.reset(summary);

        Ok(())
    }
}

#[cfg(test)]
mod live_summary_tests {
    use time::{OffsetDateTime, macros::date};

    use crate::{
        live::{LedgerChange, LedgerEvent, LiveSummary},
        period::DateRange,
        summary::PeriodSummary,
        transaction::{LedgerFilter, Transaction, TransactionKind},
        user::UserID,
    };

    fn transaction(id: i64, kind: TransactionKind, amount_cents: i64, date: time::Date) -> Transaction {
        Transaction {
            id,
            user_id: UserID::new(1),
            kind,
            amount_cents,
            date,
            description: String::new(),
            category: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn october() -> LedgerFilter {
        LedgerFilter::in_range(DateRange {
            start: date!(2025 - 10 - 01),
            end: date!(2025 - 10 - 31),
        })
    }

    fn event(change: LedgerChange) -> LedgerEvent {
        LedgerEvent {
            user_id: UserID::new(1),
            change,
        }
    }

    #[test]
    fn insert_in_range_updates_summary() {
        let mut live = LiveSummary::new(UserID::new(1), october(), PeriodSummary::default());

        let changed = live.apply(&event(LedgerChange::Inserted(transaction(
            1,
            TransactionKind::Expense,
            500,
            date!(2025 - 10 - 02),
        ))));

        assert!(changed);
        assert_eq!(live.summary().expense_cents, 500);
        assert_eq!(live.summary().net_cents, -500);
        assert_eq!(live.summary().count, 1);
    }

    #[test]
    fn insert_outside_range_is_ignored() {
        let mut live = LiveSummary::new(UserID::new(1), october(), PeriodSummary::default());

        let changed = live.apply(&event(LedgerChange::Inserted(transaction(
            1,
            TransactionKind::Expense,
            500,
            date!(2025 - 09 - 30),
        ))));

        assert!(!changed);
        assert_eq!(live.summary(), PeriodSummary::default());
    }

    #[test]
    fn other_users_events_are_ignored() {
        let mut live = LiveSummary::new(UserID::new(2), october(), PeriodSummary::default());

        let changed = live.apply(&event(LedgerChange::Inserted(transaction(
            1,
            TransactionKind::Income,
            500,
            date!(2025 - 10 - 02),
        ))));

        assert!(!changed);
    }

    #[test]
    fn update_moving_out_of_range_removes() {
        let old = transaction(1, TransactionKind::Income, 500, date!(2025 - 10 - 02));
        let new = transaction(1, TransactionKind::Income, 500, date!(2025 - 09 - 02));
        let mut live = LiveSummary::new(
            UserID::new(1),
            october(),
            crate::summary::summarise([&old]),
        );

        let changed = live.apply(&event(LedgerChange::Updated { old, new }));

        assert!(changed);
        assert_eq!(live.summary(), PeriodSummary::default());
    }

    #[test]
    fn update_of_description_only_is_not_a_change() {
        let old = transaction(1, TransactionKind::Income, 500, date!(2025 - 10 - 02));
        let mut new = old.clone();
        new.description = "Renamed".to_owned();
        let mut live = LiveSummary::new(
            UserID::new(1),
            october(),
            crate::summary::summarise([&old]),
        );

        assert!(!live.apply(&event(LedgerChange::Updated { old, new })));
    }

    #[test]
    fn delete_removes_from_summary() {
        let kept = transaction(1, TransactionKind::Income, 900, date!(2025 - 10 - 02));
        let deleted = transaction(2, TransactionKind::Expense, 300, date!(2025 - 10 - 03));
        let mut live = LiveSummary::new(
            UserID::new(1),
            october(),
            crate::summary::summarise([&kept, &deleted]),
        );

        assert!(live.apply(&event(LedgerChange::Deleted(deleted))));
        assert_eq!(live.summary(), crate::summary::summarise([&kept]));
    }
}
