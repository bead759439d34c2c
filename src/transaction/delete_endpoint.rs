use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    live::{LedgerChange, LedgerEvent, LedgerEvents},
    transaction::delete_transaction,
    user::UserID,
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The channel to announce deletions on.
    pub ledger_events: LedgerEvents,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            ledger_events: state.ledger_events.clone(),
        }
    }
}

/// A route handler for deleting a transaction, responds with `204 No Content`.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Path((user_id, transaction_id)): Path<(UserID, TransactionId)>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let deleted = delete_transaction(user_id, transaction_id, &connection)?;
    tracing::debug!("Deleted transaction {transaction_id} of user {user_id}");

    state.ledger_events.publish(LedgerEvent {
        user_id,
        change: LedgerChange::Deleted(deleted),
    });

    Ok(StatusCode::NO_CONTENT)
}
