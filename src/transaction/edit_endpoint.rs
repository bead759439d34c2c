use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    live::{LedgerChange, LedgerEvent, LedgerEvents},
    timezone::today_for,
    transaction::{Transaction, get_transaction, update_transaction},
    user::{UserID, get_user_by_id},
};

use super::create_endpoint::TransactionRequest;

/// The state needed to view or edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The server's timezone, used for users without one of their own.
    pub local_timezone: String,
    /// The channel to announce edits on.
    pub ledger_events: LedgerEvents,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            ledger_events: state.ledger_events.clone(),
        }
    }
}

/// A route handler for fetching a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Path((user_id, transaction_id)): Path<(UserID, TransactionId)>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(user_id, transaction_id, &connection).map(Json)
}

/// A route handler for replacing the details of a transaction, responds with
/// the updated transaction.
pub async fn update_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Path((user_id, transaction_id)): Path<(UserID, TransactionId)>,
    Json(request): Json<TransactionRequest>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = get_user_by_id(user_id, &connection)?;
    let today = today_for(&user, &state.local_timezone)?;

    let (old, new) =
        update_transaction(user_id, transaction_id, request.into(), today, &connection)
            .inspect_err(|error| {
                tracing::debug!("Could not update transaction {transaction_id}: {error}")
            })?;

    state.ledger_events.publish(LedgerEvent {
        user_id,
        change: LedgerChange::Updated {
            old,
            new: new.clone(),
        },
    });

    Ok(Json(new))
}
