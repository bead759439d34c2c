//! Endpoints for reading and repairing a user's stored balance.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    balance::{Reconciliation, get_balance, reconcile_balance},
    db::lock_connection,
    user::UserID,
};

/// The state needed for the balance endpoints.
#[derive(Debug, Clone)]
pub struct BalanceState {
    /// The database connection for reading balances.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BalanceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A user's current balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// The user the balance belongs to.
    pub user_id: UserID,
    /// The sum of the user's ledger in cents.
    pub balance_cents: i64,
}

/// A route handler for a user's stored balance.
pub async fn get_balance_endpoint(
    State(state): State<BalanceState>,
    Path(user_id): Path<UserID>,
) -> Result<Json<BalanceResponse>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let balance_cents = get_balance(user_id, &connection)?;

    Ok(Json(BalanceResponse {
        user_id,
        balance_cents,
    }))
}

/// A route handler that recomputes a user's balance from their ledger and
/// reports any drift that was corrected.
pub async fn reconcile_balance_endpoint(
    State(state): State<BalanceState>,
    Path(user_id): Path<UserID>,
) -> Result<Json<Reconciliation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    reconcile_balance(user_id, &connection).map(Json)
}
