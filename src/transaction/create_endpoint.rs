use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    db::lock_connection,
    live::{LedgerChange, LedgerEvent, LedgerEvents},
    timezone::today_for,
    transaction::{Transaction, TransactionBuilder, TransactionKind, create_transaction},
    user::{UserID, get_user_by_id},
};

/// The state needed for creating a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The server's timezone, used for users without one of their own.
    pub local_timezone: String,
    /// The channel to announce new transactions on.
    pub ledger_events: LedgerEvents,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            ledger_events: state.ledger_events.clone(),
        }
    }
}

/// The JSON body for creating or replacing a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The magnitude of the transaction in cents, greater than zero.
    pub amount_cents: i64,
    /// The date of the transaction as "YYYY-MM-DD", no later than today.
    pub date: Date,
    /// Text detailing the transaction.
    #[serde(default)]
    pub description: String,
    /// An optional category label.
    #[serde(default)]
    pub category: Option<String>,
}

impl From<TransactionRequest> for TransactionBuilder {
    fn from(request: TransactionRequest) -> Self {
        Transaction::build(request.kind, request.amount_cents, request.date)
            .description(&request.description)
            .category(request.category.as_deref())
    }
}

/// A route handler for recording a new transaction, responds with the
/// transaction and `201 Created`.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Path(user_id): Path<UserID>,
    Json(request): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = get_user_by_id(user_id, &connection)?;
    let today = today_for(&user, &state.local_timezone)?;

    let transaction = create_transaction(request.into(), user_id, today, &connection)
        .inspect_err(|error| tracing::debug!("Could not create transaction: {error}"))?;

    // Published before the lock is released so live summaries see it exactly once.
    state.ledger_events.publish(LedgerEvent {
        user_id,
        change: LedgerChange::Inserted(transaction.clone()),
    });

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState, PaginationConfig, build_router,
        endpoints::{self, format_endpoint},
        transaction::{Transaction, TransactionKind, count_transactions},
        user::{User, UserID, create_user, get_user_by_id},
    };

    fn get_test_server() -> (TestServer, AppState, User) {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
        )
        .unwrap();
        let user = create_user("Test", None, &state.db_connection.lock().unwrap()).unwrap();
        let server = TestServer::try_new(build_router(state.clone())).unwrap();

        (server, state, user)
    }

    #[tokio::test]
    async fn can_create_transaction() {
        let (server, state, user) = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::TRANSACTIONS, user.id.as_i64()))
            .json(&json!({
                "kind": "expense",
                "amount_cents": 1250,
                "date": "2024-03-01",
                "description": "  Lunch ",
                "category": "Eating out",
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let transaction = response.json::<Transaction>();
        assert_eq!(transaction.kind, TransactionKind::Expense);
        assert_eq!(transaction.amount_cents, 1250);
        assert_eq!(transaction.description, "Lunch");
        assert_eq!(transaction.category.as_deref(), Some("Eating out"));

        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user.id, &connection), Ok(1));
        assert_eq!(
            get_user_by_id(user.id, &connection).unwrap().balance_cents,
            -1250
        );
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let (server, state, user) = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::TRANSACTIONS, user.id.as_i64()))
            .json(&json!({
                "kind": "income",
                "amount_cents": 0,
                "date": "2024-03-01",
            }))
            .await;

        response.assert_status_bad_request();
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user.id, &connection), Ok(0));
    }

    #[tokio::test]
    async fn rejects_amount_over_maximum() {
        let (server, state, user) = get_test_server();

        for _ in 0..2 {
            let response = server
                .post(&format_endpoint(endpoints::TRANSACTIONS, user.id.as_i64()))
                .json(&json!({
                    "kind": "income",
                    "amount_cents": i64::MAX,
                    "date": "2024-03-01",
                }))
                .await;

            response.assert_status_bad_request();
        }

        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user.id, &connection), Ok(0));
        assert_eq!(
            get_user_by_id(user.id, &connection).unwrap().balance_cents,
            0
        );
    }

    #[tokio::test]
    async fn rejects_future_date() {
        let (server, _, user) = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::TRANSACTIONS, user.id.as_i64()))
            .json(&json!({
                "kind": "income",
                "amount_cents": 100,
                "date": "9999-12-31",
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (server, state, _) = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::TRANSACTIONS, 999))
            .json(&json!({
                "kind": "income",
                "amount_cents": 100,
                "date": "2024-03-01",
            }))
            .await;

        response.assert_status_not_found();
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(UserID::new(999), &connection), Ok(0));
    }
}
