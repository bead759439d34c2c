//! Tally is a personal finance tracker.
//!
//! Users record income and expense transactions and view aggregated balances,
//! category breakdowns and time-windowed summaries.
//!
//! This library provides a JSON REST API over an embedded SQLite ledger.
//! The interesting parts live in a small aggregation layer:
//! - [transaction](crate::Transaction): the per-user ledger of dated records,
//! - cursor based pagination over the ledger history,
//! - a denormalized balance on the user profile that is kept in step with
//!   ledger mutations through atomic increments,
//! - a period resolver for daily, weekly, monthly, quarterly and yearly views,
//! - live summaries that are updated incrementally from ledger events.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::Date;
use tokio::signal;

mod app_state;
mod balance;
mod balance_endpoints;
mod database_id;
mod db;
mod endpoints;
mod live;
mod logging;
mod pagination;
mod period;
mod register_user;
mod routing;
mod summary;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use balance::{Reconciliation, get_balance, ledger_total, reconcile_balance};
pub use db::initialize as initialize_db;
pub use live::{
    DEFAULT_EVENT_CAPACITY, LedgerChange, LedgerEvent, LedgerEvents, LiveSummary,
    LiveSummarySubscription, subscribe_to_summary,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::{Cursor, Page, PaginationConfig};
pub use period::{
    DateRange, Period, PeriodNavigation, next, previous, resolve_period, split_into_buckets,
};
pub use routing::build_router;
pub use summary::{
    BucketSummary, CategoryTotal, PeriodSummary, bucket_series, category_breakdown,
    running_balances, summarise,
};
pub use timezone::{DEFAULT_TIMEZONE, get_local_offset, today_for, today_in};
pub use transaction::{
    LedgerFilter, MAX_AMOUNT_CENTS, SortOrder, Transaction, TransactionBuilder, TransactionKind,
    UNCATEGORISED_LABEL, count_transactions, create_transaction, delete_transaction,
    get_transaction, get_transaction_date_bounds, get_transactions_page, list_categories,
    query_summary, query_transactions, update_transaction,
};
pub use user::{User, UserID, count_users, create_user, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used as a user's display name.
    #[error("user name cannot be empty")]
    EmptyUserName,

    /// A zero or negative amount was used to create a transaction.
    ///
    /// The direction of a transaction is given by its kind, so amounts are
    /// always positive magnitudes.
    #[error("{0} is not a positive amount")]
    NonPositiveAmount(i64),

    /// An amount larger than [MAX_AMOUNT_CENTS] was used to create a transaction.
    #[error("{0} is larger than the maximum amount of {max} cents", max = MAX_AMOUNT_CENTS)]
    AmountTooLarge(i64),

    /// A ledger mutation would take the user's balance outside the range of
    /// a 64 bit integer.
    #[error("the balance would be out of range after this change")]
    BalanceOutOfRange,

    /// A period at the limits of the calendar cannot be expressed in the
    /// user's timezone.
    #[error("the period starting on {0} is outside the supported calendar")]
    DateOutOfRange(Date),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The pagination cursor could not be decoded.
    ///
    /// Cursors are opaque tokens handed out with a page of results, clients
    /// should pass them back unchanged.
    #[error("invalid pagination cursor")]
    InvalidCursor,

    /// The timezone name is not a canonical timezone, e.g. "Pacific/Auckland".
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyUserName
            | Error::NonPositiveAmount(_)
            | Error::AmountTooLarge(_)
            | Error::BalanceOutOfRange
            | Error::DateOutOfRange(_)
            | Error::FutureDate(_)
            | Error::InvalidCursor
            | Error::InvalidTimezone(_) => StatusCode::BAD_REQUEST,
            Error::NotFound | Error::UpdateMissingTransaction | Error::DeleteMissingTransaction => {
                StatusCode::NOT_FOUND
            }
            Error::SqlError(_) | Error::JSONSerializationError(_) | Error::DatabaseLockError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are not intended to be shown to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use time::{Date, macros::date};

    use crate::Error;

    #[test]
    fn client_errors_are_bad_requests() {
        for error in [
            Error::EmptyUserName,
            Error::NonPositiveAmount(0),
            Error::AmountTooLarge(i64::MAX),
            Error::BalanceOutOfRange,
            Error::DateOutOfRange(Date::MAX),
            Error::FutureDate(date!(2099 - 01 - 01)),
            Error::InvalidCursor,
            Error::InvalidTimezone("Mars/Olympus_Mons".to_owned()),
        ] {
            assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn missing_records_are_not_found() {
        for error in [
            Error::NotFound,
            Error::UpdateMissingTransaction,
            Error::DeleteMissingTransaction,
        ] {
            assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn lock_error_is_internal() {
        let response = Error::DatabaseLockError.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
