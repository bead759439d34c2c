//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState,
    balance_endpoints::{get_balance_endpoint, reconcile_balance_endpoint},
    endpoints,
    register_user::{get_user_endpoint, register_user},
    summary::{
        get_breakdown_endpoint, get_live_summary_endpoint, get_series_endpoint,
        get_summary_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_categories_endpoint,
        get_transaction_endpoint, get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::USER, get(get_user_endpoint))
        .route(endpoints::USER_BALANCE, get(get_balance_endpoint))
        .route(
            endpoints::RECONCILE_BALANCE,
            post(reconcile_balance_endpoint),
        );

    let ledger_routes = Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::CATEGORIES, get(get_categories_endpoint));

    let summary_routes = Router::new()
        .route(endpoints::USER_SUMMARY, get(get_summary_endpoint))
        .route(endpoints::USER_BREAKDOWN, get(get_breakdown_endpoint))
        .route(endpoints::USER_SERIES, get(get_series_endpoint))
        .route(endpoints::LIVE_SUMMARY, get(get_live_summary_endpoint));

    Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .merge(user_routes)
        .merge(ledger_routes)
        .merge(summary_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, "I'm a teapot").into_response()
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no route matches the requested path" })),
    )
        .into_response()
}
