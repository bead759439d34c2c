//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/users/{user_id}', use [format_endpoint].
//! Every ledger route is scoped to a user.

/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";
/// The route to create users.
pub const USERS: &str = "/api/users";
/// The route to access a single user.
pub const USER: &str = "/api/users/{user_id}";
/// The route for a user's current balance.
pub const USER_BALANCE: &str = "/api/users/{user_id}/balance";
/// The route to recompute a user's balance from their ledger.
pub const RECONCILE_BALANCE: &str = "/api/users/{user_id}/balance/reconcile";
/// The route to access a user's transactions.
pub const TRANSACTIONS: &str = "/api/users/{user_id}/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/users/{user_id}/transactions/{transaction_id}";
/// The route for the categories a user has used.
pub const CATEGORIES: &str = "/api/users/{user_id}/categories";
/// The route for the totals of a period.
pub const USER_SUMMARY: &str = "/api/users/{user_id}/summary";
/// The route for the per-category totals of a period.
pub const USER_BREAKDOWN: &str = "/api/users/{user_id}/breakdown";
/// The route for a period split into buckets.
pub const USER_SERIES: &str = "/api/users/{user_id}/series";
/// The route for a stream of the totals of a period as they change.
pub const LIVE_SUMMARY: &str = "/api/users/{user_id}/summary/live";

/// Replace the first parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters.
/// Call it once per parameter to fill in paths with several parameters,
/// see [format_transaction_endpoint].
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let param_start = match endpoint_path.find('{') {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

/// Fill in the user and transaction IDs of [TRANSACTION].
pub fn format_transaction_endpoint(user_id: i64, transaction_id: i64) -> String {
    format_endpoint(&format_endpoint(TRANSACTION, user_id), transaction_id)
}
