use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    db::lock_connection,
    pagination::{Cursor, Page, PaginationConfig},
    period::{Period, resolve_period},
    timezone::today_for,
    transaction::{
        LedgerFilter, Transaction, TransactionKind, get_transactions_page, list_categories,
    },
    user::{UserID, get_user_by_id},
};

/// The state needed for listing transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The server's timezone, used for users without one of their own.
    pub local_timezone: String,
    /// The config that controls the size of pages.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// The cursor from the previous page, omitted for the first page.
    pub cursor: Option<String>,
    /// The maximum number of transactions on the page.
    pub page_size: Option<u64>,
    /// Only list transactions in the period containing `anchor`.
    pub period: Option<Period>,
    /// Any date within `period`, today by default.
    pub anchor: Option<Date>,
    /// Only list transactions with this category.
    pub category: Option<String>,
    /// Only list income or only list expenses.
    pub kind: Option<TransactionKind>,
}

/// A route handler for paging through a user's transactions, newest first.
///
/// Without a `period` or `anchor` the whole ledger is listed.
pub async fn get_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Page<Transaction>>, Error> {
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;
    let page_size = state.pagination_config.resolve_page_size(query.page_size);

    let connection = lock_connection(&state.db_connection)?;
    let user = get_user_by_id(user_id, &connection)?;

    let mut filter = LedgerFilter::default()
        .with_category(query.category.as_deref())
        .with_kind(query.kind);

    if query.period.is_some() || query.anchor.is_some() {
        let period = query.period.unwrap_or_else(Period::default_preset);
        let anchor = match query.anchor {
            Some(anchor) => anchor,
            None => today_for(&user, &state.local_timezone)?,
        };
        filter.range = Some(resolve_period(period, anchor));
    }

    get_transactions_page(user_id, &filter, cursor, page_size, &connection).map(Json)
}

/// A route handler for the distinct categories a user has recorded.
pub async fn get_categories_endpoint(
    State(state): State<ListTransactionsState>,
    Path(user_id): Path<UserID>,
) -> Result<Json<Vec<String>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_user_by_id(user_id, &connection)?;

    list_categories(user_id, &connection).map(Json)
}
