//! Summary HTTP handlers.
//!
//! Every handler resolves a period of the user's ledger from the `period`
//! and `anchor` query parameters. Without an anchor the period containing
//! today, in the user's timezone, is used.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    db::lock_connection,
    live::{LedgerEvents, subscribe_to_summary},
    period::{DateRange, Period, PeriodNavigation, resolve_period},
    summary::aggregation::{
        BucketSummary, CategoryTotal, PeriodSummary, bucket_series, category_breakdown,
        running_balances,
    },
    timezone::{get_local_offset, today_for},
    transaction::{
        LedgerFilter, SortOrder, TransactionKind, get_transaction_date_bounds, query_summary,
        query_transactions,
    },
    user::{User, UserID, get_user_by_id},
};

/// The state needed for the summary endpoints.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The server's timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The channel ledger mutations are published on.
    pub ledger_events: LedgerEvents,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            ledger_events: state.ledger_events.clone(),
        }
    }
}

/// The query parameters for the summary endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// The length of the period to summarise, a month by default.
    pub period: Option<Period>,
    /// Any date within the period to summarise.
    pub anchor: Option<Date>,
    /// Only summarise this category.
    pub category: Option<String>,
    /// For breakdowns, which kind of transaction to break down. Expenses by default.
    pub kind: Option<TransactionKind>,
    /// For series, the length of each bucket.
    pub interval: Option<Period>,
}

/// The totals for one period of a user's ledger.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    /// The period summarised and its neighbours.
    pub navigation: PeriodNavigation,
    /// The start of the period as a UTC instant, inclusive.
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    /// The end of the period as a UTC instant, exclusive.
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    /// The category summarised, if any.
    pub category: Option<String>,
    /// The totals.
    pub summary: PeriodSummary,
    /// The user's current balance in cents.
    pub balance_cents: i64,
}

/// The per-category totals for one period.
#[derive(Debug, Serialize, Deserialize)]
pub struct BreakdownResponse {
    /// The period broken down and its neighbours.
    pub navigation: PeriodNavigation,
    /// The kind of transactions broken down.
    pub kind: TransactionKind,
    /// The totals per category.
    pub categories: Vec<CategoryTotal>,
}

/// One bucket of a series with the balance at its end.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// The totals for the bucket.
    #[serde(flatten)]
    pub bucket: BucketSummary,
    /// The user's balance at the end of the bucket, in cents.
    pub closing_balance_cents: i64,
}

/// A period split into buckets.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesResponse {
    /// The period covered by the series and its neighbours.
    pub navigation: PeriodNavigation,
    /// The length of each bucket.
    pub interval: Period,
    /// The buckets, oldest first.
    pub points: Vec<SeriesPoint>,
}

/// Summarise a period of the user's ledger.
pub async fn get_summary_endpoint(
    State(state): State<SummaryState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = get_user_by_id(user_id, &connection)?;
    let (period, range) = resolve_requested_period(&user, &state.local_timezone, &query)?;
    let filter = LedgerFilter::in_range(range).with_category(query.category.as_deref());

    let summary = query_summary(user_id, &filter, &connection)?;
    let bounds = get_transaction_date_bounds(user_id, &connection)?;

    let timezone = user.timezone.as_deref().unwrap_or(&state.local_timezone);
    let offset =
        get_local_offset(timezone).ok_or_else(|| Error::InvalidTimezone(timezone.to_owned()))?;
    let (starts_at, ends_at) = range
        .to_utc_bounds(offset)
        .ok_or(Error::DateOutOfRange(range.start))?;

    Ok(Json(SummaryResponse {
        navigation: PeriodNavigation::new(period, range, bounds),
        starts_at,
        ends_at,
        category: filter.category,
        summary,
        balance_cents: user.balance_cents,
    }))
}

/// Break a period of the user's ledger down by category.
pub async fn get_breakdown_endpoint(
    State(state): State<SummaryState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<BreakdownResponse>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = get_user_by_id(user_id, &connection)?;
    let (period, range) = resolve_requested_period(&user, &state.local_timezone, &query)?;
    let kind = query.kind.unwrap_or(TransactionKind::Expense);
    let filter = LedgerFilter::in_range(range).with_kind(Some(kind));

    let transactions = query_transactions(user_id, &filter, SortOrder::Ascending, &connection)?;
    let bounds = get_transaction_date_bounds(user_id, &connection)?;

    Ok(Json(BreakdownResponse {
        navigation: PeriodNavigation::new(period, range, bounds),
        kind,
        categories: category_breakdown(&transactions, kind),
    }))
}

/// Split a period of the user's ledger into buckets with running balances.
pub async fn get_series_endpoint(
    State(state): State<SummaryState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SeriesResponse>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = get_user_by_id(user_id, &connection)?;
    let (period, range) = resolve_requested_period(&user, &state.local_timezone, &query)?;
    let interval = query.interval.unwrap_or_else(|| period.default_interval());

    let transactions = query_transactions(
        user_id,
        &LedgerFilter::in_range(range),
        SortOrder::Ascending,
        &connection,
    )?;
    let later_net_cents = match range.end.next_day() {
        Some(day_after) => {
            let later = LedgerFilter::in_range(DateRange {
                start: day_after,
                end: Date::MAX,
            });
            query_summary(user_id, &later, &connection)?.net_cents
        }
        None => 0,
    };
    let bounds = get_transaction_date_bounds(user_id, &connection)?;

    let series = bucket_series(&transactions, range, interval);
    let balances = running_balances(user.balance_cents, later_net_cents, &series);
    let points = series
        .into_iter()
        .zip(balances)
        .map(|(bucket, closing_balance_cents)| SeriesPoint {
            bucket,
            closing_balance_cents,
        })
        .collect();

    Ok(Json(SeriesResponse {
        navigation: PeriodNavigation::new(period, range, bounds),
        interval,
        points,
    }))
}

/// Stream the summary of a period as Server-Sent Events.
///
/// The first `summary` event carries the current totals, and another is sent
/// every time a ledger mutation changes them.
pub async fn get_live_summary_endpoint(
    State(state): State<SummaryState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Error>>>, Error> {
    let filter = {
        let connection = lock_connection(&state.db_connection)?;
        let user = get_user_by_id(user_id, &connection)?;
        let (_, range) = resolve_requested_period(&user, &state.local_timezone, &query)?;
        LedgerFilter::in_range(range).with_category(query.category.as_deref())
    };

    let subscription =
        subscribe_to_summary(user_id, filter, &state.ledger_events, state.db_connection)?;
    let initial = subscription.current();

    let events = stream::unfold(
        Some((subscription, Some(initial))),
        |state| async move {
            let (mut subscription, pending) = state?;

            let summary = match pending {
                Some(summary) => summary,
                None => match subscription.next_change().await {
                    Ok(Some(summary)) => summary,
                    Ok(None) => return None,
                    Err(error) => {
                        tracing::error!("Live summary stream ended: {error}");
                        return Some((Err(error), None));
                    }
                },
            };

            Some((summary_event(summary), Some((subscription, None))))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn summary_event(summary: PeriodSummary) -> Result<Event, Error> {
    Event::default()
        .event("summary")
        .json_data(summary)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

/// Work out which period a request is asking for.
fn resolve_requested_period(
    user: &User,
    default_timezone: &str,
    query: &SummaryQuery,
) -> Result<(Period, DateRange), Error> {
    let period = query.period.unwrap_or_else(Period::default_preset);
    let anchor = match query.anchor {
        Some(anchor) => anchor,
        None => today_for(user, default_timezone)?,
    };

    Ok((period, resolve_period(period, anchor)))
}
