//! Range and category queries over a user's ledger.

use rusqlite::{Connection, ToSql};
use serde::Deserialize;
use time::Date;

use crate::{
    Error,
    period::DateRange,
    summary::PeriodSummary,
    user::UserID,
};

use super::core::{TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row};

/// The category label that stands for transactions without a category.
///
/// Filtering by this label selects transactions whose category is empty.
pub const UNCATEGORISED_LABEL: &str = "Uncategorised";

/// The order to sort transactions in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// Restricts a ledger query to a subset of a user's transactions.
///
/// The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerFilter {
    /// Only include transactions dated within this range.
    pub range: Option<DateRange>,
    /// Only include transactions with this category, see [UNCATEGORISED_LABEL].
    pub category: Option<String>,
    /// Only include income or only include expenses.
    pub kind: Option<TransactionKind>,
}

impl LedgerFilter {
    /// Create a filter for the transactions dated within `range`.
    pub fn in_range(range: DateRange) -> Self {
        Self {
            range: Some(range),
            ..Default::default()
        }
    }

    /// Restrict the filter to a category label.
    ///
    /// The label is trimmed, blank labels remove the restriction.
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_owned);
        self
    }

    /// Restrict the filter to one kind of transaction.
    pub fn with_kind(mut self, kind: Option<TransactionKind>) -> Self {
        self.kind = kind;
        self
    }

    /// Whether `transaction` would be selected by a query using this filter.
    ///
    /// Ownership is not checked here, queries are always scoped to one user.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        let in_range = self
            .range
            .is_none_or(|range| range.contains(transaction.date));
        let same_kind = self.kind.is_none_or(|kind| kind == transaction.kind);
        let same_category = match self.category.as_deref() {
            None => true,
            Some(UNCATEGORISED_LABEL) => transaction.category.is_none(),
            Some(category) => transaction.category.as_deref() == Some(category),
        };

        in_range && same_kind && same_category
    }

    pub(super) fn params(&self, user_id: UserID) -> FilterParams {
        let uncategorised = self.category.as_deref() == Some(UNCATEGORISED_LABEL);

        FilterParams {
            user_id: user_id.as_i64(),
            start: self.range.map(|range| range.start),
            end: self.range.map(|range| range.end),
            kind: self.kind,
            category: self.category.clone().filter(|_| !uncategorised),
            uncategorised,
        }
    }
}

/// The SQL condition for a [LedgerFilter]; bind it with [FilterParams::named].
pub(super) const FILTER_CLAUSE: &str = "user_id = :user_id
    AND (:start IS NULL OR date >= :start)
    AND (:end IS NULL OR date <= :end)
    AND (:kind IS NULL OR kind = :kind)
    AND (:category IS NULL OR category = :category)
    AND (:uncategorised = 0 OR category IS NULL)";

/// Owned values for the named parameters in [FILTER_CLAUSE].
pub(super) struct FilterParams {
    user_id: i64,
    start: Option<Date>,
    end: Option<Date>,
    kind: Option<TransactionKind>,
    category: Option<String>,
    uncategorised: bool,
}

impl FilterParams {
    pub(super) fn named(&self) -> Vec<(&'static str, &dyn ToSql)> {
        vec![
            (":user_id", &self.user_id),
            (":start", &self.start),
            (":end", &self.end),
            (":kind", &self.kind),
            (":category", &self.category),
            (":uncategorised", &self.uncategorised),
        ]
    }
}

/// Get every transaction in a user's ledger that matches `filter`.
///
/// Transactions are sorted by date and then ID, so transactions on the same
/// day keep the order they were recorded in.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn query_transactions(
    user_id: UserID,
    filter: &LedgerFilter,
    sort_order: SortOrder,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let direction = match sort_order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };

    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
        WHERE {FILTER_CLAUSE} \
        ORDER BY date {direction}, id {direction}"
    );

    let params = filter.params(user_id);

    connection
        .prepare(&query)?
        .query_map(params.named().as_slice(), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Sum the transactions matching `filter` without loading them.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn query_summary(
    user_id: UserID,
    filter: &LedgerFilter,
    connection: &Connection,
) -> Result<PeriodSummary, Error> {
    let query = format!(
        "SELECT \
            COALESCE(SUM(CASE kind WHEN 'income' THEN amount ELSE 0 END), 0), \
            COALESCE(SUM(CASE kind WHEN 'expense' THEN amount ELSE 0 END), 0), \
            COUNT(id) \
        FROM \"transaction\" WHERE {FILTER_CLAUSE}"
    );

    let params = filter.params(user_id);

    connection
        .query_row(&query, params.named().as_slice(), |row| {
            let income_cents: i64 = row.get(0)?;
            let expense_cents: i64 = row.get(1)?;

            Ok(PeriodSummary {
                income_cents,
                expense_cents,
                net_cents: income_cents - expense_cents,
                count: row.get(2)?,
            })
        })
        .map_err(|error| error.into())
}

/// Get the distinct category labels used in a user's ledger, alphabetically.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn list_categories(user_id: UserID, connection: &Connection) -> Result<Vec<String>, Error> {
    connection
        .prepare(
            "SELECT DISTINCT category FROM \"transaction\" \
            WHERE user_id = ?1 AND category IS NOT NULL \
            ORDER BY category ASC",
        )?
        .query_map([user_id.as_i64()], |row| row.get(0))?
        .map(|category| category.map_err(Error::SqlError))
        .collect()
}

/// Get the dates of the oldest and newest transaction in a user's ledger.
///
/// Returns `None` for an empty ledger.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn get_transaction_date_bounds(
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<DateRange>, Error> {
    let (min_date, max_date): (Option<Date>, Option<Date>) = connection.query_row(
        "SELECT MIN(date), MAX(date) FROM \"transaction\" WHERE user_id = ?1",
        [user_id.as_i64()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    match (min_date, max_date) {
        (Some(start), Some(end)) => Ok(Some(DateRange { start, end })),
        _ => Ok(None),
    }
}
