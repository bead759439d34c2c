//! Defines the core data models and database queries for the transaction ledger.
//!
//! Every mutation of the ledger also applies the matching signed increment to
//! the owner's balance inside the same SQLite transaction, so the stored
//! balance always equals the sum of the ledger once a mutation commits.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, balance::apply_increment, database_id::TransactionId, user::UserID};

use super::query::UNCATEGORISED_LABEL;

/// The largest amount a single transaction may record, one billion in cents.
///
/// Keeps balance arithmetic far from the limits of `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in, e.g. a salary.
    Income,
    /// Money going out, e.g. groceries.
    Expense,
}

impl TransactionKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user whose ledger the transaction belongs to.
    pub user_id: UserID,
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The magnitude of the transaction in cents, always positive.
    pub amount_cents: i64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The category label, e.g. "Groceries".
    pub category: Option<String>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(kind: TransactionKind, amount_cents: i64, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            amount_cents,
            date,
            description: String::new(),
            category: None,
        }
    }

    /// The effect of this transaction on the balance: positive for income and
    /// negative for expenses.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Income => self.amount_cents,
            TransactionKind::Expense => -self.amount_cents,
        }
    }
}

/// A builder for creating and editing [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// use crate::transaction::{Transaction, TransactionKind};
///
/// let transaction = Transaction::build(TransactionKind::Expense, 4599, date!(2025 - 01 - 15))
///     .description("Coffee shop purchase")
///     .category(Some("Eating out"));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,

    /// The magnitude of the transaction in cents.
    ///
    /// Must be greater than zero, the direction comes from `kind`.
    pub amount_cents: i64,

    /// The date when the transaction occurred.
    ///
    /// The date must not be later than the owner's "today".
    pub date: Date,

    /// A human-readable description of the transaction.
    pub description: String,

    /// An optional category label. Blank labels are treated as no category.
    pub category: Option<String>,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: &str) -> Self {
        description.clone_into(&mut self.description);
        self
    }

    /// Set the category label for the transaction.
    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(str::to_owned);
        self
    }

    /// Check the builder and normalise its text fields.
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::NonPositiveAmount] if the amount is zero or negative,
    /// - [Error::AmountTooLarge] if the amount is over [MAX_AMOUNT_CENTS],
    /// - or [Error::FutureDate] if the date is after `today`.
    ///
    /// The reserved [UNCATEGORISED_LABEL] is stored as no category.
    fn validate(self, today: Date) -> Result<Self, Error> {
        if self.amount_cents <= 0 {
            return Err(Error::NonPositiveAmount(self.amount_cents));
        }

        if self.amount_cents > MAX_AMOUNT_CENTS {
            return Err(Error::AmountTooLarge(self.amount_cents));
        }

        if self.date > today {
            return Err(Error::FutureDate(self.date));
        }

        let category = self
            .category
            .map(|category| category.trim().to_owned())
            .filter(|category| !category.is_empty() && category.as_str() != UNCATEGORISED_LABEL);

        Ok(Self {
            description: self.description.trim().to_owned(),
            category,
            ..self
        })
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// The columns read by [map_transaction_row], in order.
pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, date, description, category, created_at";

/// Append a new transaction to a user's ledger and add its signed amount to
/// the user's balance.
///
/// Dates must be no later than `today`, which should be today's date in the
/// user's timezone.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount], [Error::AmountTooLarge] or [Error::FutureDate]
///   if the builder is invalid,
/// - [Error::NotFound] if `user_id` does not refer to a user,
/// - [Error::BalanceOutOfRange] if the balance would overflow,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let builder = builder.validate(today)?;
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = sql_transaction
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, kind, amount, date, description, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                builder.kind,
                builder.amount_cents,
                builder.date,
                builder.description,
                builder.category,
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    apply_increment(user_id, transaction.signed_amount(), &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Retrieve a transaction from a user's ledger by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": id, ":user_id": user_id.as_i64()},
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Replace the details of a transaction and adjust the balance by the change
/// in its signed amount.
///
/// Returns the transaction as it was before and after the update.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount], [Error::AmountTooLarge] or [Error::FutureDate]
///   if the builder is invalid,
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a transaction owned by `user_id`,
/// - [Error::BalanceOutOfRange] if the balance would overflow,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    user_id: UserID,
    id: TransactionId,
    builder: TransactionBuilder,
    today: Date,
    connection: &Connection,
) -> Result<(Transaction, Transaction), Error> {
    let builder = builder.validate(today)?;
    let sql_transaction = connection.unchecked_transaction()?;

    let old = match get_transaction(user_id, id, &sql_transaction) {
        Err(Error::NotFound) => return Err(Error::UpdateMissingTransaction),
        result => result?,
    };

    let new = sql_transaction
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET kind = ?1, amount = ?2, date = ?3, description = ?4, category = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.kind,
                builder.amount_cents,
                builder.date,
                builder.description,
                builder.category,
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )?;

    let delta_cents = new
        .signed_amount()
        .checked_sub(old.signed_amount())
        .ok_or(Error::BalanceOutOfRange)?;
    apply_increment(user_id, delta_cents, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok((old, new))
}

/// Remove a transaction from a user's ledger and reverse its effect on the balance.
///
/// Returns the deleted transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let deleted = sql_transaction
        .prepare(&format!(
            "DELETE FROM \"transaction\" WHERE id = :id AND user_id = :user_id
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            rusqlite::named_params! {":id": id, ":user_id": user_id.as_i64()},
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::DeleteMissingTransaction,
            error => error.into(),
        })?;

    apply_increment(user_id, -deleted.signed_amount(), &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(deleted)
}

/// Get the number of transactions in a user's ledger.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                amount INTEGER NOT NULL CHECK (amount > 0),
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Covers range queries and the (date, id) ordering used for pagination.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date, id);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_category ON \"transaction\"(user_id, category);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// The row must contain the columns in [TRANSACTION_COLUMNS].
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        amount_cents: row.get(3)?,
        date: row.get(4)?,
        description: row.get(5)?,
        category: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
