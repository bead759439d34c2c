//! The denormalized balance stored on each user profile.
//!
//! The balance is a cached sum of the user's ledger. It is never recomputed on
//! read; instead every ledger mutation applies a signed increment in the same
//! SQLite transaction as the mutation itself. [reconcile_balance] exists to
//! repair a balance that has drifted, e.g. after manual edits to the database.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, user::UserID};

/// The result of recomputing a user's balance from their ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// The balance that was stored before reconciling.
    pub stored_cents: i64,
    /// The balance recomputed from the ledger, now the stored balance.
    pub computed_cents: i64,
    /// `computed_cents - stored_cents`, zero when the balance was consistent.
    pub drift_cents: i64,
}

/// Add `delta_cents` to the user's stored balance.
///
/// The new balance is computed with checked arithmetic so it never leaves the
/// range of `i64`. Callers mutating the ledger should pass the SQLite
/// transaction the mutation runs in so the read and the write see the same
/// balance.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if `user_id` does not refer to a user,
/// - [Error::BalanceOutOfRange] if the new balance would overflow,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn apply_increment(
    user_id: UserID,
    delta_cents: i64,
    connection: &Connection,
) -> Result<(), Error> {
    let balance = get_balance(user_id, connection)?;
    let new_balance = balance
        .checked_add(delta_cents)
        .ok_or(Error::BalanceOutOfRange)?;

    connection.execute(
        "UPDATE user SET balance = ?1 WHERE id = ?2",
        (new_balance, user_id.as_i64()),
    )?;

    tracing::debug!("Applied balance increment of {delta_cents} to user {user_id}");

    Ok(())
}

/// Get the user's stored balance in cents.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if `user_id` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_balance(user_id: UserID, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT balance FROM user WHERE id = ?1",
            [user_id.as_i64()],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Sum the signed amounts of the user's entire ledger.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn ledger_total(user_id: UserID, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COALESCE(SUM(CASE kind WHEN 'income' THEN amount ELSE -amount END), 0)
             FROM \"transaction\" WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Overwrite the user's stored balance with the total recomputed from the ledger.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if `user_id` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn reconcile_balance(user_id: UserID, connection: &Connection) -> Result<Reconciliation, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let stored_cents = get_balance(user_id, &sql_transaction)?;
    let computed_cents = ledger_total(user_id, &sql_transaction)?;

    sql_transaction.execute(
        "UPDATE user SET balance = ?1 WHERE id = ?2",
        (computed_cents, user_id.as_i64()),
    )?;
    sql_transaction.commit()?;

    let drift_cents = computed_cents.saturating_sub(stored_cents);
    if drift_cents != 0 {
        tracing::warn!(
            "Balance for user {user_id} drifted by {drift_cents} cents, reset to {computed_cents}"
        );
    }

    Ok(Reconciliation {
        stored_cents,
        computed_cents,
        drift_cents,
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        balance::{Reconciliation, apply_increment, get_balance, ledger_total, reconcile_balance},
        db::initialize,
        transaction::{Transaction, TransactionKind, create_transaction},
        user::{User, UserID, create_user},
    };

    fn get_test_connection() -> (Connection, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Test", None, &conn).unwrap();
        (conn, user)
    }

    #[test]
    fn increments_accumulate() {
        let (conn, user) = get_test_connection();

        apply_increment(user.id, 500, &conn).unwrap();
        apply_increment(user.id, -1_250, &conn).unwrap();

        assert_eq!(get_balance(user.id, &conn), Ok(-750));
    }

    #[test]
    fn increment_fails_for_unknown_user() {
        let (conn, _) = get_test_connection();

        assert_eq!(
            apply_increment(UserID::new(42), 500, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn increment_past_the_limits_leaves_balance_unchanged() {
        let (conn, user) = get_test_connection();
        conn.execute(
            "UPDATE user SET balance = ?1 WHERE id = ?2",
            (i64::MAX - 10, user.id.as_i64()),
        )
        .unwrap();

        assert_eq!(
            apply_increment(user.id, 11, &conn),
            Err(Error::BalanceOutOfRange)
        );
        assert_eq!(get_balance(user.id, &conn), Ok(i64::MAX - 10));

        apply_increment(user.id, 10, &conn).unwrap();
        assert_eq!(get_balance(user.id, &conn), Ok(i64::MAX));
    }

    #[test]
    fn decrement_past_the_limits_is_rejected() {
        let (conn, user) = get_test_connection();
        conn.execute(
            "UPDATE user SET balance = ?1 WHERE id = ?2",
            (i64::MIN, user.id.as_i64()),
        )
        .unwrap();

        assert_eq!(
            apply_increment(user.id, -1, &conn),
            Err(Error::BalanceOutOfRange)
        );
        assert_eq!(get_balance(user.id, &conn), Ok(i64::MIN));
    }

    #[test]
    fn get_balance_fails_for_unknown_user() {
        let (conn, _) = get_test_connection();

        assert_eq!(get_balance(UserID::new(42), &conn), Err(Error::NotFound));
    }

    #[test]
    fn ledger_total_is_zero_for_empty_ledger() {
        let (conn, user) = get_test_connection();

        assert_eq!(ledger_total(user.id, &conn), Ok(0));
    }

    #[test]
    fn ledger_total_ignores_other_users() {
        let (conn, user) = get_test_connection();
        let other_user = create_user("Other", None, &conn).unwrap();
        let today = date!(2025 - 10 - 05);
        create_transaction(
            Transaction::build(TransactionKind::Income, 900, today),
            other_user.id,
            today,
            &conn,
        )
        .unwrap();

        assert_eq!(ledger_total(user.id, &conn), Ok(0));
        assert_eq!(ledger_total(other_user.id, &conn), Ok(900));
    }

    #[test]
    fn reconcile_repairs_drift() {
        let (conn, user) = get_test_connection();
        let today = date!(2025 - 10 - 05);
        create_transaction(
            Transaction::build(TransactionKind::Income, 2_000, today),
            user.id,
            today,
            &conn,
        )
        .unwrap();
        // Simulate a write that bypassed the ledger.
        conn.execute("UPDATE user SET balance = 12345 WHERE id = ?1", [user.id.as_i64()])
            .unwrap();

        let got = reconcile_balance(user.id, &conn).unwrap();

        assert_eq!(
            got,
            Reconciliation {
                stored_cents: 12_345,
                computed_cents: 2_000,
                drift_cents: -10_345,
            }
        );
        assert_eq!(get_balance(user.id, &conn), Ok(2_000));
    }

    #[test]
    fn reconcile_consistent_balance_reports_no_drift() {
        let (conn, user) = get_test_connection();
        let today = date!(2025 - 10 - 05);
        create_transaction(
            Transaction::build(TransactionKind::Expense, 300, today),
            user.id,
            today,
            &conn,
        )
        .unwrap();

        let got = reconcile_balance(user.id, &conn).unwrap();

        assert_eq!(got.drift_cents, 0);
        assert_eq!(got.computed_cents, -300);
    }
}
