//! Cursor based paging through a user's ledger history, newest first.

use rusqlite::{Connection, ToSql};

use crate::{
    Error,
    pagination::{Cursor, Page},
    user::UserID,
};

use super::{
    core::{TRANSACTION_COLUMNS, Transaction, map_transaction_row},
    query::{FILTER_CLAUSE, LedgerFilter},
};

/// Get a page of transactions matching `filter`, ordered newest first.
///
/// Passing the previous page's cursor returns the transactions that come
/// strictly after it in `(date DESC, id DESC)` order. Transactions recorded
/// after the first page was fetched are newer than any cursor handed out, so
/// they never shift the later pages: while the ledger only grows, paging
/// neither repeats nor skips a transaction.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn get_transactions_page(
    user_id: UserID,
    filter: &LedgerFilter,
    cursor: Option<Cursor>,
    page_size: u64,
    connection: &Connection,
) -> Result<Page<Transaction>, Error> {
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
        WHERE {FILTER_CLAUSE} \
        AND (:cursor_date IS NULL OR date < :cursor_date OR (date = :cursor_date AND id < :cursor_id)) \
        ORDER BY date DESC, id DESC \
        LIMIT :limit"
    );

    let filter_params = filter.params(user_id);
    let cursor_date = cursor.map(|cursor| cursor.date);
    let cursor_id = cursor.map(|cursor| cursor.id);
    // One extra row tells us whether there is another page.
    let limit = i64::try_from(page_size.saturating_add(1)).unwrap_or(i64::MAX);

    let mut params = filter_params.named();
    params.extend([
        (":cursor_date", &cursor_date as &dyn ToSql),
        (":cursor_id", &cursor_id as &dyn ToSql),
        (":limit", &limit as &dyn ToSql),
    ]);

    let rows = connection
        .prepare(&query)?
        .query_map(params.as_slice(), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Page::from_overfetched(rows, page_size, |transaction| Cursor {
        date: transaction.date,
        id: transaction.id,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rusqlite::Connection;
    use time::{Date, Duration, macros::date};

    use crate::{
        db::initialize,
        pagination::Cursor,
        transaction::{
            LedgerFilter, Transaction, TransactionKind, create_transaction,
            page::get_transactions_page,
        },
        user::{User, create_user},
    };

    const TODAY: Date = date!(2025 - 10 - 05);

    fn get_test_connection() -> (Connection, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Test", None, &conn).unwrap();
        (conn, user)
    }

    /// Two transactions per day for `days` days ending today.
    fn insert_history(conn: &Connection, user: &User, days: i64) -> Vec<Transaction> {
        let mut transactions = Vec::new();
        for day in (0..days).rev() {
            for amount in [100, 200] {
                transactions.push(
                    create_transaction(
                        Transaction::build(
                            TransactionKind::Expense,
                            amount,
                            TODAY - Duration::days(day),
                        ),
                        user.id,
                        TODAY,
                        conn,
                    )
                    .unwrap(),
                );
            }
        }
        transactions
    }

    #[test]
    fn first_page_is_newest_first() {
        let (conn, user) = get_test_connection();
        let transactions = insert_history(&conn, &user, 5);

        let page =
            get_transactions_page(user.id, &LedgerFilter::default(), None, 3, &conn).unwrap();

        let want: Vec<_> = transactions.iter().rev().take(3).cloned().collect();
        assert_eq!(page.items, want);
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn pages_cover_ledger_without_repeats() {
        let (conn, user) = get_test_connection();
        let transactions = insert_history(&conn, &user, 7);

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page =
                get_transactions_page(user.id, &LedgerFilter::default(), cursor, 4, &conn)
                    .unwrap();
            assert!(page.items.len() <= 4);
            seen.extend(page.items);
            match page.next_cursor {
                Some(token) => cursor = Some(Cursor::decode(&token).unwrap()),
                None => break,
            }
        }

        let mut want = transactions.clone();
        want.reverse();
        assert_eq!(seen, want);
    }

    #[test]
    fn new_transactions_do_not_shift_later_pages() {
        let (conn, user) = get_test_connection();
        let transactions = insert_history(&conn, &user, 3);

        let first =
            get_transactions_page(user.id, &LedgerFilter::default(), None, 2, &conn).unwrap();
        let cursor = Cursor::decode(first.next_cursor.as_deref().unwrap()).unwrap();

        create_transaction(
            Transaction::build(TransactionKind::Income, 999, TODAY),
            user.id,
            TODAY,
            &conn,
        )
        .unwrap();

        let second =
            get_transactions_page(user.id, &LedgerFilter::default(), Some(cursor), 2, &conn)
                .unwrap();

        let want: Vec<_> = transactions.iter().rev().skip(2).take(2).cloned().collect();
        assert_eq!(second.items, want);

        let ids: HashSet<_> = first.items.iter().chain(&second.items).map(|t| t.id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn exact_multiple_has_no_trailing_cursor() {
        let (conn, user) = get_test_connection();
        insert_history(&conn, &user, 2);

        let page =
            get_transactions_page(user.id, &LedgerFilter::default(), None, 4, &conn).unwrap();

        assert_eq!(page.items.len(), 4);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn pages_respect_filter() {
        let (conn, user) = get_test_connection();
        insert_history(&conn, &user, 3);
        create_transaction(
            Transaction::build(TransactionKind::Income, 5_000, TODAY - Duration::days(1))
                .category(Some("Salary")),
            user.id,
            TODAY,
            &conn,
        )
        .unwrap();

        let filter = LedgerFilter::default().with_kind(Some(TransactionKind::Income));
        let page = get_transactions_page(user.id, &filter, None, 10, &conn).unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].category.as_deref(), Some("Salary"));
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn empty_ledger_gives_empty_page() {
        let (conn, user) = get_test_connection();

        let page =
            get_transactions_page(user.id, &LedgerFilter::default(), None, 10, &conn).unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }
}
