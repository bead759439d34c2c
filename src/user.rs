//! Code for creating the user table and fetching user profiles from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, timezone::get_local_offset};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application and the owner of a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name to display for the user.
    pub name: String,
    /// The sum of the user's ledger, in cents.
    ///
    /// This is a cached total that is updated with every ledger mutation, see
    /// [crate::balance].
    pub balance_cents: i64,
    /// The user's canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// When `None` the server's timezone is used to decide what "today" is.
    pub timezone: Option<String>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                balance INTEGER NOT NULL DEFAULT 0,
                timezone TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user with a zero balance into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::EmptyUserName] if `name` is empty or only whitespace,
/// - [Error::InvalidTimezone] if `timezone` is not a canonical timezone name,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn create_user(
    name: &str,
    timezone: Option<&str>,
    connection: &Connection,
) -> Result<User, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::EmptyUserName);
    }

    if let Some(timezone) = timezone
        && get_local_offset(timezone).is_none()
    {
        return Err(Error::InvalidTimezone(timezone.to_owned()));
    }

    connection
        .prepare(
            "INSERT INTO user (name, timezone) VALUES (?1, ?2)
             RETURNING id, name, balance, timezone",
        )?
        .query_row((name, timezone), map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, balance, timezone FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        balance_cents: row.get(2)?,
        timezone: row.get(3)?,
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::user::{UserID, count_users, create_user, get_user_by_id};

    use super::{Error, create_user_table};

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user("Alice", None, &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.name, "Alice");
        assert_eq!(inserted_user.balance_cents, 0);
        assert_eq!(inserted_user.timezone, None);
    }

    #[test]
    fn insert_user_trims_name() {
        let db_connection = get_db_connection();

        let inserted_user = create_user("  Bob ", None, &db_connection).unwrap();

        assert_eq!(inserted_user.name, "Bob");
    }

    #[test]
    fn insert_user_fails_with_empty_name() {
        let db_connection = get_db_connection();

        assert_eq!(
            create_user("   ", None, &db_connection),
            Err(Error::EmptyUserName)
        );
    }

    #[test]
    fn insert_user_fails_with_unknown_timezone() {
        let db_connection = get_db_connection();

        assert_eq!(
            create_user("Alice", Some("Atlantis/Capital"), &db_connection),
            Err(Error::InvalidTimezone("Atlantis/Capital".to_owned()))
        );
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let id = UserID::new(42);

        assert_eq!(get_user_by_id(id, &db_connection), Err(Error::NotFound));
    }

    #[test]
    fn get_user_succeeds_with_existing_id() {
        let db_connection = get_db_connection();
        let test_user = create_user("Alice", Some("Pacific/Auckland"), &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn returns_correct_count() {
        let db_connection = get_db_connection();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(0, count, "Want zero users before insertion, got {count}");

        create_user("Alice", None, &db_connection).unwrap();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(1, count, "Want one user after insertion, got {count}");
    }
}
