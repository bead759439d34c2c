use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use tally_rs::{
    DEFAULT_TIMEZONE, Transaction, TransactionKind, create_transaction, create_user,
    initialize_db,
};

/// A utility for creating a test database for the REST API server of tally_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The number of days of transactions to generate, ending today.
    #[arg(long, default_value_t = 180)]
    days: i64,
}

/// Recurring expenses as (description, category, amount in cents, every n days).
const EXPENSES: [(&str, Option<&str>, i64, i64); 5] = [
    ("Rent", Some("Housing"), 120_000, 14),
    ("Supermarket", Some("Groceries"), 14_350, 7),
    ("Bus fare", Some("Transport"), 420, 2),
    ("Coffee", Some("Eating out"), 550, 3),
    ("Cash withdrawal", None, 5_000, 30),
];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");
    let user = create_user("Demo", Some(DEFAULT_TIMEZONE), &conn)?;

    println!("Creating {} days of transactions...", args.days);
    let today = OffsetDateTime::now_utc().date();
    let mut count = 0;

    for days_ago in (0..args.days).rev() {
        let date = today - Duration::days(days_ago);

        if days_ago % 14 == 0 {
            let salary = Transaction::build(TransactionKind::Income, 250_000, date)
                .description("Salary")
                .category(Some("Salary"));
            create_transaction(salary, user.id, today, &conn)?;
            count += 1;
        }

        for (description, category, amount_cents, every) in EXPENSES {
            if days_ago % every != 0 {
                continue;
            }

            // Vary amounts a little so charts are not flat.
            let amount_cents = amount_cents + (days_ago % 5) * amount_cents / 50;
            let expense = Transaction::build(TransactionKind::Expense, amount_cents, date)
                .description(description)
                .category(category);
            create_transaction(expense, user.id, today, &conn)?;
            count += 1;
        }
    }

    println!("Created user {} with {count} transactions.", user.id);
    println!("Success!");

    Ok(())
}
