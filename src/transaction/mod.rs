//! Transaction management for a user's ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and paging through transactions
//! - Route handlers for the transaction API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod list_endpoint;
mod page;
mod query;

pub use core::{
    MAX_AMOUNT_CENTS, Transaction, TransactionBuilder, TransactionKind, count_transactions,
    create_transaction, create_transaction_table, delete_transaction, get_transaction,
    update_transaction,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::{get_transaction_endpoint, update_transaction_endpoint};
pub use list_endpoint::{get_categories_endpoint, get_transactions_endpoint};
pub use page::get_transactions_page;
pub use query::{
    LedgerFilter, SortOrder, UNCATEGORISED_LABEL, get_transaction_date_bounds, list_categories,
    query_summary, query_transactions,
};
