//! Aggregated views of a user's ledger.
//!
//! This module contains:
//! - Pure aggregation functions for summaries, category breakdowns and series
//! - Route handlers for the summary, breakdown, series and live summary endpoints

mod aggregation;
mod handlers;

pub use aggregation::{
    BucketSummary, CategoryTotal, PeriodSummary, bucket_series, category_breakdown,
    running_balances, summarise,
};
pub use handlers::{
    get_breakdown_endpoint, get_live_summary_endpoint, get_series_endpoint, get_summary_endpoint,
};
