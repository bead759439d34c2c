//! Transaction aggregation for summaries, breakdowns and charts.
//!
//! Provides functions to total transactions per period, per category and per
//! bucket of a series, and to reconstruct the running balance over a series.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    period::{DateRange, Period, split_into_buckets},
    transaction::{Transaction, TransactionKind, UNCATEGORISED_LABEL},
};

/// Running totals for a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Total income in cents.
    pub income_cents: i64,
    /// Total expenses in cents, as a positive number.
    pub expense_cents: i64,
    /// `income_cents - expense_cents`.
    pub net_cents: i64,
    /// The number of transactions summed.
    pub count: u64,
}

impl PeriodSummary {
    /// Include `transaction` in the totals.
    ///
    /// Totals saturate at the limits of `i64` rather than overflowing.
    pub fn add(&mut self, transaction: &Transaction) {
        match transaction.kind {
            TransactionKind::Income => {
                self.income_cents = self.income_cents.saturating_add(transaction.amount_cents)
            }
            TransactionKind::Expense => {
                self.expense_cents = self.expense_cents.saturating_add(transaction.amount_cents)
            }
        }
        self.net_cents = self.net_cents.saturating_add(transaction.signed_amount());
        self.count = self.count.saturating_add(1);
    }

    /// Take `transaction` back out of the totals.
    ///
    /// The caller must only remove transactions that were previously added.
    pub fn remove(&mut self, transaction: &Transaction) {
        match transaction.kind {
            TransactionKind::Income => {
                self.income_cents = self.income_cents.saturating_sub(transaction.amount_cents)
            }
            TransactionKind::Expense => {
                self.expense_cents = self.expense_cents.saturating_sub(transaction.amount_cents)
            }
        }
        self.net_cents = self.net_cents.saturating_sub(transaction.signed_amount());
        self.count = self.count.saturating_sub(1);
    }
}

/// Sum a set of transactions.
pub fn summarise<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> PeriodSummary {
    let mut summary = PeriodSummary::default();
    for transaction in transactions {
        summary.add(transaction);
    }
    summary
}

/// The total for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// The category label, [UNCATEGORISED_LABEL] for transactions without one.
    pub category: String,
    /// The total amount in cents, as a positive number.
    pub total_cents: i64,
    /// The number of transactions in the category.
    pub count: u64,
    /// The category's share of the total across all categories, from 0 to 1.
    pub share: f64,
}

/// Total the transactions of one `kind` per category.
///
/// Categories are sorted largest first, ties alphabetically, with the
/// uncategorised total always last.
pub fn category_breakdown(
    transactions: &[Transaction],
    kind: TransactionKind,
) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, (i64, u64)> = HashMap::new();

    for transaction in transactions.iter().filter(|t| t.kind == kind) {
        let category = transaction
            .category
            .as_deref()
            .unwrap_or(UNCATEGORISED_LABEL);
        let entry = totals.entry(category).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(transaction.amount_cents);
        entry.1 += 1;
    }

    let grand_total = totals
        .values()
        .fold(0_i64, |sum, (total, _)| sum.saturating_add(*total));

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total_cents, count))| CategoryTotal {
            category: category.to_owned(),
            total_cents,
            count,
            share: if grand_total == 0 {
                0.0
            } else {
                total_cents as f64 / grand_total as f64
            },
        })
        .collect();

    breakdown.sort_by(|a, b| {
        let a_uncategorised = a.category == UNCATEGORISED_LABEL;
        let b_uncategorised = b.category == UNCATEGORISED_LABEL;

        a_uncategorised
            .cmp(&b_uncategorised)
            .then(b.total_cents.cmp(&a.total_cents))
            .then(a.category.cmp(&b.category))
    });

    breakdown
}

/// The summary of one bucket in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    /// The dates covered by the bucket.
    pub range: DateRange,
    /// The totals for the transactions in the bucket.
    pub summary: PeriodSummary,
}

/// Split `range` into `interval` buckets and total the transactions in each.
///
/// Buckets without transactions are included with zero totals, and
/// transactions outside `range` are ignored.
pub fn bucket_series(
    transactions: &[Transaction],
    range: DateRange,
    interval: Period,
) -> Vec<BucketSummary> {
    let mut series: Vec<BucketSummary> = split_into_buckets(range, interval)
        .into_iter()
        .map(|range| BucketSummary {
            range,
            summary: PeriodSummary::default(),
        })
        .collect();

    for transaction in transactions {
        // Buckets are sorted and contiguous, so a binary search finds the owner.
        let index = series.partition_point(|bucket| bucket.range.end < transaction.date);
        if let Some(bucket) = series.get_mut(index)
            && bucket.range.contains(transaction.date)
        {
            bucket.summary.add(transaction);
        }
    }

    series
}

/// Calculates the balance at the end of each bucket by working backwards from
/// the current balance.
///
/// `later_net_cents` is the net of every transaction dated after the series,
/// which is already included in `current_balance_cents`.
pub fn running_balances(
    current_balance_cents: i64,
    later_net_cents: i64,
    series: &[BucketSummary],
) -> Vec<i64> {
    let mut balances = Vec::with_capacity(series.len());
    let mut balance = current_balance_cents.saturating_sub(later_net_cents);

    for bucket in series.iter().rev() {
        balances.push(balance);
        balance = balance.saturating_sub(bucket.summary.net_cents);
    }

    balances.reverse();
    balances
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::date};

    use crate::{
        period::{DateRange, Period},
        summary::aggregation::{
            CategoryTotal, PeriodSummary, bucket_series, category_breakdown, running_balances,
            summarise,
        },
        transaction::{Transaction, TransactionKind, UNCATEGORISED_LABEL},
        user::UserID,
    };

    fn create_test_transaction(
        kind: TransactionKind,
        amount_cents: i64,
        date: time::Date,
        category: Option<&str>,
    ) -> Transaction {
        Transaction {
            id: 0,
            user_id: UserID::new(1),
            kind,
            amount_cents,
            date,
            description: String::new(),
            category: category.map(str::to_owned),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn summarise_separates_income_and_expenses() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 10_000, date!(2024 - 01 - 15), None),
            create_test_transaction(TransactionKind::Expense, 2_500, date!(2024 - 01 - 20), None),
            create_test_transaction(TransactionKind::Expense, 500, date!(2024 - 02 - 10), None),
        ];

        let got = summarise(&transactions);

        assert_eq!(
            got,
            PeriodSummary {
                income_cents: 10_000,
                expense_cents: 3_000,
                net_cents: 7_000,
                count: 3,
            }
        );
    }

    #[test]
    fn remove_undoes_add() {
        let income =
            create_test_transaction(TransactionKind::Income, 700, date!(2024 - 01 - 15), None);
        let expense =
            create_test_transaction(TransactionKind::Expense, 300, date!(2024 - 01 - 15), None);
        let mut summary = summarise([&income]);

        summary.add(&expense);
        summary.remove(&expense);

        assert_eq!(summary, summarise([&income]));
    }

    #[test]
    fn breakdown_sorts_by_total_with_uncategorised_last() {
        let transactions = vec![
            create_test_transaction(TransactionKind::Expense, 5_000, date!(2024 - 01 - 15), None),
            create_test_transaction(
                TransactionKind::Expense,
                1_000,
                date!(2024 - 01 - 15),
                Some("Transport"),
            ),
            create_test_transaction(
                TransactionKind::Expense,
                3_000,
                date!(2024 - 01 - 16),
                Some("Food"),
            ),
            create_test_transaction(
                TransactionKind::Expense,
                1_000,
                date!(2024 - 01 - 17),
                Some("Food"),
            ),
            // Income is excluded from an expense breakdown.
            create_test_transaction(
                TransactionKind::Income,
                90_000,
                date!(2024 - 01 - 17),
                Some("Salary"),
            ),
        ];

        let got = category_breakdown(&transactions, TransactionKind::Expense);

        assert_eq!(
            got,
            vec![
                CategoryTotal {
                    category: "Food".to_owned(),
                    total_cents: 4_000,
                    count: 2,
                    share: 0.4,
                },
                CategoryTotal {
                    category: "Transport".to_owned(),
                    total_cents: 1_000,
                    count: 1,
                    share: 0.1,
                },
                CategoryTotal {
                    category: UNCATEGORISED_LABEL.to_owned(),
                    total_cents: 5_000,
                    count: 1,
                    share: 0.5,
                },
            ]
        );
    }

    #[test]
    fn breakdown_of_empty_input_is_empty() {
        assert!(category_breakdown(&[], TransactionKind::Income).is_empty());
    }

    #[test]
    fn bucket_series_includes_empty_buckets() {
        let range = DateRange {
            start: date!(2024 - 01 - 01),
            end: date!(2024 - 03 - 31),
        };
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 1_000, date!(2024 - 01 - 31), None),
            create_test_transaction(TransactionKind::Expense, 400, date!(2024 - 03 - 01), None),
            // Outside the range.
            create_test_transaction(TransactionKind::Expense, 999, date!(2024 - 04 - 01), None),
        ];

        let got = bucket_series(&transactions, range, Period::Month);

        assert_eq!(got.len(), 3);
        assert_eq!(got[0].summary.net_cents, 1_000);
        assert_eq!(got[1].summary, PeriodSummary::default());
        assert_eq!(got[2].summary.net_cents, -400);
        assert_eq!(got[2].range.end, date!(2024 - 03 - 31));
    }

    #[test]
    fn running_balances_work_backwards() {
        let range = DateRange {
            start: date!(2024 - 01 - 01),
            end: date!(2024 - 03 - 31),
        };
        let transactions = vec![
            create_test_transaction(TransactionKind::Income, 1_000, date!(2024 - 01 - 31), None),
            create_test_transaction(TransactionKind::Expense, 400, date!(2024 - 03 - 01), None),
        ];
        let series = bucket_series(&transactions, range, Period::Month);

        // 10_000 now, of which 250 was earned after March.
        let got = running_balances(10_000, 250, &series);

        assert_eq!(got, vec![10_150, 10_150, 9_750]);
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let day = date!(2025 - 10 - 01);
        let transactions = [
            create_test_transaction(TransactionKind::Income, i64::MAX, day, None),
            create_test_transaction(TransactionKind::Income, i64::MAX, day, None),
            create_test_transaction(TransactionKind::Expense, i64::MAX, day, Some("Rent")),
            create_test_transaction(TransactionKind::Expense, i64::MAX, day, Some("Food")),
        ];

        let summary = summarise(&transactions);

        assert_eq!(summary.income_cents, i64::MAX);
        assert_eq!(summary.expense_cents, i64::MAX);
        assert_eq!(summary.count, 4);

        let breakdown = category_breakdown(&transactions, TransactionKind::Expense);
        assert_eq!(breakdown.len(), 2);
        assert!(breakdown.iter().all(|total| total.total_cents == i64::MAX));
    }

    #[test]
    fn running_balances_saturate_at_the_limits() {
        let range = DateRange {
            start: date!(2025 - 10 - 01),
            end: date!(2025 - 10 - 01),
        };
        let income = [create_test_transaction(
            TransactionKind::Income,
            i64::MAX,
            date!(2025 - 10 - 01),
            None,
        )];
        let series = bucket_series(&income, range, Period::Day);

        let balances = running_balances(i64::MIN, i64::MAX, &series);

        assert_eq!(balances, vec![i64::MIN]);
    }
}
