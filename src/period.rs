//! Resolves the calendar boundaries of the periods that scope ledger queries.
//!
//! All ranges are inclusive of both their start and end date. Weeks start on
//! Monday, every other period is aligned to the calendar.

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, macros::time};

/// The length of time covered by a view, or by one bucket of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    /// A single day.
    Day,
    /// Monday to Sunday.
    Week,
    /// A calendar month.
    Month,
    /// January-March, April-June, July-September or October-December.
    Quarter,
    /// A calendar year.
    Year,
}

impl Period {
    /// The period used when a request does not specify one.
    pub fn default_preset() -> Self {
        Self::Month
    }

    /// A sensible bucket size for charting a series over this period.
    pub fn default_interval(self) -> Self {
        match self {
            Self::Day | Self::Week => Self::Day,
            Self::Month => Self::Week,
            Self::Quarter | Self::Year => Self::Month,
        }
    }
}

/// An inclusive range of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// The first day in the range.
    pub start: Date,
    /// The last day in the range.
    pub end: Date,
}

impl DateRange {
    /// Whether `date` falls within the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// The number of days covered by the range.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }

    /// Convert the range into UTC instants as seen from a timezone at `offset`.
    ///
    /// The start is midnight at the beginning of `start` (inclusive) and the
    /// end is midnight at the beginning of the day after `end` (exclusive).
    ///
    /// Returns `None` if either instant falls outside the supported calendar
    /// once shifted to UTC, which can only happen at its first or last day.
    pub fn to_utc_bounds(&self, offset: UtcOffset) -> Option<(OffsetDateTime, OffsetDateTime)> {
        let to_utc = |date: Date, time: Time| {
            PrimitiveDateTime::new(date, time)
                .assume_offset(offset)
                .checked_to_offset(UtcOffset::UTC)
        };

        let start = to_utc(self.start, Time::MIDNIGHT)?;
        let end = match self.end.next_day() {
            Some(day_after) => to_utc(day_after, Time::MIDNIGHT)?,
            None => to_utc(self.end, time!(23:59:59.999_999_999))?,
        };

        Some((start, end))
    }
}

/// Get the range of the `period` that contains `anchor`.
pub fn resolve_period(period: Period, anchor: Date) -> DateRange {
    match period {
        Period::Day => DateRange {
            start: anchor,
            end: anchor,
        },
        Period::Week => week_bounds(anchor),
        Period::Month => month_bounds(anchor.year(), anchor.month()),
        Period::Quarter => quarter_bounds(anchor.year(), anchor.month()),
        Period::Year => year_bounds(anchor.year()),
    }
}

/// The `period` immediately before `range`, or `None` at the start of the calendar.
pub fn previous(period: Period, range: DateRange) -> Option<DateRange> {
    range
        .start
        .previous_day()
        .map(|anchor| resolve_period(period, anchor))
}

/// The `period` immediately after `range`, or `None` at the end of the calendar.
pub fn next(period: Period, range: DateRange) -> Option<DateRange> {
    range
        .end
        .next_day()
        .map(|anchor| resolve_period(period, anchor))
}

/// The current range of a view, with links to its neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodNavigation {
    /// The period being navigated.
    pub period: Period,
    /// The range on display.
    pub range: DateRange,
    /// The preceding range, if it contains any of the ledger.
    pub previous: Option<DateRange>,
    /// The following range, if it contains any of the ledger.
    pub next: Option<DateRange>,
}

impl PeriodNavigation {
    /// Create navigation for `range`.
    ///
    /// `bounds` is the range of dates spanned by the ledger. Neighbouring
    /// ranges are only offered when they overlap it, so an empty ledger has
    /// no neighbours.
    pub fn new(period: Period, range: DateRange, bounds: Option<DateRange>) -> Self {
        let (previous, next) = match bounds {
            Some(bounds) => (
                previous(period, range).filter(|prev| prev.end >= bounds.start),
                next(period, range).filter(|next| next.start <= bounds.end),
            ),
            None => (None, None),
        };

        Self {
            period,
            range,
            previous,
            next,
        }
    }
}

/// Split `range` into consecutive `interval` ranges.
///
/// The first and last bucket are clipped to `range`, so a weekly split of a
/// month starts and ends on the first and last of the month.
pub fn split_into_buckets(range: DateRange, interval: Period) -> Vec<DateRange> {
    let mut buckets = Vec::new();
    let mut cursor = Some(range.start);

    while let Some(anchor) = cursor.filter(|anchor| *anchor <= range.end) {
        let bucket = resolve_period(interval, anchor);

        buckets.push(DateRange {
            start: bucket.start.max(range.start),
            end: bucket.end.min(range.end),
        });

        cursor = bucket.end.next_day();
    }

    buckets
}

fn week_bounds(anchor_date: Date) -> DateRange {
    let days_from_monday = anchor_date.weekday().number_days_from_monday() as i64;
    let start = anchor_date
        .checked_sub(time::Duration::days(days_from_monday))
        .unwrap_or(Date::MIN);
    let end = start
        .checked_add(time::Duration::days(6))
        .unwrap_or(Date::MAX);

    DateRange { start, end }
}

fn month_bounds(year: i32, month: Month) -> DateRange {
    DateRange {
        start: first_of_month(year, month),
        end: last_of_month(year, month),
    }
}

fn quarter_bounds(year: i32, month: Month) -> DateRange {
    let quarter_start = ((u8::from(month) - 1) / 3) * 3 + 1;
    let start_month = Month::try_from(quarter_start).expect("invalid quarter start month");
    let end_month = Month::try_from(quarter_start + 2).expect("invalid quarter end month");

    DateRange {
        start: first_of_month(year, start_month),
        end: last_of_month(year, end_month),
    }
}

fn year_bounds(year: i32) -> DateRange {
    DateRange {
        start: first_of_month(year, Month::January),
        end: last_of_month(year, Month::December),
    }
}

fn first_of_month(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).expect("invalid month start date")
}

fn last_of_month(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, last_day_of_month(year, month))
        .expect("invalid month end date")
}

fn last_day_of_month(year: i32, month: Month) -> u8 {
    match month {
        Month::January
        | Month::March
        | Month::May
        | Month::July
        | Month::August
        | Month::October
        | Month::December => 31,
        Month::April | Month::June | Month::September | Month::November => 30,
        Month::February => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
