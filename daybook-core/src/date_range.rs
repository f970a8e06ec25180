//! Closed date range for materialization and reconciliation.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_HORIZON_DAYS;
use crate::error::{DaybookError, DaybookResult};

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Build a range; fails if `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> DaybookResult<Self> {
        if from > to {
            return Err(DaybookError::RangeConstruction(format!(
                "{from} is after {to}"
            )));
        }
        Ok(DateRange { from, to })
    }

    /// The range covering a single date.
    pub fn single(date: NaiveDate) -> Self {
        DateRange {
            from: date,
            to: date,
        }
    }

    /// Default materialization window: ±DEFAULT_HORIZON_DAYS around today.
    pub fn around_today() -> Self {
        let today = Utc::now().date_naive();
        DateRange {
            from: today - Duration::days(DEFAULT_HORIZON_DAYS),
            to: today + Duration::days(DEFAULT_HORIZON_DAYS),
        }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Raise the lower bound to `bound` if it is later than `from`.
    /// Returns `None` when the raised bound passes `to`, i.e. the range
    /// became empty.
    pub fn with_lower_bound(&self, bound: NaiveDate) -> Option<DateRange> {
        let from = self.from.max(bound);
        if from > self.to {
            return None;
        }
        Some(DateRange { from, to: self.to })
    }

    /// Iterate every date in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let to = self.to;
        self.from.iter_days().take_while(move |date| *date <= to)
    }
}
