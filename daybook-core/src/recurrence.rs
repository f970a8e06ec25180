//! Expansion of frequency rules into concrete dates.
//!
//! Turns a [`Frequency`] into the set of dates it selects within a
//! closed range. Pure calendar arithmetic over chrono; no shared state,
//! safe to call concurrently from any number of threads.

use std::collections::HashSet;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::date_range::DateRange;
use crate::error::{DaybookError, DaybookResult};
use crate::frequency::{Frequency, MonthlySchedule, OrdinalPosition, OrdinalRule, StartWeek};

/// Expand `rule` into every date it selects within `range`.
///
/// Returns the empty set when `enabled` is false. A `start_date` raises
/// the range's lower bound; if it passes the upper bound the result is
/// empty. The result is an unordered set of distinct dates; callers
/// sort when they need presentation order.
pub fn expand_rule(
    rule: &Frequency,
    enabled: bool,
    start_date: Option<NaiveDate>,
    range: DateRange,
) -> DaybookResult<HashSet<NaiveDate>> {
    if !enabled {
        return Ok(HashSet::new());
    }

    let range = match start_date {
        Some(start) => match range.with_lower_bound(start) {
            Some(clamped) => clamped,
            None => return Ok(HashSet::new()),
        },
        None => range,
    };

    match rule {
        Frequency::Daily => Ok(range.days().collect()),
        Frequency::Weekly { weekdays } => expand_weekly(weekdays, range, 1, 0),
        Frequency::Biweekly {
            weekdays,
            start_week,
        } => {
            let offset_weeks = match start_week {
                StartWeek::Current => 0,
                StartWeek::Next => 1,
            };
            expand_weekly(weekdays, range, 2, offset_weeks)
        }
        Frequency::Monthly { schedule } => expand_monthly(schedule, range),
    }
}

/// Walk each requested weekday from its first occurrence on/after the
/// range start, stepping by `interval_weeks`.
fn expand_weekly(
    weekdays: &[Weekday],
    range: DateRange,
    interval_weeks: u64,
    offset_weeks: u64,
) -> DaybookResult<HashSet<NaiveDate>> {
    let mut dates = HashSet::new();

    for &weekday in weekdays {
        let first = first_on_or_after(range.from(), weekday)?;
        let mut current = add_days(first, offset_weeks * 7)?;
        while current <= range.to() {
            dates.insert(current);
            current = add_days(current, interval_weeks * 7)?;
        }
    }

    Ok(dates)
}

/// Step month by month across the range, collecting the schedule's
/// dates for each month that fall inside the range.
fn expand_monthly(
    schedule: &MonthlySchedule,
    range: DateRange,
) -> DaybookResult<HashSet<NaiveDate>> {
    let mut dates = HashSet::new();

    let mut month_start = first_of_month(range.from())?;
    while month_start <= range.to() {
        for candidate in dates_in_month(schedule, month_start)? {
            if range.contains(candidate) {
                dates.insert(candidate);
            }
        }
        month_start = add_months(month_start, 1)?;
    }

    Ok(dates)
}

/// All dates a schedule selects within the month starting at
/// `month_start` (always the 1st).
fn dates_in_month(
    schedule: &MonthlySchedule,
    month_start: NaiveDate,
) -> DaybookResult<Vec<NaiveDate>> {
    let month_end = last_of_month(month_start)?;

    let dates = match schedule {
        MonthlySchedule::FirstDay => vec![month_start],
        MonthlySchedule::SecondDay => vec![add_days(month_start, 1)?],
        MonthlySchedule::MidMonth => vec![with_day(month_start, 15)?],
        MonthlySchedule::LastDay => vec![month_end],
        MonthlySchedule::SecondToLastDay => vec![sub_days(month_end, 1)?],
        MonthlySchedule::DaysOfMonth(days) => days
            .iter()
            // Months too short for a day number skip it (no Nov 31)
            .filter_map(|&day| month_start.with_day(day))
            .collect(),
        MonthlySchedule::WeekdayOrdinals(rules) => {
            let mut dates = Vec::new();
            for rule in rules {
                ordinal_dates_in_month(rule, month_start, month_end, &mut dates)?;
            }
            dates
        }
    };

    Ok(dates)
}

/// The Nth occurrence of each of the rule's weekdays within one month.
/// `First..Fourth` count forward from the 1st; `Last`/`SecondToLast`
/// count backward from the month's final day. All six positions exist
/// in every month.
fn ordinal_dates_in_month(
    rule: &OrdinalRule,
    month_start: NaiveDate,
    month_end: NaiveDate,
    dates: &mut Vec<NaiveDate>,
) -> DaybookResult<()> {
    for &weekday in &rule.weekdays {
        let date = match rule.position {
            OrdinalPosition::First => first_on_or_after(month_start, weekday)?,
            OrdinalPosition::Second => add_days(first_on_or_after(month_start, weekday)?, 7)?,
            OrdinalPosition::Third => add_days(first_on_or_after(month_start, weekday)?, 14)?,
            OrdinalPosition::Fourth => add_days(first_on_or_after(month_start, weekday)?, 21)?,
            OrdinalPosition::Last => last_on_or_before(month_end, weekday)?,
            OrdinalPosition::SecondToLast => {
                sub_days(last_on_or_before(month_end, weekday)?, 7)?
            }
        };
        dates.push(date);
    }
    Ok(())
}

// =============================================================================
// Calendar helpers
// =============================================================================

fn add_days(date: NaiveDate, days: u64) -> DaybookResult<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| DaybookError::DateComputation(format!("cannot add {days} days to {date}")))
}

fn sub_days(date: NaiveDate, days: u64) -> DaybookResult<NaiveDate> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| {
            DaybookError::DateComputation(format!("cannot subtract {days} days from {date}"))
        })
}

fn add_months(date: NaiveDate, months: u32) -> DaybookResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| {
            DaybookError::DateComputation(format!("cannot add {months} months to {date}"))
        })
}

fn with_day(date: NaiveDate, day: u32) -> DaybookResult<NaiveDate> {
    date.with_day(day).ok_or_else(|| {
        DaybookError::DateComputation(format!("no day {day} in month of {date}"))
    })
}

fn first_of_month(date: NaiveDate) -> DaybookResult<NaiveDate> {
    with_day(date, 1)
}

fn last_of_month(month_start: NaiveDate) -> DaybookResult<NaiveDate> {
    let next_month = add_months(month_start, 1)?;
    next_month.pred_opt().ok_or_else(|| {
        DaybookError::DateComputation(format!("no predecessor for {next_month}"))
    })
}

/// First date on/after `date` falling on `weekday`.
fn first_on_or_after(date: NaiveDate, weekday: Weekday) -> DaybookResult<NaiveDate> {
    let ahead =
        (weekday.num_days_from_monday() + 7 - date.weekday().num_days_from_monday()) % 7;
    add_days(date, u64::from(ahead))
}

/// Last date on/before `date` falling on `weekday`.
fn last_on_or_before(date: NaiveDate, weekday: Weekday) -> DaybookResult<NaiveDate> {
    let behind =
        (date.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
    sub_days(date, u64::from(behind))
}
