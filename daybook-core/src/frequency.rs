//! Frequency rules for recurring activities.
//!
//! A closed set of rule shapes, not general RRULE: templates pick one of
//! these and the evaluator in [`crate::recurrence`] expands it. Matches
//! on these types must stay exhaustive so new shapes cannot be added
//! without teaching the evaluator about them.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// How often an activity recurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Every single day.
    Daily,
    /// On the given weekdays, every week.
    Weekly { weekdays: Vec<Weekday> },
    /// On the given weekdays, every other week.
    Biweekly {
        weekdays: Vec<Weekday>,
        start_week: StartWeek,
    },
    /// Once or more per month, per the schedule.
    Monthly { schedule: MonthlySchedule },
}

/// Which week a biweekly rule starts counting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartWeek {
    /// The first matching occurrence on/after the range start.
    Current,
    /// Skip one week: start at the second matching occurrence.
    Next,
}

/// The day-selection scheme of a monthly rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthlySchedule {
    FirstDay,
    SecondDay,
    /// The 15th.
    MidMonth,
    LastDay,
    SecondToLastDay,
    /// Specific day numbers; months too short for a number skip it.
    DaysOfMonth(Vec<u32>),
    /// Nth weekday of the month, e.g. "second Tuesday".
    WeekdayOrdinals(Vec<OrdinalRule>),
}

/// One "Nth weekday" selection within a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalRule {
    pub position: OrdinalPosition,
    pub weekdays: Vec<Weekday>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinalPosition {
    First,
    Second,
    Third,
    Fourth,
    SecondToLast,
    Last,
}
