//! Shared types for the daybook engine.
//!
//! This crate holds the pure domain layer used by the `daybook` engine:
//! - `Day`, `DayActivity` and `DayActivityTask` aggregates
//! - `ActivityTemplate` definitions and their `Frequency` rules
//! - recurrence expansion (`expand_rule`) over closed date ranges
//!
//! Nothing here performs I/O; everything is deterministic and safe to
//! call from any thread.

pub mod constants;
pub mod date_range;
pub mod day;
pub mod error;
pub mod frequency;
pub mod recurrence;
pub mod template;

// Re-export the main types at crate root for convenience
pub use date_range::DateRange;
pub use day::{Day, DayActivity, DayActivityTask};
pub use error::{DaybookError, DaybookResult};
pub use frequency::{Frequency, MonthlySchedule, OrdinalPosition, OrdinalRule, StartWeek};
pub use recurrence::expand_rule;
pub use template::{ActivityTemplate, TaskTemplate};
