//! Shared constants.

/// How far `DateRange::around_today` reaches in each direction, in days.
pub const DEFAULT_HORIZON_DAYS: i64 = 60;
