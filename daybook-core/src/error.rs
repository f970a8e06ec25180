//! Error types for the daybook engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur in daybook operations.
#[derive(Error, Debug)]
pub enum DaybookError {
    /// Calendar arithmetic could not produce a valid date from valid
    /// inputs. Not user-recoverable; log as a defect.
    #[error("Date computation failed: {0}")]
    DateComputation(String),

    /// An operation required a day that was not found.
    #[error("No day exists for {0}")]
    MissingDay(NaiveDate),

    /// Could not establish a date range to update.
    #[error("Range construction failed: {0}")]
    RangeConstruction(String),

    /// A store implementation failed; carried through unmodified.
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type alias for daybook operations.
pub type DaybookResult<T> = Result<T, DaybookError>;
