//! Repository contracts the engine reads and writes through.
//!
//! Implementations live outside the engine (the bundled
//! [`MemoryStore`] excepted); the materializer is constructed over
//! trait objects and never resolves storage ambiently.

mod memory;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use daybook_core::{DateRange, Day, DayActivity, DayActivityTask, DaybookResult};

/// Persistence for `Day` aggregates.
///
/// While replicas are converging, `load_range` may surface more than
/// one row per date; the materializer resolves those. `load_by_date`
/// returns one row per date and must pick deterministically when
/// duplicates exist.
#[async_trait]
pub trait DayStore: Send + Sync {
    async fn load_all(&self) -> DaybookResult<Vec<Day>>;

    async fn load_range(&self, range: DateRange) -> DaybookResult<Vec<Day>>;

    async fn load_by_date(&self, date: NaiveDate) -> DaybookResult<Option<Day>>;

    async fn load_by_id(&self, id: Uuid) -> DaybookResult<Option<Day>>;

    /// Insert or overwrite one day row (and its embedded occurrences).
    async fn save(&self, day: &Day) -> DaybookResult<()>;

    async fn save_many(&self, days: &[Day]) -> DaybookResult<()>;

    /// Delete one day row. Does not cascade to occurrence records;
    /// the caller decides which of those die with it.
    async fn remove(&self, day: &Day) -> DaybookResult<()>;
}

/// Deletion of occurrence records that fell out of their day.
#[async_trait]
pub trait OccurrenceStore: Send + Sync {
    async fn remove_activity(&self, activity: &DayActivity) -> DaybookResult<()>;

    async fn remove_task(&self, task: &DayActivityTask) -> DaybookResult<()>;
}
