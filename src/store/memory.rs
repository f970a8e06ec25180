//! In-memory store, for tests and storeless embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use daybook_core::{DateRange, Day, DayActivity, DayActivityTask, DaybookResult};

use crate::store::{DayStore, OccurrenceStore};

/// Map-backed implementation of both repository traits.
///
/// Day rows are keyed by id, so duplicate rows for one date are
/// representable, exactly like a replicated backend mid-convergence.
/// Removed occurrence records are logged so callers can observe
/// cascade deletions.
#[derive(Default)]
pub struct MemoryStore {
    days: Mutex<HashMap<Uuid, Day>>,
    removed_activities: Mutex<Vec<Uuid>>,
    removed_tasks: Mutex<Vec<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day_count(&self) -> usize {
        self.days.lock().expect("store lock").len()
    }

    /// Ids of activity records removed so far, in removal order.
    pub fn removed_activity_ids(&self) -> Vec<Uuid> {
        self.removed_activities.lock().expect("store lock").clone()
    }

    /// Ids of task records removed so far, in removal order.
    pub fn removed_task_ids(&self) -> Vec<Uuid> {
        self.removed_tasks.lock().expect("store lock").clone()
    }

    fn sorted(mut days: Vec<Day>) -> Vec<Day> {
        days.sort_by_key(|day| (day.date, day.id));
        days
    }
}

#[async_trait]
impl DayStore for MemoryStore {
    async fn load_all(&self) -> DaybookResult<Vec<Day>> {
        let days = self.days.lock().expect("store lock");
        Ok(Self::sorted(days.values().cloned().collect()))
    }

    async fn load_range(&self, range: DateRange) -> DaybookResult<Vec<Day>> {
        let days = self.days.lock().expect("store lock");
        Ok(Self::sorted(
            days.values()
                .filter(|day| range.contains(day.date))
                .cloned()
                .collect(),
        ))
    }

    async fn load_by_date(&self, date: NaiveDate) -> DaybookResult<Option<Day>> {
        let days = self.days.lock().expect("store lock");
        // Lowest id wins so duplicate rows resolve the same way every call
        Ok(days
            .values()
            .filter(|day| day.date == date)
            .min_by_key(|day| day.id)
            .cloned())
    }

    async fn load_by_id(&self, id: Uuid) -> DaybookResult<Option<Day>> {
        let days = self.days.lock().expect("store lock");
        Ok(days.get(&id).cloned())
    }

    async fn save(&self, day: &Day) -> DaybookResult<()> {
        let mut days = self.days.lock().expect("store lock");
        days.insert(day.id, day.clone());
        Ok(())
    }

    async fn save_many(&self, to_save: &[Day]) -> DaybookResult<()> {
        let mut days = self.days.lock().expect("store lock");
        for day in to_save {
            days.insert(day.id, day.clone());
        }
        Ok(())
    }

    async fn remove(&self, day: &Day) -> DaybookResult<()> {
        let mut days = self.days.lock().expect("store lock");
        days.remove(&day.id);
        Ok(())
    }
}

#[async_trait]
impl OccurrenceStore for MemoryStore {
    async fn remove_activity(&self, activity: &DayActivity) -> DaybookResult<()> {
        self.removed_activities
            .lock()
            .expect("store lock")
            .push(activity.id);
        Ok(())
    }

    async fn remove_task(&self, task: &DayActivityTask) -> DaybookResult<()> {
        self.removed_tasks.lock().expect("store lock").push(task.id);
        Ok(())
    }
}
