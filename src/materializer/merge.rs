//! Duplicate-day resolution.
//!
//! Two replicas that materialize or edit the same date while apart each
//! produce their own `Day` row; once the change feed brings both rows
//! to one store, the rows must collapse into one. This is the engine's
//! only conflict-resolution mechanism, so it has to be safe to run
//! repeatedly and to produce the same survivor on every replica.

use std::collections::HashMap;

use daybook_core::{Day, DayActivity};

/// Outcome of collapsing duplicate `Day` rows for one date.
pub struct MergeOutcome {
    /// The surviving row, now holding the merged occurrence list.
    pub winner: Day,
    /// Rows that lost; delete their records.
    pub discarded_days: Vec<Day>,
    /// Occurrences that lost their name group; delete their records.
    pub discarded_activities: Vec<DayActivity>,
}

/// Collapse duplicate rows for a single date into one.
///
/// Rows are ordered by id first so every replica picks the same
/// survivor. Auto-generated occurrences are grouped by name (the
/// stable proxy for "same template, same date"); within a group the
/// first completed member wins the slot, else the first member, and
/// completion always survives the collapse. User-created occurrences
/// are never grouped — each one is independent user data.
pub fn merge_duplicate_days(mut rows: Vec<Day>) -> MergeOutcome {
    rows.sort_by_key(|day| day.id);

    let mut iter = rows.into_iter();
    let mut winner = iter.next().expect("merge requires at least one row");

    let mut all: Vec<DayActivity> = winner.activities.drain(..).collect();
    let mut discarded_days = Vec::new();
    for mut row in iter {
        all.extend(row.activities.drain(..));
        discarded_days.push(row);
    }

    let mut merged: Vec<DayActivity> = Vec::new();
    let mut slot_by_name: HashMap<String, usize> = HashMap::new();
    let mut discarded_activities = Vec::new();

    for activity in all {
        if !activity.generated {
            merged.push(activity);
            continue;
        }
        match slot_by_name.get(&activity.name) {
            None => {
                slot_by_name.insert(activity.name.clone(), merged.len());
                merged.push(activity);
            }
            Some(&slot) => {
                let kept = &mut merged[slot];
                if activity.is_done() && !kept.is_done() {
                    // First completed member takes the slot
                    let loser = std::mem::replace(kept, activity);
                    discarded_activities.push(loser);
                } else {
                    discarded_activities.push(activity);
                }
            }
        }
    }

    for activity in &mut merged {
        activity.day_id = winner.id;
    }
    winner.activities = merged;

    MergeOutcome {
        winner,
        discarded_days,
        discarded_activities,
    }
}
