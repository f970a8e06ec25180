//! Day materialization and reconciliation.
//!
//! `DayMaterializer` turns activity templates into concrete per-day
//! plans and keeps existing plans consistent as templates change, as
//! users edit individual occurrences, and as replicated writers produce
//! duplicate rows for the same date.
//!
//! Every operation here is a read-modify-write cycle against the day
//! store; two interleaved cycles on the same day silently drop one
//! side's write. Run all calls through
//! [`crate::worker::MaterializerHandle`], which serializes them.

mod merge;
pub use merge::{MergeOutcome, merge_duplicate_days};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use daybook_core::{
    ActivityTemplate, DateRange, Day, DayActivity, DaybookError, DaybookResult, expand_rule,
};

use crate::feed::ChangeBatch;
use crate::store::{DayStore, OccurrenceStore};

pub struct DayMaterializer {
    days: Arc<dyn DayStore>,
    occurrences: Arc<dyn OccurrenceStore>,
}

impl DayMaterializer {
    pub fn new(days: Arc<dyn DayStore>, occurrences: Arc<dyn OccurrenceStore>) -> Self {
        DayMaterializer { days, occurrences }
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    /// Ensure every date in `range` has exactly one day.
    ///
    /// Dates without a day get a fresh one holding an auto-generated
    /// occurrence for each template whose rule selects that date.
    /// Dates with duplicate rows (replication artifacts) are collapsed
    /// before anything else. Returns the full range's days, sorted;
    /// calling again with the same inputs writes nothing.
    pub async fn prepare_days(
        &self,
        templates: &[ActivityTemplate],
        range: DateRange,
    ) -> DaybookResult<Vec<Day>> {
        let existing = self.days.load_range(range).await?;

        let mut by_date: HashMap<NaiveDate, Vec<Day>> = HashMap::new();
        for day in existing {
            by_date.entry(day.date).or_default().push(day);
        }

        let mut days_out: Vec<Day> = Vec::new();
        for (_, mut rows) in by_date {
            if rows.len() > 1 {
                days_out.push(self.merge_and_persist(rows).await?);
            } else if let Some(day) = rows.pop() {
                days_out.push(day);
            }
        }

        let expanded = expand_templates(templates, range)?;
        let have: HashSet<NaiveDate> = days_out.iter().map(|day| day.date).collect();

        let mut created: Vec<Day> = Vec::new();
        for date in range.days() {
            if have.contains(&date) {
                continue;
            }
            let mut day = Day::new(date);
            for (template, dates) in &expanded {
                if dates.contains(&date) {
                    let activity = DayActivity::from_template(template, &day);
                    day.push(activity);
                }
            }
            created.push(day);
        }

        if !created.is_empty() {
            debug!(count = created.len(), "materialized new days");
            self.days.save_many(&created).await?;
            days_out.extend(created);
        }

        days_out.sort_by_key(|day| day.date);
        Ok(days_out)
    }

    /// Append occurrences of an updated/new template into existing days
    /// from `from` up to the farthest day on record. Creates no day
    /// rows; days already holding an occurrence of the template are
    /// left alone.
    pub async fn extend_future_occurrences(
        &self,
        template: &ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        let range = self.range_to_farthest_day(from).await?;
        let Some(rule) = &template.frequency else {
            return Ok(());
        };
        let dates = expand_rule(rule, template.frequency_enabled, template.start_date, range)?;
        if dates.is_empty() {
            return Ok(());
        }

        let mut touched = Vec::new();
        for mut day in self.days.load_range(range).await? {
            if dates.contains(&day.date) && !day.has_activity_named(&template.name) {
                let activity = DayActivity::from_template(template, &day);
                day.push(activity);
                touched.push(day);
            }
        }

        if !touched.is_empty() {
            debug!(
                template = %template.name,
                days = touched.len(),
                "extended future occurrences"
            );
            self.days.save_many(&touched).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Single-occurrence edits
    // =========================================================================

    /// Append a user-created occurrence to the day at `date`. Build it
    /// with [`DayActivity::from_template`] or [`DayActivity::standalone`];
    /// either way it stops counting as auto-generated here. The day must
    /// already exist; materialize the range first.
    pub async fn insert_user_occurrence(
        &self,
        occurrence: DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let mut day = self.require_day(date).await?;
        let mut occurrence = occurrence;
        occurrence.generated = false;
        day.push(occurrence);
        self.days.save(&day).await
    }

    /// Remove one occurrence from the day at `date` and delete its
    /// record along with all of its task records.
    pub async fn remove_occurrence(
        &self,
        occurrence: &DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let mut day = self.require_day(date).await?;
        match day.remove_activity(occurrence.id) {
            Some(removed) => {
                self.days.save(&day).await?;
                self.remove_activity_records(&[removed]).await
            }
            None => {
                warn!(occurrence = %occurrence.id, %date, "remove target not present on day");
                Ok(())
            }
        }
    }

    /// Overwrite an occurrence in place with an edited version,
    /// deleting the records of any tasks the edit dropped.
    pub async fn replace_occurrence(
        &self,
        updated: DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let mut day = self.require_day(date).await?;
        let Some(index) = day.activities.iter().position(|a| a.id == updated.id) else {
            warn!(occurrence = %updated.id, %date, "replace target no longer on day");
            return Ok(());
        };

        let kept: HashSet<Uuid> = updated.tasks.iter().map(|task| task.id).collect();
        for task in &day.activities[index].tasks {
            if !kept.contains(&task.id) {
                self.occurrences.remove_task(task).await?;
            }
        }

        let mut updated = updated;
        updated.day_id = day.id;
        day.activities[index] = updated;
        self.days.save(&day).await
    }

    /// Re-parent an occurrence onto the day at `to_date`, creating that
    /// day if needed. The occurrence keeps its id and task list, stops
    /// counting as auto-generated, and its reminder keeps its
    /// time-of-day on the new date.
    pub async fn move_occurrence(
        &self,
        occurrence: &DayActivity,
        to_date: NaiveDate,
    ) -> DaybookResult<()> {
        let mut moved = None;
        if let Some(mut source) = self.days.load_by_id(occurrence.day_id).await? {
            if let Some(activity) = source.remove_activity(occurrence.id) {
                self.days.save(&source).await?;
                moved = Some(activity);
            }
        }
        // Source day already healed on another replica; move what we were given
        let mut activity = moved.unwrap_or_else(|| occurrence.clone());

        activity.generated = false;
        activity.reschedule_reminder(to_date);

        let mut dest = match self.days.load_by_date(to_date).await? {
            Some(day) => day,
            None => Day::new(to_date),
        };
        dest.push(activity);
        self.days.save(&dest).await
    }

    /// Clone an occurrence onto each of `dates` with a fresh identity
    /// and completion reset, creating days as needed.
    pub async fn copy_occurrence(
        &self,
        occurrence: &DayActivity,
        dates: &[NaiveDate],
    ) -> DaybookResult<()> {
        for &date in dates {
            let mut day = match self.days.load_by_date(date).await? {
                Some(day) => day,
                None => Day::new(date),
            };
            let copy = occurrence.copied_to(&day);
            day.push(copy);
            self.days.save(&day).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// After a template's rule changed: from `from` to the farthest day
    /// on record, drop auto-generated occurrences whose date the
    /// updated rule no longer selects, then add occurrences for newly
    /// selected dates that lack one.
    ///
    /// On the boundary day a completed occurrence is kept; past it,
    /// completion cannot have happened yet, so stale occurrences go
    /// regardless.
    pub async fn reconcile_updated_template(
        &self,
        template: &ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        self.reconcile(template, from, true).await
    }

    /// After a template was deleted: same removal pass, no re-adds.
    pub async fn reconcile_removed_template(
        &self,
        template: &ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        self.reconcile(template, from, false).await
    }

    async fn reconcile(
        &self,
        template: &ActivityTemplate,
        from: NaiveDate,
        readd: bool,
    ) -> DaybookResult<()> {
        let range = self.range_to_farthest_day(from).await?;

        let dates = match (readd, &template.frequency) {
            (true, Some(rule)) => {
                expand_rule(rule, template.frequency_enabled, template.start_date, range)?
            }
            _ => HashSet::new(),
        };

        let mut touched: Vec<Day> = Vec::new();
        let mut removed: Vec<DayActivity> = Vec::new();

        for mut day in self.days.load_range(range).await? {
            let mut changed = false;

            let stale: Vec<Uuid> = day
                .activities
                .iter()
                .filter(|a| a.generated && a.name == template.name)
                .filter(|_| !dates.contains(&day.date))
                .filter(|a| day.date != from || !a.is_done())
                .map(|a| a.id)
                .collect();

            for id in stale {
                if let Some(activity) = day.remove_activity(id) {
                    removed.push(activity);
                    changed = true;
                }
            }

            if dates.contains(&day.date) && !day.has_activity_named(&template.name) {
                let activity = DayActivity::from_template(template, &day);
                day.push(activity);
                changed = true;
            }

            if changed {
                touched.push(day);
            }
        }

        debug!(
            template = %template.name,
            days = touched.len(),
            removed = removed.len(),
            "reconciled template"
        );
        if !touched.is_empty() {
            self.days.save_many(&touched).await?;
        }
        self.remove_activity_records(&removed).await
    }

    // =========================================================================
    // Change feed
    // =========================================================================

    /// Apply one batch of replicated-change notifications.
    ///
    /// Every touched day id has its date's rows reloaded and, when more
    /// than one exists, collapsed. Touched activity/task ids resolve to
    /// their owning day's date. Returns all affected dates for cache
    /// invalidation and notification rescheduling. Re-applying a batch
    /// writes nothing further.
    pub async fn apply_change_batch(
        &self,
        batch: &ChangeBatch,
    ) -> DaybookResult<BTreeSet<NaiveDate>> {
        let mut affected = BTreeSet::new();

        for &day_id in &batch.days {
            let Some(day) = self.days.load_by_id(day_id).await? else {
                continue;
            };
            let rows = self.days.load_range(DateRange::single(day.date)).await?;
            if rows.len() > 1 {
                self.merge_and_persist(rows).await?;
            }
            affected.insert(day.date);
        }

        if !batch.activities.is_empty() || !batch.tasks.is_empty() {
            let all = self.days.load_all().await?;
            for &id in &batch.activities {
                if let Some(date) = owning_date_of_activity(&all, id) {
                    affected.insert(date);
                }
            }
            for &id in &batch.tasks {
                if let Some(date) = owning_date_of_task(&all, id) {
                    affected.insert(date);
                }
            }
        }

        debug!(
            days = batch.days.len(),
            activities = batch.activities.len(),
            tasks = batch.tasks.len(),
            affected = affected.len(),
            "applied change batch"
        );
        Ok(affected)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require_day(&self, date: NaiveDate) -> DaybookResult<Day> {
        self.days
            .load_by_date(date)
            .await?
            .ok_or(DaybookError::MissingDay(date))
    }

    /// The range from `from` to the farthest day on record. With no
    /// days anywhere (or `from` past the farthest) there is nothing to
    /// anchor an update to, which is a bootstrap error.
    async fn range_to_farthest_day(&self, from: NaiveDate) -> DaybookResult<DateRange> {
        let farthest = self
            .days
            .load_all()
            .await?
            .iter()
            .map(|day| day.date)
            .max()
            .ok_or_else(|| DaybookError::RangeConstruction("no days exist yet".into()))?;
        DateRange::new(from, farthest)
    }

    async fn merge_and_persist(&self, rows: Vec<Day>) -> DaybookResult<Day> {
        let outcome = merge_duplicate_days(rows);
        info!(
            date = %outcome.winner.date,
            discarded_days = outcome.discarded_days.len(),
            discarded_activities = outcome.discarded_activities.len(),
            "collapsed duplicate day rows"
        );
        self.days.save(&outcome.winner).await?;
        for day in &outcome.discarded_days {
            self.days.remove(day).await?;
        }
        self.remove_activity_records(&outcome.discarded_activities)
            .await?;
        Ok(outcome.winner)
    }

    async fn remove_activity_records(&self, activities: &[DayActivity]) -> DaybookResult<()> {
        for activity in activities {
            for task in &activity.tasks {
                self.occurrences.remove_task(task).await?;
            }
            self.occurrences.remove_activity(activity).await?;
        }
        Ok(())
    }
}

/// Evaluate each template's rule once over the range; templates with no
/// rule, a disabled rule, or no dates in range drop out.
fn expand_templates<'a>(
    templates: &'a [ActivityTemplate],
    range: DateRange,
) -> DaybookResult<Vec<(&'a ActivityTemplate, HashSet<NaiveDate>)>> {
    let mut expanded = Vec::new();
    for template in templates {
        let Some(rule) = &template.frequency else {
            continue;
        };
        let dates = expand_rule(rule, template.frequency_enabled, template.start_date, range)?;
        if !dates.is_empty() {
            expanded.push((template, dates));
        }
    }
    Ok(expanded)
}

fn owning_date_of_activity(days: &[Day], id: Uuid) -> Option<NaiveDate> {
    days.iter()
        .find(|day| day.activities.iter().any(|a| a.id == id))
        .map(|day| day.date)
}

fn owning_date_of_task(days: &[Day], id: Uuid) -> Option<NaiveDate> {
    days.iter()
        .find(|day| {
            day.activities
                .iter()
                .any(|a| a.tasks.iter().any(|t| t.id == id))
        })
        .map(|day| day.date)
}

#[cfg(test)]
mod tests;
