//! Day aggregates and their occurrences.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::{ActivityTemplate, TaskTemplate};

/// One calendar day and the occurrences scheduled on it.
///
/// Aggregate root keyed by its date (no time-of-day). After
/// reconciliation at most one live `Day` exists per date; replicated
/// writers can temporarily produce more, which the engine's dedup merge
/// collapses. Occurrences keep insertion order; use
/// [`Day::sorted_activities`] for a user-facing ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub id: Uuid,
    pub date: NaiveDate,
    pub activities: Vec<DayActivity>,
}

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Day {
            id: Uuid::new_v4(),
            date,
            activities: Vec::new(),
        }
    }

    /// Append an occurrence, re-parenting it to this day.
    pub fn push(&mut self, mut activity: DayActivity) {
        activity.day_id = self.id;
        self.activities.push(activity);
    }

    pub fn activity(&self, id: Uuid) -> Option<&DayActivity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Detach an occurrence by id.
    pub fn remove_activity(&mut self, id: Uuid) -> Option<DayActivity> {
        let index = self.activities.iter().position(|a| a.id == id)?;
        Some(self.activities.remove(index))
    }

    /// The name is the stable link between an occurrence and its
    /// template; this is the lookup materialization relies on.
    pub fn activity_named(&self, name: &str) -> Option<&DayActivity> {
        self.activities.iter().find(|a| a.name == name)
    }

    pub fn has_activity_named(&self, name: &str) -> bool {
        self.activity_named(name).is_some()
    }

    /// Occurrences ordered for display: by reminder time, then name.
    pub fn sorted_activities(&self) -> Vec<&DayActivity> {
        let mut activities: Vec<&DayActivity> = self.activities.iter().collect();
        activities.sort_by(|a, b| {
            a.reminder_at
                .cmp(&b.reminder_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        activities
    }
}

/// One occurrence of an activity on a specific day.
///
/// Fields are copied from the template at creation time; later template
/// edits reach existing occurrences only through reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayActivity {
    pub id: Uuid,
    /// Back-reference to the owning day, not ownership.
    pub day_id: Uuid,
    pub name: String,
    pub overview: Option<String>,
    pub duration_minutes: Option<u32>,
    /// When the user completed it; `None` while open.
    pub done_at: Option<NaiveDateTime>,
    pub reminder_at: Option<NaiveDateTime>,
    /// True when rule evaluation created this occurrence rather than a
    /// direct user action. Only generated occurrences are eligible for
    /// reconciliation removal and dedup collapsing.
    pub generated: bool,
    pub tasks: Vec<DayActivityTask>,
}

impl DayActivity {
    /// Materialize an occurrence of `template` on `day`.
    pub fn from_template(template: &ActivityTemplate, day: &Day) -> Self {
        let id = Uuid::new_v4();
        let tasks = template
            .tasks
            .iter()
            .map(|task| DayActivityTask::from_template(task, id))
            .collect();

        DayActivity {
            id,
            day_id: day.id,
            name: template.name.clone(),
            overview: template.overview.clone(),
            duration_minutes: template.default_duration_minutes,
            done_at: None,
            reminder_at: template
                .default_reminder_time
                .map(|time| day.date.and_time(time)),
            generated: true,
            tasks,
        }
    }

    /// A user-created occurrence with no template behind it.
    pub fn standalone(name: impl Into<String>, day: &Day) -> Self {
        DayActivity {
            id: Uuid::new_v4(),
            day_id: day.id,
            name: name.into(),
            overview: None,
            duration_minutes: None,
            done_at: None,
            reminder_at: None,
            generated: false,
            tasks: Vec::new(),
        }
    }

    /// Clone onto another day with fresh identity and completion reset.
    /// Duration carries over; the reminder keeps its time-of-day on the
    /// new date. The copy counts as user-created.
    pub fn copied_to(&self, day: &Day) -> Self {
        let id = Uuid::new_v4();
        DayActivity {
            id,
            day_id: day.id,
            name: self.name.clone(),
            overview: self.overview.clone(),
            duration_minutes: self.duration_minutes,
            done_at: None,
            reminder_at: self.reminder_at.map(|at| day.date.and_time(at.time())),
            generated: false,
            tasks: self.tasks.iter().map(|task| task.fresh_copy(id)).collect(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done_at.is_some()
    }

    pub fn mark_done(&mut self, at: NaiveDateTime) {
        self.done_at = Some(at);
    }

    pub fn mark_undone(&mut self) {
        self.done_at = None;
    }

    /// Keep the reminder's hour and minute, move it to `date`.
    pub fn reschedule_reminder(&mut self, date: NaiveDate) {
        if let Some(at) = self.reminder_at {
            self.reminder_at = Some(date.and_time(at.time()));
        }
    }
}

/// An occurrence of a sub-task template, owned by its parent activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayActivityTask {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub name: String,
    pub overview: Option<String>,
    pub done_at: Option<NaiveDateTime>,
}

impl DayActivityTask {
    pub fn from_template(template: &TaskTemplate, activity_id: Uuid) -> Self {
        DayActivityTask {
            id: Uuid::new_v4(),
            activity_id,
            name: template.name.clone(),
            overview: template.overview.clone(),
            done_at: None,
        }
    }

    /// New identity under a new parent, completion reset.
    pub fn fresh_copy(&self, activity_id: Uuid) -> Self {
        DayActivityTask {
            id: Uuid::new_v4(),
            activity_id,
            name: self.name.clone(),
            overview: self.overview.clone(),
            done_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done_at.is_some()
    }

    pub fn mark_done(&mut self, at: NaiveDateTime) {
        self.done_at = Some(at);
    }

    pub fn mark_undone(&mut self) {
        self.done_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template_with_reminder() -> ActivityTemplate {
        let mut template = ActivityTemplate::new("Morning run");
        template.overview = Some("5k around the park".to_string());
        template.default_duration_minutes = Some(40);
        template.default_reminder_time = NaiveTime::from_hms_opt(7, 30, 0);
        template.tasks.push(TaskTemplate::new("Stretch"));
        template.tasks.push(TaskTemplate::new("Log distance"));
        template
    }

    #[test]
    fn test_from_template_copies_fields_onto_the_day() {
        let day = Day::new(date(2024, 4, 2));
        let activity = DayActivity::from_template(&template_with_reminder(), &day);

        assert_eq!(activity.name, "Morning run");
        assert_eq!(activity.day_id, day.id);
        assert_eq!(activity.duration_minutes, Some(40));
        assert!(activity.generated);
        assert!(!activity.is_done());
        assert_eq!(
            activity.reminder_at,
            Some(date(2024, 4, 2).and_hms_opt(7, 30, 0).unwrap())
        );
        assert_eq!(activity.tasks.len(), 2);
        assert!(activity.tasks.iter().all(|t| t.activity_id == activity.id));
    }

    #[test]
    fn test_push_reparents_the_occurrence() {
        let source = Day::new(date(2024, 4, 2));
        let mut dest = Day::new(date(2024, 4, 3));
        let activity = DayActivity::standalone("Call dentist", &source);

        dest.push(activity);
        assert_eq!(dest.activities[0].day_id, dest.id);
    }

    #[test]
    fn test_reschedule_reminder_keeps_time_of_day() {
        let day = Day::new(date(2024, 4, 2));
        let mut activity = DayActivity::from_template(&template_with_reminder(), &day);

        activity.reschedule_reminder(date(2024, 4, 9));
        assert_eq!(
            activity.reminder_at,
            Some(date(2024, 4, 9).and_hms_opt(7, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_copied_to_resets_completion_and_identity() {
        let day = Day::new(date(2024, 4, 2));
        let mut activity = DayActivity::from_template(&template_with_reminder(), &day);
        activity.mark_done(date(2024, 4, 2).and_hms_opt(8, 15, 0).unwrap());
        activity.tasks[0].mark_done(date(2024, 4, 2).and_hms_opt(8, 0, 0).unwrap());

        let target = Day::new(date(2024, 4, 20));
        let copy = activity.copied_to(&target);

        assert_ne!(copy.id, activity.id);
        assert!(!copy.is_done());
        assert!(!copy.generated);
        assert_eq!(copy.duration_minutes, activity.duration_minutes);
        assert_eq!(
            copy.reminder_at,
            Some(date(2024, 4, 20).and_hms_opt(7, 30, 0).unwrap())
        );
        assert_eq!(copy.tasks.len(), 2);
        assert!(copy.tasks.iter().all(|t| !t.is_done()));
        assert!(copy.tasks.iter().all(|t| t.activity_id == copy.id));
        assert_ne!(copy.tasks[0].id, activity.tasks[0].id);
    }

    #[test]
    fn test_sorted_activities_orders_by_reminder_then_name() {
        let mut day = Day::new(date(2024, 4, 2));
        let mut a = DayActivity::standalone("Water plants", &day);
        a.reminder_at = Some(date(2024, 4, 2).and_hms_opt(18, 0, 0).unwrap());
        let mut b = DayActivity::standalone("Journal", &day);
        b.reminder_at = Some(date(2024, 4, 2).and_hms_opt(9, 0, 0).unwrap());
        let c = DayActivity::standalone("Anytime chore", &day);
        day.push(a);
        day.push(b);
        day.push(c);

        let names: Vec<&str> = day
            .sorted_activities()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Anytime chore", "Journal", "Water plants"]);
    }
}
