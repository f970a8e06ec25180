use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};

use daybook_core::{
    ActivityTemplate, DateRange, Day, DayActivity, DaybookError, Frequency, TaskTemplate,
};

use crate::feed::ChangeBatch;
use crate::materializer::DayMaterializer;
use crate::store::{DayStore, MemoryStore};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn done_at(d: NaiveDate) -> chrono::NaiveDateTime {
    d.and_hms_opt(20, 0, 0).unwrap()
}

/// 2024-06-03 is a Monday; the week runs through Sunday the 9th.
fn week_range() -> DateRange {
    DateRange::new(date(2024, 6, 3), date(2024, 6, 9)).unwrap()
}

fn engine() -> (Arc<MemoryStore>, DayMaterializer) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(MemoryStore::new());
    let materializer = DayMaterializer::new(store.clone(), store.clone());
    (store, materializer)
}

fn gym_on(weekdays: Vec<Weekday>) -> ActivityTemplate {
    let mut template =
        ActivityTemplate::new("Gym").with_frequency(Frequency::Weekly { weekdays });
    template.tasks.push(TaskTemplate::new("Warm up"));
    template
}

// =============================================================================
// prepare_days
// =============================================================================

#[tokio::test]
async fn test_prepare_days_materializes_per_rule() {
    let (_, materializer) = engine();
    let templates = vec![
        ActivityTemplate::new("Journal").with_frequency(Frequency::Daily),
        gym_on(vec![Weekday::Mon, Weekday::Wed]),
    ];

    let days = materializer
        .prepare_days(&templates, week_range())
        .await
        .unwrap();

    assert_eq!(days.len(), 7);
    for day in &days {
        assert!(day.has_activity_named("Journal"));
        assert!(day.activities.iter().all(|a| a.generated));
    }
    assert!(days[0].has_activity_named("Gym")); // Monday
    assert!(!days[1].has_activity_named("Gym"));
    assert!(days[2].has_activity_named("Gym")); // Wednesday
}

#[tokio::test]
async fn test_prepare_days_is_idempotent() {
    let (store, materializer) = engine();
    let templates = vec![ActivityTemplate::new("Journal").with_frequency(Frequency::Daily)];

    let first = materializer
        .prepare_days(&templates, week_range())
        .await
        .unwrap();
    let second = materializer
        .prepare_days(&templates, week_range())
        .await
        .unwrap();

    assert_eq!(store.day_count(), 7);
    assert_eq!(first, second);
    for day in second {
        let journals = day.activities.iter().filter(|a| a.name == "Journal").count();
        assert_eq!(journals, 1);
    }
}

#[tokio::test]
async fn test_prepare_days_collapses_duplicate_rows() {
    let (store, materializer) = engine();

    // Two replicas materialized the same Monday
    let mut a = Day::new(date(2024, 6, 3));
    a.push(DayActivity::from_template(&ActivityTemplate::new("Gym"), &a));
    let mut b = Day::new(date(2024, 6, 3));
    b.push(DayActivity::from_template(&ActivityTemplate::new("Gym"), &b));
    store.save(&a).await.unwrap();
    store.save(&b).await.unwrap();

    let days = materializer.prepare_days(&[], week_range()).await.unwrap();

    let monday = days.iter().find(|d| d.date == date(2024, 6, 3)).unwrap();
    assert_eq!(
        monday
            .activities
            .iter()
            .filter(|a| a.name == "Gym")
            .count(),
        1
    );
    assert_eq!(store.day_count(), 7);
    assert_eq!(store.removed_activity_ids().len(), 1);
}

// =============================================================================
// extend_future_occurrences
// =============================================================================

#[tokio::test]
async fn test_extend_appends_into_existing_days_only() {
    let (store, materializer) = engine();
    materializer.prepare_days(&[], week_range()).await.unwrap();

    let template = gym_on(vec![Weekday::Fri]);
    materializer
        .extend_future_occurrences(&template, date(2024, 6, 3))
        .await
        .unwrap();

    assert_eq!(store.day_count(), 7); // no new rows
    let friday = store
        .load_by_date(date(2024, 6, 7))
        .await
        .unwrap()
        .unwrap();
    let gym = friday.activity_named("Gym").unwrap();
    assert!(gym.generated);
    assert_eq!(gym.tasks.len(), 1);

    // A second extend finds the occurrence already present
    materializer
        .extend_future_occurrences(&template, date(2024, 6, 3))
        .await
        .unwrap();
    let friday = store
        .load_by_date(date(2024, 6, 7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        friday
            .activities
            .iter()
            .filter(|a| a.name == "Gym")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_extend_on_empty_store_is_a_bootstrap_error() {
    let (_, materializer) = engine();
    let result = materializer
        .extend_future_occurrences(&gym_on(vec![Weekday::Fri]), date(2024, 6, 3))
        .await;
    assert!(matches!(result, Err(DaybookError::RangeConstruction(_))));
}

// =============================================================================
// Single-occurrence edits
// =============================================================================

#[tokio::test]
async fn test_insert_user_occurrence_requires_the_day() {
    let (store, materializer) = engine();
    materializer.prepare_days(&[], week_range()).await.unwrap();

    let day = store
        .load_by_date(date(2024, 6, 4))
        .await
        .unwrap()
        .unwrap();
    let occurrence = DayActivity::standalone("Call plumber", &day);
    materializer
        .insert_user_occurrence(occurrence, date(2024, 6, 4))
        .await
        .unwrap();

    let day = store
        .load_by_date(date(2024, 6, 4))
        .await
        .unwrap()
        .unwrap();
    let inserted = day.activity_named("Call plumber").unwrap();
    assert!(!inserted.generated);

    // Outside the materialized range there is no day to insert into
    let missing = materializer
        .insert_user_occurrence(
            DayActivity::standalone("Too far out", &day),
            date(2024, 7, 1),
        )
        .await;
    assert!(matches!(
        missing,
        Err(DaybookError::MissingDay(d)) if d == date(2024, 7, 1)
    ));
}

#[tokio::test]
async fn test_remove_occurrence_deletes_records_and_task_children() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon]);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    let gym = monday.activity_named("Gym").unwrap().clone();
    let task_id = gym.tasks[0].id;

    materializer
        .remove_occurrence(&gym, date(2024, 6, 3))
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    assert!(!monday.has_activity_named("Gym"));
    assert_eq!(store.removed_activity_ids(), vec![gym.id]);
    assert_eq!(store.removed_task_ids(), vec![task_id]);
}

#[tokio::test]
async fn test_replace_occurrence_deletes_dropped_task_records() {
    let (store, materializer) = engine();
    let mut template = gym_on(vec![Weekday::Mon]);
    template.tasks.push(TaskTemplate::new("Cool down"));
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    let mut gym = monday.activity_named("Gym").unwrap().clone();
    let dropped_task = gym.tasks.remove(1);
    gym.overview = Some("Leg day".to_string());
    gym.mark_done(done_at(date(2024, 6, 3)));

    materializer
        .replace_occurrence(gym.clone(), date(2024, 6, 3))
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    let replaced = monday.activity_named("Gym").unwrap();
    assert_eq!(replaced.id, gym.id);
    assert_eq!(replaced.overview.as_deref(), Some("Leg day"));
    assert!(replaced.is_done());
    assert_eq!(replaced.tasks.len(), 1);
    assert_eq!(store.removed_task_ids(), vec![dropped_task.id]);
}

#[tokio::test]
async fn test_move_occurrence_keeps_identity_and_flips_generated() {
    let (store, materializer) = engine();
    let mut template = gym_on(vec![Weekday::Mon]);
    template.default_reminder_time = chrono::NaiveTime::from_hms_opt(17, 45, 0);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    let gym = monday.activity_named("Gym").unwrap().clone();

    // Destination outside the materialized range: the day gets created
    materializer
        .move_occurrence(&gym, date(2024, 6, 15))
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    assert!(!monday.has_activity_named("Gym"));

    let dest = store
        .load_by_date(date(2024, 6, 15))
        .await
        .unwrap()
        .unwrap();
    let moved = dest.activity_named("Gym").unwrap();
    assert_eq!(moved.id, gym.id);
    assert_eq!(moved.tasks.len(), gym.tasks.len());
    assert!(!moved.generated);
    assert_eq!(moved.day_id, dest.id);
    assert_eq!(
        moved.reminder_at,
        Some(date(2024, 6, 15).and_hms_opt(17, 45, 0).unwrap())
    );
}

#[tokio::test]
async fn test_copy_occurrence_gets_fresh_identity_per_date() {
    let (store, materializer) = engine();
    let mut template = gym_on(vec![Weekday::Mon]);
    template.default_duration_minutes = Some(60);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    let mut gym = monday.activity_named("Gym").unwrap().clone();
    gym.mark_done(done_at(date(2024, 6, 3)));
    materializer
        .replace_occurrence(gym.clone(), date(2024, 6, 3))
        .await
        .unwrap();

    let targets = [date(2024, 6, 6), date(2024, 6, 20)];
    materializer.copy_occurrence(&gym, &targets).await.unwrap();

    for target in targets {
        let day = store.load_by_date(target).await.unwrap().unwrap();
        let copy = day.activity_named("Gym").unwrap();
        assert_ne!(copy.id, gym.id);
        assert!(!copy.is_done());
        assert_eq!(copy.duration_minutes, Some(60));
    }
    // The source occurrence is untouched
    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    assert!(monday.activity_named("Gym").unwrap().is_done());
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_reconcile_updated_moves_occurrences_to_the_new_rule() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon, Weekday::Wed]);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let updated = gym_on(vec![Weekday::Fri]);
    materializer
        .reconcile_updated_template(&updated, date(2024, 6, 3))
        .await
        .unwrap();

    for (day, expect_gym) in [
        (date(2024, 6, 3), false),
        (date(2024, 6, 5), false),
        (date(2024, 6, 7), true),
    ] {
        let loaded = store.load_by_date(day).await.unwrap().unwrap();
        assert_eq!(loaded.has_activity_named("Gym"), expect_gym, "{day}");
    }
    // Both stale occurrences lost their records (plus their task children)
    assert_eq!(store.removed_activity_ids().len(), 2);
    assert_eq!(store.removed_task_ids().len(), 2);
}

#[tokio::test]
async fn test_reconcile_keeps_completed_occurrence_on_the_boundary_day() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon, Weekday::Wed]);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    // Done on Monday (the boundary) and, improbably, on Wednesday too
    for day in [date(2024, 6, 3), date(2024, 6, 5)] {
        let loaded = store.load_by_date(day).await.unwrap().unwrap();
        let mut gym = loaded.activity_named("Gym").unwrap().clone();
        gym.mark_done(done_at(day));
        materializer.replace_occurrence(gym, day).await.unwrap();
    }

    let updated = gym_on(vec![Weekday::Fri]);
    materializer
        .reconcile_updated_template(&updated, date(2024, 6, 3))
        .await
        .unwrap();

    // Monday's completed occurrence survives; Wednesday's is strictly
    // after the boundary and goes even though it was marked done
    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    assert!(monday.activity_named("Gym").unwrap().is_done());
    let wednesday = store
        .load_by_date(date(2024, 6, 5))
        .await
        .unwrap()
        .unwrap();
    assert!(!wednesday.has_activity_named("Gym"));
}

#[tokio::test]
async fn test_reconcile_never_touches_user_created_occurrences() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon]);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    materializer
        .insert_user_occurrence(DayActivity::standalone("Gym", &monday), date(2024, 6, 3))
        .await
        .unwrap();

    materializer
        .reconcile_removed_template(&gym_on(vec![Weekday::Mon]), date(2024, 6, 3))
        .await
        .unwrap();

    let monday = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    // The generated occurrence is gone, the hand-placed one stays
    assert_eq!(monday.activities.len(), 1);
    assert!(!monday.activity_named("Gym").unwrap().generated);
}

#[tokio::test]
async fn test_reconcile_removed_does_not_re_add() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon, Weekday::Wed]);
    materializer
        .prepare_days(&[template.clone()], week_range())
        .await
        .unwrap();

    materializer
        .reconcile_removed_template(&template, date(2024, 6, 3))
        .await
        .unwrap();

    for day in week_range().days() {
        let loaded = store.load_by_date(day).await.unwrap().unwrap();
        assert!(!loaded.has_activity_named("Gym"), "{day}");
    }
}

// =============================================================================
// Change feed
// =============================================================================

#[tokio::test]
async fn test_change_batch_merges_duplicate_days_idempotently() {
    let (store, materializer) = engine();

    let mut a = Day::new(date(2024, 6, 3));
    a.push(DayActivity::from_template(&ActivityTemplate::new("Gym"), &a));
    let mut b = Day::new(date(2024, 6, 3));
    let mut dup = DayActivity::from_template(&ActivityTemplate::new("Gym"), &b);
    dup.mark_done(done_at(date(2024, 6, 3)));
    let done_id = dup.id;
    b.push(dup);
    store.save(&a).await.unwrap();
    store.save(&b).await.unwrap();

    let winner_row_id = a.id.min(b.id);
    let batch = ChangeBatch {
        days: vec![winner_row_id],
        ..Default::default()
    };

    let affected = materializer.apply_change_batch(&batch).await.unwrap();
    assert_eq!(affected, BTreeSet::from([date(2024, 6, 3)]));
    assert_eq!(store.day_count(), 1);
    let merged = store
        .load_by_date(date(2024, 6, 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged.id, winner_row_id);
    assert_eq!(merged.activities.len(), 1);
    // Completion survived the collapse
    assert_eq!(merged.activities[0].id, done_id);
    assert!(merged.activities[0].is_done());

    // Re-applying the same batch changes nothing further
    let removed_before = store.removed_activity_ids().len();
    let again = materializer.apply_change_batch(&batch).await.unwrap();
    assert_eq!(again, BTreeSet::from([date(2024, 6, 3)]));
    assert_eq!(store.day_count(), 1);
    assert_eq!(store.removed_activity_ids().len(), removed_before);
}

#[tokio::test]
async fn test_change_batch_resolves_occurrence_ids_to_dates() {
    let (store, materializer) = engine();
    let template = gym_on(vec![Weekday::Mon, Weekday::Wed]);
    materializer
        .prepare_days(&[template], week_range())
        .await
        .unwrap();

    let wednesday = store
        .load_by_date(date(2024, 6, 5))
        .await
        .unwrap()
        .unwrap();
    let gym = wednesday.activity_named("Gym").unwrap();

    let batch = ChangeBatch {
        activities: vec![gym.id],
        tasks: vec![gym.tasks[0].id],
        ..Default::default()
    };
    let affected = materializer.apply_change_batch(&batch).await.unwrap();
    assert_eq!(affected, BTreeSet::from([date(2024, 6, 5)]));

    // Unknown ids resolve to nothing rather than failing
    let stray = ChangeBatch {
        activities: vec![uuid::Uuid::new_v4()],
        ..Default::default()
    };
    let affected = materializer.apply_change_batch(&stray).await.unwrap();
    assert!(affected.is_empty());
}
