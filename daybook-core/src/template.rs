//! Activity templates: the definition side of the engine.
//!
//! Templates are owned and edited by the form layer; the engine only
//! reads them. Occurrences copy a template's fields at creation time
//! and keep the template's name as their link back to it.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frequency::Frequency;

/// A recurring-activity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTemplate {
    pub id: Uuid,
    pub name: String,
    pub overview: Option<String>,
    /// The recurrence shape; `None` for templates only placed by hand.
    pub frequency: Option<Frequency>,
    /// Evaluation is skipped entirely while this is false.
    pub frequency_enabled: bool,
    /// No occurrences are generated before this date.
    pub start_date: Option<NaiveDate>,
    pub default_duration_minutes: Option<u32>,
    /// Time-of-day for the occurrence reminder on whichever day it lands.
    pub default_reminder_time: Option<NaiveTime>,
    pub tasks: Vec<TaskTemplate>,
}

impl ActivityTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        ActivityTemplate {
            id: Uuid::new_v4(),
            name: name.into(),
            overview: None,
            frequency: None,
            frequency_enabled: false,
            start_date: None,
            default_duration_minutes: None,
            default_reminder_time: None,
            tasks: Vec::new(),
        }
    }

    /// Set the frequency rule and enable it.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self.frequency_enabled = true;
        self
    }
}

/// A sub-task definition within an activity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub overview: Option<String>,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        TaskTemplate {
            id: Uuid::new_v4(),
            name: name.into(),
            overview: None,
        }
    }
}
