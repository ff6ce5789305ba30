//! Recurring task definitions and instance generation.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::{Priority, RecurrenceFrequency};
use crate::gateway::client::Query;
use crate::store::{decode, Entity, EntityStore};
use crate::task::{NewTask, Task};
use crate::wire::{id_text, now_iso, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTask {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "id_text")]
    pub project_id: String,
    pub frequency: RecurrenceFrequency,
    pub next_due_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_date: Option<String>,
    #[serde(default)]
    pub generated_instances: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "id_text")]
    pub created_by: String,
}

fn active() -> bool {
    true
}

impl Entity for RecurringTask {
    const COLLECTION: &'static str = "recurring-tasks";

    fn id(&self) -> &str {
        &self.id
    }
}

impl RecurringTask {
    /// The due date after `next_due_date`, or `None` if it can't be parsed.
    pub fn following_due_date(&self) -> Option<NaiveDate> {
        let current = parse_timestamp(&self.next_due_date)?.date_naive();
        advance(current, self.frequency)
    }

    fn ends_before(&self, date: NaiveDate) -> bool {
        self.end_date
            .as_deref()
            .and_then(parse_timestamp)
            .map(|end| date > end.date_naive())
            .unwrap_or(false)
    }

    /// Draft of the next task instance, due on `next_due_date`.
    pub fn instance(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            project_id: self.project_id.clone(),
            due_date: Some(self.next_due_date.clone()),
            ..NewTask::default()
        }
    }
}

/// Step a date forward by one period.
pub fn advance(date: NaiveDate, frequency: RecurrenceFrequency) -> Option<NaiveDate> {
    match frequency {
        RecurrenceFrequency::Daily => date.checked_add_signed(Duration::days(1)),
        RecurrenceFrequency::Weekly => date.checked_add_signed(Duration::weeks(1)),
        RecurrenceFrequency::Biweekly => date.checked_add_signed(Duration::weeks(2)),
        RecurrenceFrequency::Monthly => date.checked_add_months(Months::new(1)),
        RecurrenceFrequency::Quarterly => date.checked_add_months(Months::new(3)),
        RecurrenceFrequency::Yearly => date.checked_add_months(Months::new(12)),
    }
}

/// New definitions start active.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecurring {
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub frequency: RecurrenceFrequency,
    pub next_due_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    pub priority: Priority,
    pub is_active: bool,
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<RecurrenceFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_generated_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl EntityStore<RecurringTask> {
    /// Load one project's definitions as the held collection.
    pub fn load_for_project(&mut self, project_id: &str) -> Result<&[RecurringTask]> {
        let items = self.get_list(&Query::new().with("projectId", project_id))?;
        self.replace_all(items);
        Ok(self.items())
    }

    /// Pause or resume a definition.
    pub fn toggle(&mut self, id: &str) -> Result<RecurringTask> {
        let current = self.current(id)?;
        let patch = RecurringPatch { is_active: Some(!current.is_active), ..RecurringPatch::default() };
        self.update(id, &patch)
    }

    /// Create the next task instance of a definition.
    ///
    /// Uses the API's `generate-next` action when it exists. Otherwise the
    /// task is created through `tasks` and the definition is advanced here:
    /// the due date moves on by one period and the definition pauses itself
    /// once it passes its end date.
    pub fn generate_next(&mut self, id: &str, tasks: &mut EntityStore<Task>) -> Result<Task> {
        match self.post_action(id, "generate-next", &serde_json::json!({})) {
            Ok(value) => {
                let task: Task = decode(value)?;
                tasks.prepend(task.clone());
                let refreshed = self.fetch_by_id(id)?;
                self.replace(refreshed);
                Ok(task)
            }
            Err(e) if e.is_not_found() => {
                self.clear_error();
                let def = self.current(id)?;
                if !def.is_active {
                    return Err(Error::Invalid(format!("recurring task {id} is paused")));
                }
                let next = def.following_due_date().ok_or_else(|| {
                    Error::Invalid(format!("recurring task {id} has an unreadable due date"))
                })?;
                let task = tasks.create(&def.instance())?;
                let patch = RecurringPatch {
                    next_due_date: Some(next.format("%Y-%m-%d").to_string()),
                    last_generated_date: Some(now_iso()),
                    generated_instances: Some(def.generated_instances + 1),
                    is_active: def.ends_before(next).then_some(false),
                    ..RecurringPatch::default()
                };
                self.update(id, &patch)?;
                Ok(task)
            }
            Err(e) => Err(e),
        }
    }

    fn current(&mut self, id: &str) -> Result<RecurringTask> {
        match self.find(id) {
            Some(r) => Ok(r.clone()),
            None => self.fetch_by_id(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::Gateway;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn gateway() -> Arc<dyn Gateway> {
        Arc::new(LocalGateway::in_memory(json!({
            "tasks": [],
            "recurring-tasks": [
                {"id": 1, "title": "Standup notes", "projectId": 1, "frequency": "weekly",
                 "nextDueDate": "2024-03-04", "isActive": true, "priority": "low"},
                {"id": 2, "title": "Invoice", "projectId": 2, "frequency": "monthly",
                 "nextDueDate": "2024-01-31", "endDate": "2024-02-15", "isActive": true,
                 "priority": "high"},
                {"id": 3, "title": "Old", "projectId": 1, "frequency": "daily",
                 "nextDueDate": "2024-01-01", "isActive": false}
            ]
        })))
    }

    #[test]
    fn test_advance_by_frequency() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(advance(d, RecurrenceFrequency::Daily), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(advance(d, RecurrenceFrequency::Biweekly), NaiveDate::from_ymd_opt(2024, 2, 14));
        // Month ends clamp to the last day of the shorter month.
        assert_eq!(advance(d, RecurrenceFrequency::Monthly), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(advance(d, RecurrenceFrequency::Quarterly), NaiveDate::from_ymd_opt(2024, 4, 30));
        assert_eq!(advance(d, RecurrenceFrequency::Yearly), NaiveDate::from_ymd_opt(2025, 1, 31));
    }

    #[test]
    fn test_toggle_negates_active() {
        let mut s: EntityStore<RecurringTask> = EntityStore::new(gateway());
        s.fetch_all().unwrap();
        assert!(!s.toggle("1").unwrap().is_active);
        assert!(s.toggle("3").unwrap().is_active);
    }

    #[test]
    fn test_generate_next_creates_task_and_advances() {
        let gw = gateway();
        let mut s: EntityStore<RecurringTask> = EntityStore::new(gw.clone());
        let mut tasks: EntityStore<Task> = EntityStore::new(gw);
        s.fetch_all().unwrap();

        let task = s.generate_next("1", &mut tasks).unwrap();

        assert_eq!(task.title, "Standup notes");
        assert_eq!(task.due_date.as_deref(), Some("2024-03-04"));
        assert_eq!(tasks.items().len(), 1);
        let def = s.find("1").unwrap();
        assert_eq!(def.next_due_date, "2024-03-11");
        assert_eq!(def.generated_instances, 1);
        assert!(def.is_active);
    }

    #[test]
    fn test_generate_next_pauses_past_end_date() {
        let gw = gateway();
        let mut s: EntityStore<RecurringTask> = EntityStore::new(gw.clone());
        let mut tasks: EntityStore<Task> = EntityStore::new(gw);
        s.generate_next("2", &mut tasks).unwrap();
        s.fetch_all().unwrap();
        let def = s.find("2").unwrap();
        assert_eq!(def.next_due_date, "2024-02-29");
        assert!(!def.is_active);
    }

    #[test]
    fn test_generate_next_refuses_paused() {
        let gw = gateway();
        let mut s: EntityStore<RecurringTask> = EntityStore::new(gw.clone());
        let mut tasks: EntityStore<Task> = EntityStore::new(gw);
        assert!(matches!(s.generate_next("3", &mut tasks), Err(Error::Invalid(_))));
        assert!(tasks.items().is_empty());
    }
}
