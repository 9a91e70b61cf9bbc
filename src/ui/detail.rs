use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{CategoryId, NewTask, Priority, Task, TaskId, task::{now_millis, truncate_millis}};
use crate::viewmodel::TaskViewModel;

/// Field values submitted from the detail screen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskForm {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_completed: bool,
}

/// State of the create/edit form. A fresh state creates a task; one loaded
/// from a stored task is in edit mode and saves as a full update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskDetailState {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// `0` until a category is picked.
    pub category_id: CategoryId,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub is_completed: bool,
    pub is_edit_mode: bool,
    #[serde(skip)]
    created_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAction {
    Insert(NewTask),
    Update(Task),
}

impl TaskDetailState {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            category_id: task.category_id,
            due_date: task.due_date,
            reminder_time: task.reminder_time,
            priority: task.priority,
            is_completed: task.is_completed,
            is_edit_mode: true,
            created_date: Some(task.created_date),
        }
    }

    /// Loads the stored task into an edit-mode form.
    pub async fn load(view_model: &TaskViewModel, id: TaskId) -> Result<Self, AppError> {
        view_model
            .task_by_id(id)
            .current()
            .await?
            .map(|task| Self::from_task(&task))
            .ok_or(AppError::NotFound)
    }

    pub fn apply(&mut self, form: TaskForm) {
        self.title = form.title;
        self.description = form.description.unwrap_or_default();
        self.category_id = form.category_id;
        self.due_date = form.due_date;
        self.reminder_time = form.reminder_time;
        self.priority = form.priority;
        self.is_completed = form.is_completed;
    }

    pub fn title_label(&self) -> &'static str {
        if self.is_edit_mode { "Edit Task" } else { "New Task" }
    }

    pub fn save_label(&self) -> &'static str {
        if self.is_edit_mode { "Update Task" } else { "Save Task" }
    }

    pub fn can_save(&self) -> bool {
        !self.title.trim().is_empty() && self.category_id != 0
    }

    pub fn into_save_action(self) -> Result<SaveAction, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }
        if self.category_id == 0 {
            return Err(AppError::BadRequest("a category must be selected".to_string()));
        }

        let description = Some(self.description).filter(|d| !d.trim().is_empty());
        // Storage keeps millisecond precision; save what a later read returns.
        let due_date = self.due_date.map(truncate_millis);
        let reminder_time = self.reminder_time.map(truncate_millis);

        if self.is_edit_mode {
            Ok(SaveAction::Update(Task {
                id: self.id,
                title: self.title,
                description,
                created_date: self.created_date.map_or_else(now_millis, truncate_millis),
                due_date,
                reminder_time,
                priority: self.priority,
                category_id: self.category_id,
                is_completed: self.is_completed,
            }))
        } else {
            Ok(SaveAction::Insert(NewTask {
                title: self.title,
                description,
                created_date: now_millis(),
                due_date,
                reminder_time,
                priority: self.priority,
                category_id: self.category_id,
                is_completed: self.is_completed,
            }))
        }
    }

    /// Saves through the view-model and waits for the write to land.
    pub async fn save(self, view_model: &TaskViewModel) -> Result<Task, AppError> {
        match self.into_save_action()? {
            SaveAction::Insert(new) => view_model.insert_task(new).await,
            SaveAction::Update(task) => {
                if view_model.update_task(task.clone()).await? {
                    Ok(task)
                } else {
                    Err(AppError::NotFound)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_task() -> Task {
        let mut new = NewTask::new("Send report", 3, Priority::High).with_description("Q3");
        new.created_date = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        new.into_task(9)
    }

    #[test]
    fn fresh_state_is_a_new_medium_task() {
        let state = TaskDetailState::default();
        assert!(!state.is_edit_mode);
        assert_eq!(state.priority, Priority::Medium);
        assert_eq!(state.title_label(), "New Task");
        assert!(!state.can_save());
    }

    #[test]
    fn can_save_needs_title_and_category() {
        let mut state = TaskDetailState {
            title: "  ".to_string(),
            category_id: 1,
            ..Default::default()
        };
        assert!(!state.can_save());
        state.title = "Buy milk".to_string();
        assert!(state.can_save());
        state.category_id = 0;
        assert!(!state.can_save());
        assert!(matches!(state.into_save_action(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn new_form_saves_as_insert_with_blank_description_dropped() {
        let state = TaskDetailState {
            title: "Buy milk".to_string(),
            description: "   ".to_string(),
            category_id: 2,
            ..Default::default()
        };
        match state.into_save_action().unwrap() {
            SaveAction::Insert(new) => {
                assert_eq!(new.title, "Buy milk");
                assert_eq!(new.description, None);
                assert_eq!(new.category_id, 2);
                assert_eq!(new.priority, Priority::Medium);
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn edit_form_keeps_id_and_creation_time() {
        let task = stored_task();
        let mut state = TaskDetailState::from_task(&task);
        assert!(state.is_edit_mode);
        assert_eq!(state.save_label(), "Update Task");

        state.apply(TaskForm {
            title: "Send final report".to_string(),
            description: None,
            category_id: 3,
            due_date: None,
            reminder_time: None,
            priority: Priority::Low,
            is_completed: true,
        });

        match state.into_save_action().unwrap() {
            SaveAction::Update(updated) => {
                assert_eq!(updated.id, task.id);
                assert_eq!(updated.created_date, task.created_date);
                assert_eq!(updated.title, "Send final report");
                assert_eq!(updated.description, None);
                assert!(updated.is_completed);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn saved_timestamps_match_storage_precision() {
        let due = DateTime::parse_from_rfc3339("2026-11-01T09:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut state = TaskDetailState::from_task(&stored_task());
        state.due_date = Some(due);
        state.reminder_time = Some(due);

        let expected = DateTime::parse_from_rfc3339("2026-11-01T09:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        match state.into_save_action().unwrap() {
            SaveAction::Update(updated) => {
                assert_eq!(updated.due_date, Some(expected));
                assert_eq!(updated.reminder_time, Some(expected));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
}
