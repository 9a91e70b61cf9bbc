use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::db::LiveQuery;
use crate::models::{CategoryId, Task};
use crate::viewmodel::TaskViewModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    pub fn label(self) -> &'static str {
        match self {
            TaskFilter::All => "All",
            TaskFilter::Pending => "Pending",
            TaskFilter::Completed => "Completed",
        }
    }

    /// Shown by the list screen when nothing matches.
    pub fn empty_message(self) -> &'static str {
        match self {
            TaskFilter::All => "You have no tasks yet. Start by adding one!",
            TaskFilter::Pending => "All done! Nothing is pending.",
            TaskFilter::Completed => "You haven't completed any task yet.",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !task.is_completed,
            TaskFilter::Completed => task.is_completed,
        }
    }

    pub fn live(self, view_model: &TaskViewModel) -> LiveQuery<Vec<Task>> {
        match self {
            TaskFilter::All => view_model.all_tasks(),
            TaskFilter::Pending => view_model.pending_tasks(),
            TaskFilter::Completed => view_model.completed_tasks(),
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TaskFilter::All),
            "pending" => Ok(TaskFilter::Pending),
            "completed" => Ok(TaskFilter::Completed),
            other => Err(format!("unknown filter `{other}`, expected all, pending or completed")),
        }
    }
}

/// An empty value (`?category=`) counts as absent.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

fn blank_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    blank_as_none(deserializer).map(Option::unwrap_or_default)
}

/// What the list screen is showing: a completion filter, optionally
/// narrowed to one category and a title search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskListQuery {
    #[serde(default, deserialize_with = "blank_as_default")]
    pub filter: TaskFilter,
    /// `0` means no category is selected.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TaskListQuery {
    fn selected_category(&self) -> Option<CategoryId> {
        self.category.filter(|id| *id != 0)
    }

    /// Live query backing this list; apply [`TaskListQuery::narrow`] to
    /// each snapshot.
    pub fn open(&self, view_model: &TaskViewModel) -> LiveQuery<Vec<Task>> {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => view_model.tasks_by_title(title),
            _ => self.filter.live(view_model),
        }
    }

    pub fn narrow(&self, tasks: Vec<Task>) -> Vec<Task> {
        let category = self.selected_category();
        tasks
            .into_iter()
            .filter(|task| self.filter.matches(task))
            .filter(|task| category.is_none_or(|id| task.category_id == id))
            .collect()
    }
}
