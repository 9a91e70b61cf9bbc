use crate::db::LiveQuery;
use crate::models::{Category, CategoryId, NewCategory, NewTask, Task, TaskId};
use crate::repository::TaskRepository;
use crate::scope::{Pending, Scope};

/// Presentation-facing adapter: reads are the repository's live queries,
/// writes run on the view-model's own [`Scope`].
///
/// Dropping the view-model (or calling [`TaskViewModel::close`]) cancels
/// writes that have not finished.
pub struct TaskViewModel {
    repository: TaskRepository,
    scope: Scope,
}

impl TaskViewModel {
    pub fn new(repository: TaskRepository) -> Self {
        Self {
            repository,
            scope: Scope::new("task_view_model"),
        }
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repository
    }

    pub async fn close(&self) {
        self.scope.close().await;
    }

    // Tasks

    pub fn all_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.repository.all_tasks()
    }

    pub fn pending_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.repository.pending_tasks()
    }

    pub fn completed_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.repository.completed_tasks()
    }

    pub fn tasks_by_title(&self, title: &str) -> LiveQuery<Vec<Task>> {
        self.repository.tasks_by_title(title)
    }

    pub fn task_by_id(&self, id: TaskId) -> LiveQuery<Option<Task>> {
        self.repository.task_by_id(id)
    }

    pub fn tasks_by_category(&self, category_id: CategoryId) -> LiveQuery<Vec<Task>> {
        self.repository.tasks_by_category(category_id)
    }

    pub fn insert_task(&self, task: NewTask) -> Pending<Task> {
        let repository = self.repository.clone();
        self.scope.launch("insert_task", async move {
            repository.insert_task(task).await
        })
    }

    pub fn update_task(&self, task: Task) -> Pending<bool> {
        let repository = self.repository.clone();
        self.scope.launch("update_task", async move {
            repository.update_task(&task).await
        })
    }

    pub fn delete_task(&self, task: Task) -> Pending<bool> {
        let repository = self.repository.clone();
        self.scope.launch("delete_task", async move {
            repository.delete_task(&task).await
        })
    }

    pub fn set_task_completed(&self, id: TaskId, is_completed: bool) -> Pending<bool> {
        let repository = self.repository.clone();
        self.scope.launch("set_task_completed", async move {
            repository.set_task_completed(id, is_completed).await
        })
    }

    // Categories

    pub fn all_categories(&self) -> LiveQuery<Vec<Category>> {
        self.repository.all_categories()
    }

    pub fn category_by_id(&self, id: CategoryId) -> LiveQuery<Option<Category>> {
        self.repository.category_by_id(id)
    }

    pub fn insert_category(&self, category: NewCategory) -> Pending<Category> {
        let repository = self.repository.clone();
        self.scope.launch("insert_category", async move {
            repository.insert_category(category).await
        })
    }

    pub fn update_category(&self, category: Category) -> Pending<bool> {
        let repository = self.repository.clone();
        self.scope.launch("update_category", async move {
            repository.update_category(&category).await
        })
    }

    pub fn delete_category(&self, category: Category) -> Pending<bool> {
        let repository = self.repository.clone();
        self.scope.launch("delete_category", async move {
            repository.delete_category(&category).await
        })
    }
}
