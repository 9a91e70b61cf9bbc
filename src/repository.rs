use std::sync::Arc;

use crate::db::{CategoryStore, Database, LiveQuery, SqliteCategoryStore, SqliteTaskStore, TaskStore};
use crate::error::AppError;
use crate::models::{Category, CategoryId, NewCategory, NewTask, Task, TaskId};

/// Single entry point over the task and category stores.
#[derive(Clone)]
pub struct TaskRepository {
    tasks: Arc<dyn TaskStore>,
    categories: Arc<dyn CategoryStore>,
}

impl TaskRepository {
    pub fn new(tasks: Arc<dyn TaskStore>, categories: Arc<dyn CategoryStore>) -> Self {
        Self { tasks, categories }
    }

    pub fn sqlite(db: Database) -> Self {
        Self::new(
            Arc::new(SqliteTaskStore::new(db.clone())),
            Arc::new(SqliteCategoryStore::new(db)),
        )
    }

    // Tasks

    pub fn all_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.tasks.all()
    }

    pub fn pending_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.tasks.pending()
    }

    pub fn completed_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.tasks.completed()
    }

    pub fn tasks_by_title(&self, title: &str) -> LiveQuery<Vec<Task>> {
        self.tasks.by_title(title)
    }

    pub fn task_by_id(&self, id: TaskId) -> LiveQuery<Option<Task>> {
        self.tasks.by_id(id)
    }

    pub fn tasks_by_category(&self, category_id: CategoryId) -> LiveQuery<Vec<Task>> {
        self.tasks.by_category(category_id)
    }

    pub async fn insert_task(&self, task: NewTask) -> Result<Task, AppError> {
        self.tasks.insert(task).await
    }

    pub async fn update_task(&self, task: &Task) -> Result<bool, AppError> {
        self.tasks.update(task).await
    }

    pub async fn delete_task(&self, task: &Task) -> Result<bool, AppError> {
        self.tasks.delete(task).await
    }

    pub async fn set_task_completed(&self, id: TaskId, is_completed: bool) -> Result<bool, AppError> {
        self.tasks.set_completed(id, is_completed).await
    }

    // Categories

    pub fn all_categories(&self) -> LiveQuery<Vec<Category>> {
        self.categories.all()
    }

    pub fn category_by_id(&self, id: CategoryId) -> LiveQuery<Option<Category>> {
        self.categories.by_id(id)
    }

    pub async fn count_categories(&self) -> Result<i64, AppError> {
        self.categories.count().await
    }

    pub async fn insert_category(&self, category: NewCategory) -> Result<Category, AppError> {
        self.categories.insert(category).await
    }

    pub async fn update_category(&self, category: &Category) -> Result<bool, AppError> {
        self.categories.update(category).await
    }

    pub async fn delete_category(&self, category: &Category) -> Result<bool, AppError> {
        self.categories.delete(category).await
    }
}
