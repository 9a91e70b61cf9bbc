use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::{Database, LiveQuery, TableChange};
use crate::error::AppError;
use crate::models::{CategoryId, NewTask, Task, TaskId, task::TaskRow};

const SELECT_TASKS: &str = "SELECT id, title, description, createdDate, dueDate, reminderTime, priority, categoryId, isCompleted FROM tasks";

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task and returns it with its assigned id.
    async fn insert(&self, task: NewTask) -> Result<Task, AppError>;
    /// Replaces the stored task with the same id. `false` if there was none.
    async fn update(&self, task: &Task) -> Result<bool, AppError>;
    async fn delete(&self, task: &Task) -> Result<bool, AppError>;
    /// Sets only the completion flag.
    async fn set_completed(&self, id: TaskId, is_completed: bool) -> Result<bool, AppError>;

    fn all(&self) -> LiveQuery<Vec<Task>>;
    fn pending(&self) -> LiveQuery<Vec<Task>>;
    fn completed(&self) -> LiveQuery<Vec<Task>>;
    /// Unanchored, ASCII case-insensitive substring match on the title.
    fn by_title(&self, title: &str) -> LiveQuery<Vec<Task>>;
    fn by_category(&self, category_id: CategoryId) -> LiveQuery<Vec<Task>>;
    fn by_id(&self, id: TaskId) -> LiveQuery<Option<Task>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskQuery {
    All,
    Completion(bool),
    Title(String),
    Category(CategoryId),
}

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db: Database,
}

impl SqliteTaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn live_list(&self, query: TaskQuery) -> LiveQuery<Vec<Task>> {
        self.db.live(TableChange::Tasks, move |pool| {
            let query = query.clone();
            async move { fetch_tasks(&pool, &query).await }
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: NewTask) -> Result<Task, AppError> {
        validate_title(&task.title)?;

        let id = sqlx::query(
            r#"
            INSERT INTO tasks
                (title, description, createdDate, dueDate, reminderTime,
                priority, categoryId, isCompleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.created_date.timestamp_millis())
        .bind(task.due_date.map(|ts| ts.timestamp_millis()))
        .bind(task.reminder_time.map(|ts| ts.timestamp_millis()))
        .bind(task.priority)
        .bind(task.category_id)
        .bind(task.is_completed)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        debug!(task_id = id, category_id = task.category_id, "task inserted");
        self.db.changes().notify(&[TableChange::Tasks]);
        Ok(task.into_task(id))
    }

    async fn update(&self, task: &Task) -> Result<bool, AppError> {
        validate_title(&task.title)?;

        let affected = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?1,
                description = ?2,
                createdDate = ?3,
                dueDate = ?4,
                reminderTime = ?5,
                priority = ?6,
                categoryId = ?7,
                isCompleted = ?8
            WHERE id = ?9
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.created_date.timestamp_millis())
        .bind(task.due_date.map(|ts| ts.timestamp_millis()))
        .bind(task.reminder_time.map(|ts| ts.timestamp_millis()))
        .bind(task.priority)
        .bind(task.category_id)
        .bind(task.is_completed)
        .bind(task.id)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        debug!(task_id = task.id, affected, "task updated");
        if affected > 0 {
            self.db.changes().notify(&[TableChange::Tasks]);
        }
        Ok(affected > 0)
    }

    async fn delete(&self, task: &Task) -> Result<bool, AppError> {
        let affected = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(task.id)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        debug!(task_id = task.id, affected, "task deleted");
        if affected > 0 {
            self.db.changes().notify(&[TableChange::Tasks]);
        }
        Ok(affected > 0)
    }

    async fn set_completed(&self, id: TaskId, is_completed: bool) -> Result<bool, AppError> {
        let affected = sqlx::query("UPDATE tasks SET isCompleted = ?1 WHERE id = ?2")
            .bind(is_completed)
            .bind(id)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        debug!(task_id = id, is_completed, affected, "task completion set");
        if affected > 0 {
            self.db.changes().notify(&[TableChange::Tasks]);
        }
        Ok(affected > 0)
    }

    fn all(&self) -> LiveQuery<Vec<Task>> {
        self.live_list(TaskQuery::All)
    }

    fn pending(&self) -> LiveQuery<Vec<Task>> {
        self.live_list(TaskQuery::Completion(false))
    }

    fn completed(&self) -> LiveQuery<Vec<Task>> {
        self.live_list(TaskQuery::Completion(true))
    }

    fn by_title(&self, title: &str) -> LiveQuery<Vec<Task>> {
        self.live_list(TaskQuery::Title(title.to_string()))
    }

    fn by_category(&self, category_id: CategoryId) -> LiveQuery<Vec<Task>> {
        self.live_list(TaskQuery::Category(category_id))
    }

    fn by_id(&self, id: TaskId) -> LiveQuery<Option<Task>> {
        self.db.live(TableChange::Tasks, move |pool| async move {
            find_task_by_id(&pool, id).await
        })
    }
}

async fn fetch_tasks(db: &SqlitePool, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
    let rows = match query {
        TaskQuery::All => {
            let sql = format!("{SELECT_TASKS} ORDER BY id");
            sqlx::query_as::<_, TaskRow>(&sql).fetch_all(db).await?
        }
        TaskQuery::Completion(is_completed) => {
            let sql = format!("{SELECT_TASKS} WHERE isCompleted = ?1 ORDER BY id");
            sqlx::query_as::<_, TaskRow>(&sql)
                .bind(*is_completed)
                .fetch_all(db)
                .await?
        }
        TaskQuery::Title(needle) => {
            let sql = format!(
                "{SELECT_TASKS} WHERE title LIKE '%' || ?1 || '%' ESCAPE '\\' ORDER BY id"
            );
            sqlx::query_as::<_, TaskRow>(&sql)
                .bind(escape_like(needle))
                .fetch_all(db)
                .await?
        }
        TaskQuery::Category(category_id) => {
            let sql = format!("{SELECT_TASKS} WHERE categoryId = ?1 ORDER BY id");
            sqlx::query_as::<_, TaskRow>(&sql)
                .bind(*category_id)
                .fetch_all(db)
                .await?
        }
    };

    rows.into_iter()
        .map(|row| Task::try_from(row).map_err(AppError::from))
        .collect()
}

pub(crate) async fn find_task_by_id(db: &SqlitePool, id: TaskId) -> Result<Option<Task>, AppError> {
    let sql = format!("{SELECT_TASKS} WHERE id = ?1");
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(Task::try_from).transpose()?)
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::ConstraintViolation(
            "task title must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Escapes LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::db::{CategoryStore, SqliteCategoryStore};
    use crate::models::{NewCategory, Priority};

    async fn setup() -> (SqliteTaskStore, CategoryId) {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test db");
        let categories = SqliteCategoryStore::new(db.clone());
        let work = categories
            .insert(NewCategory::new("Work", Some("#00BCD4")))
            .await
            .expect("Failed to insert category");
        (SqliteTaskStore::new(db), work.id)
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_round_trips() {
        let (store, work) = setup().await;

        let new = NewTask::new("Send report", work, Priority::High)
            .with_description("Quarterly numbers")
            .with_due_date(at(1_767_000_000_000))
            .with_reminder(at(1_766_990_000_000));
        let task = store.insert(new.clone()).await.expect("Failed to insert task");
        assert_eq!(task.id, 1);

        let mut by_id = store.by_id(task.id);
        let stored = by_id.next().await.flatten().expect("Task not found");
        assert_eq!(stored, task);
        assert_eq!(stored.title, new.title);
        assert_eq!(stored.description, new.description);
        assert_eq!(stored.created_date, new.created_date);
        assert_eq!(stored.due_date, new.due_date);
        assert_eq!(stored.reminder_time, new.reminder_time);
        assert_eq!(stored.priority, Priority::High);
        assert!(!stored.is_completed);

        let second = store
            .insert(NewTask::new("Plan sprint", work, Priority::Low))
            .await
            .expect("Failed to insert task");
        assert_ne!(second.id, task.id);
    }

    #[tokio::test]
    async fn test_insert_with_unknown_category_is_rejected() {
        let (store, work) = setup().await;

        let err = store
            .insert(NewTask::new("Orphan", work + 100, Priority::Low))
            .await
            .expect_err("insert should fail");
        assert!(matches!(err, AppError::ConstraintViolation(_)), "{err:?}");

        let mut all = store.all();
        assert_eq!(all.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let (store, work) = setup().await;
        let err = store
            .insert(NewTask::new("   ", work, Priority::Low))
            .await
            .expect_err("insert should fail");
        assert!(matches!(err, AppError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_set_completed_changes_only_the_flag() {
        let (store, work) = setup().await;
        let task = store
            .insert(NewTask::new("Send report", work, Priority::High).with_description("d"))
            .await
            .unwrap();

        let mut by_id = store.by_id(task.id);
        assert_eq!(by_id.next().await.flatten(), Some(task.clone()));

        assert!(store.set_completed(task.id, true).await.unwrap());
        let toggled = by_id
            .wait_for(|t| t.as_ref().is_some_and(|t| t.is_completed))
            .await
            .flatten()
            .unwrap();
        assert_eq!(
            toggled,
            Task {
                is_completed: true,
                ..task
            }
        );

        assert!(!store.set_completed(999, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_and_completed_partition_all() {
        let (store, work) = setup().await;
        for (i, title) in ["a", "b", "c", "d"].iter().enumerate() {
            let task = store
                .insert(NewTask::new(*title, work, Priority::Medium))
                .await
                .unwrap();
            if i % 2 == 0 {
                store.set_completed(task.id, true).await.unwrap();
            }
        }

        let all = store.all().next().await.unwrap();
        let pending = store.pending().next().await.unwrap();
        let completed = store.completed().next().await.unwrap();

        let expected: Vec<Task> = all
            .iter()
            .filter(|t| !completed.contains(t))
            .cloned()
            .collect();
        assert_eq!(pending, expected);
        assert_eq!(pending.len() + completed.len(), all.len());
        assert!(pending.iter().all(|t| !t.is_completed));
    }

    #[tokio::test]
    async fn test_by_title_is_case_insensitive_substring() {
        let (store, work) = setup().await;
        store
            .insert(NewTask::new("Send Report", work, Priority::High))
            .await
            .unwrap();
        store
            .insert(NewTask::new("Buy milk", work, Priority::Low))
            .await
            .unwrap();
        store
            .insert(NewTask::new("100% done", work, Priority::Low))
            .await
            .unwrap();

        let hits = store.by_title("report").next().await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Send Report");

        let literal = store.by_title("0%").next().await.unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].title, "100% done");

        let everything = store.by_title("").next().await.unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let (store, work) = setup().await;
        let task = store
            .insert(NewTask::new("Draft", work, Priority::Low))
            .await
            .unwrap();

        let edited = Task {
            title: "Final".to_string(),
            priority: Priority::High,
            due_date: Some(at(1_800_000_000_000)),
            ..task.clone()
        };
        assert!(store.update(&edited).await.unwrap());

        let stored = store.by_id(task.id).next().await.flatten().unwrap();
        assert_eq!(stored, edited);

        let ghost = Task { id: 42, ..edited };
        assert!(!store.update(&ghost).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_to_unknown_category_is_rejected() {
        let (store, work) = setup().await;
        let task = store
            .insert(NewTask::new("Draft", work, Priority::Low))
            .await
            .unwrap();

        let moved = Task {
            category_id: work + 7,
            ..task.clone()
        };
        let err = store.update(&moved).await.expect_err("update should fail");
        assert!(matches!(err, AppError::ConstraintViolation(_)));

        let stored = store.by_id(task.id).next().await.flatten().unwrap();
        assert_eq!(stored.category_id, work);
    }

    #[tokio::test]
    async fn test_live_list_follows_writes() {
        let (store, work) = setup().await;
        let mut all = store.all();
        assert_eq!(all.next().await, Some(vec![]));

        let task = store
            .insert(NewTask::new("Send report", work, Priority::High))
            .await
            .unwrap();
        let seen = all.wait_for(|tasks| tasks.len() == 1).await.unwrap();
        assert_eq!(seen[0], task);

        assert!(store.delete(&task).await.unwrap());
        all.wait_for(|tasks| tasks.is_empty()).await.unwrap();
        assert!(!store.delete(&task).await.unwrap());
    }

    #[tokio::test]
    async fn test_by_id_of_missing_task_is_none() {
        let (store, _) = setup().await;
        assert_eq!(store.by_id(12).next().await, Some(None));
    }

    #[tokio::test]
    async fn test_writes_after_close_fail_with_storage_error() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteTaskStore::new(db.clone());
        db.close().await;

        let err = store
            .insert(NewTask::new("Too late", 1, Priority::Low))
            .await
            .expect_err("insert should fail");
        assert!(matches!(err, AppError::Storage(_)));
    }
}
