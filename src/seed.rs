use chrono::Duration;
use tracing::info;

use crate::error::AppError;
use crate::models::{NewCategory, NewTask, Priority, task::now_millis};
use crate::repository::TaskRepository;

const CATEGORIES: [(&str, &str); 4] = [
    ("Work", "#00BCD4"),
    ("Home", "#4CAF50"),
    ("Health", "#9C27B0"),
    ("Finance", "#FF9800"),
];

/// Inserts sample categories and tasks when there are no categories yet.
/// Returns whether anything was inserted.
pub async fn seed_if_empty(repository: &TaskRepository) -> Result<bool, AppError> {
    if repository.count_categories().await? > 0 {
        return Ok(false);
    }

    let mut inserted = Vec::with_capacity(CATEGORIES.len());
    for (name, color) in CATEGORIES {
        inserted.push(repository.insert_category(NewCategory::new(name, Some(color))).await?);
    }
    let work = &inserted[0];
    let home = &inserted[1];

    let now = now_millis();
    let tasks = [
        NewTask::new("Send weekly report", work.id, Priority::High)
            .with_description("Summarize progress for the team")
            .with_due_date(now + Duration::days(1)),
        NewTask::new("Prepare sprint review", work.id, Priority::Medium)
            .with_due_date(now + Duration::days(3))
            .with_reminder(now + Duration::days(2)),
        NewTask::new("Buy groceries", home.id, Priority::Low)
            .with_description("Milk, bread, coffee"),
    ];
    for task in tasks {
        repository.insert_task(task).await?;
    }

    info!(
        "Seeded {} categories and 3 sample tasks",
        inserted.len()
    );
    Ok(true)
}
