use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, patch};
use axum::{Router, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

use crate::db::LiveQuery;
use crate::error::AppError;
use crate::models::{Category, CategoryId, NewCategory, Task, TaskId};
use crate::state::AppState;
use crate::ui::detail::TaskForm;
use crate::ui::{PriorityStyle, TaskDetailState, TaskListQuery, priority_style};

#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub priority_style: PriorityStyle,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let priority_style = priority_style(task.priority);
        Self {
            task,
            priority_style,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub title: &'static str,
    pub count: usize,
    pub empty_message: Option<&'static str>,
    pub tasks: Vec<TaskView>,
}

#[derive(Deserialize)]
struct CompletionRequest {
    is_completed: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/events", get(task_events))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/completion", patch(set_completion))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .with_state(state)
}

/// First outcome of a live query; `Cancelled` if the store is shutting down.
async fn snapshot<T>(mut live: LiveQuery<T>) -> Result<T, AppError>
where
    T: Clone + Send + Sync + 'static,
{
    live.current().await
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(state.db.pool()).await?;
    Ok(StatusCode::OK)
}

async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> Result<Json<TaskListResponse>, AppError> {
    let Query(query) = query?;
    let tasks = query.narrow(snapshot(query.open(&state.view_model)).await?);
    Ok(Json(TaskListResponse {
        title: query.filter.label(),
        count: tasks.len(),
        empty_message: tasks.is_empty().then(|| query.filter.empty_message()),
        tasks: tasks.into_iter().map(TaskView::from).collect(),
    }))
}

async fn task_events(
    State(state): State<AppState>,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Query(query) = query?;
    debug!(?query, "task list subscriber connected");
    let stream = query
        .open(&state.view_model)
        .into_stream()
        .filter_map(move |tasks| {
            let tasks: Vec<TaskView> = query.narrow(tasks).into_iter().map(TaskView::from).collect();
            match Event::default().event("tasks").json_data(&tasks) {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    error!("failed to encode task list event: {}", err);
                    None
                }
            }
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskView>, AppError> {
    let task = snapshot(state.view_model.task_by_id(id))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(TaskView::from(task)))
}

async fn create_task(
    State(state): State<AppState>,
    Json(form): Json<TaskForm>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let mut detail = TaskDetailState::default();
    detail.apply(form);
    let task = detail.save(&state.view_model).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(form): Json<TaskForm>,
) -> Result<Json<Task>, AppError> {
    let mut detail = TaskDetailState::load(&state.view_model, id).await?;
    detail.apply(form);
    let task = detail.save(&state.view_model).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, AppError> {
    let task = snapshot(state.view_model.task_by_id(id))
        .await?
        .ok_or(AppError::NotFound)?;
    if state.view_model.delete_task(task).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn set_completion(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<CompletionRequest>,
) -> Result<StatusCode, AppError> {
    let ok = state
        .view_model
        .set_task_completed(id, req.is_completed)
        .await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    let categories = snapshot(state.view_model.all_categories()).await?;
    Ok(Json(categories))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>, AppError> {
    let category = snapshot(state.view_model.category_by_id(id))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("category name is required".to_string()));
    }
    let category = state.view_model.insert_category(req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(req): Json<NewCategory>,
) -> Result<Json<Category>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("category name is required".to_string()));
    }
    let category = Category {
        id,
        name: req.name,
        color: req.color,
    };
    if state.view_model.update_category(category.clone()).await? {
        Ok(Json(category))
    } else {
        Err(AppError::NotFound)
    }
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    let category = snapshot(state.view_model.category_by_id(id))
        .await?
        .ok_or(AppError::NotFound)?;
    if state.view_model.delete_category(category).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
