use std::sync::Arc;

use crate::db::Database;
use crate::viewmodel::TaskViewModel;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub view_model: Arc<TaskViewModel>,
}
