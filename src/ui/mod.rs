//! Screen-side logic that sits on top of the view-model.

pub mod detail;
pub mod filter;
pub mod priority;

pub use detail::{SaveAction, TaskDetailState};
pub use filter::{TaskFilter, TaskListQuery};
pub use priority::{PriorityStyle, priority_style};
