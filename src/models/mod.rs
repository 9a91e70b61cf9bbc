pub mod category;
pub mod task;

pub use category::{Category, CategoryId, NewCategory};
pub use task::{NewTask, Priority, Task, TaskId};
