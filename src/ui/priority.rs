use serde::Serialize;

use crate::models::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityStyle {
    pub color: &'static str,
    pub label: &'static str,
}

pub fn priority_style(priority: Priority) -> PriorityStyle {
    match priority {
        Priority::High => PriorityStyle {
            color: "#F44336",
            label: "High",
        },
        Priority::Medium => PriorityStyle {
            color: "#FF9800",
            label: "Medium",
        },
        Priority::Low => PriorityStyle {
            color: "#4CAF50",
            label: "Low",
        },
    }
}
