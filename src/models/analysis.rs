use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::models::Role;

/// Status reported by the analysis backend for a dispatched task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
}

impl TaskStatus {
    /// Whether the poll loop should keep waiting for this status.
    pub fn in_progress(self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Started | TaskStatus::Retry
        )
    }
}

/// Proposed item fields produced by a successful image analysis. Applied
/// wholesale to the consuming item form, overwriting current values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemAnalysis {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Role,
    /// Estimated available count detected in the image.
    pub available: i32,
}
