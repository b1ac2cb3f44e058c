use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Upload {
    /// uuid file-reference id handed back to callers
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    pub issue_id: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}
