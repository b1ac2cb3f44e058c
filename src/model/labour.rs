use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Row from the dedicated labour registry.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Labour {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
    #[schema(example = "mason", nullable = true)]
    pub trade: Option<String>,
    pub mobile: Option<String>,
}

/// Row from the generic resource registry; only `resource_type = 'labour'`
/// entries take part in attendance.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Resource {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
    #[schema(example = "labour")]
    pub resource_type: String,
}
