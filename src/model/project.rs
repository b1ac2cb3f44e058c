use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Project {
    pub id: u64,
    #[schema(example = "Metro Line 3")]
    pub name: String,
    #[schema(example = "Bengaluru", nullable = true)]
    pub location: Option<String>,
    #[schema(example = "active", nullable = true)]
    pub status: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
}
