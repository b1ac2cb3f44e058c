use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    Overtime,
}

/// One attendance row. `(employee_id, date)` is unique at the storage layer
/// whenever an employee reference is present; `project_name` is a snapshot
/// taken at write time so the row stays displayable after project renames.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: Option<u64>,
    #[schema(example = "Ravi Kumar")]
    pub labour_name: String,
    pub project_id: u64,
    #[schema(example = "Metro Line 3")]
    pub project_name: String,
    #[schema(example = "2026-08-25", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00", nullable = true)]
    pub time_in: Option<String>,
    #[schema(example = "17:30", nullable = true)]
    pub time_out: Option<String>,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = 8.5)]
    pub hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    /// Upload ids of verification photos, in capture order
    #[schema(value_type = Vec<String>)]
    pub attachments: Json<Vec<String>>,
    #[schema(example = "9876543210", nullable = true)]
    pub mobile: Option<String>,
    #[schema(example = "Koramangala, Bengaluru, Karnataka, India", nullable = true)]
    pub location_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub is_approved: bool,
    pub approved_by: Option<u64>,
    #[schema(example = "2026-08-25T09:01:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}
