use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};

use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::utils::db_utils::{build_update_sql, execute_update};
use crate::workflow::form::compute_hours;

/// Error code returned when the `(employee_id, date)` uniqueness constraint
/// rejects an insert. Clients key their distinct duplicate treatment off
/// this value rather than sniffing message text.
pub const DUPLICATE_CODE: &str = "DUPLICATE_ATTENDANCE";

/// Columns update requests may touch; everything else is rejected.
const UPDATABLE_COLUMNS: &[&str] = &[
    "labour_name",
    "date",
    "time_in",
    "time_out",
    "status",
    "hours",
    "overtime_hours",
    "mobile",
    "is_approved",
];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAttendance {
    /// Present for registered labours; ad-hoc labours carry only a name
    pub employee_id: Option<u64>,
    #[schema(example = "Ravi Kumar")]
    pub labour_name: String,
    pub project_id: u64,
    #[schema(example = "2026-08-25", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00", nullable = true)]
    pub time_in: Option<String>,
    #[schema(example = "17:30", nullable = true)]
    pub time_out: Option<String>,
    #[schema(example = "present")]
    pub status: AttendanceStatus,
    #[schema(example = 8.5)]
    pub hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    /// Upload ids of verification photos
    pub attachments: Vec<String>,
    #[schema(example = "9876543210", nullable = true)]
    pub mobile: Option<String>,
    pub location_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<f64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    /// Filter by project
    pub project_id: Option<u64>,
    /// Filter by registered employee
    pub employee_id: Option<u64>,
    #[schema(example = "2026-08-01", format = "date", value_type = Option<String>)]
    pub date_from: Option<NaiveDate>,
    #[schema(example = "2026-08-31", format = "date", value_type = Option<String>)]
    pub date_to: Option<NaiveDate>,
    #[schema(example = "present")]
    pub status: Option<String>,
    pub is_approved: Option<bool>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct ApproveAttendance {
    /// Approving user, when known
    pub approved_by: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
    Date(NaiveDate),
    Bool(bool),
}

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

/* =========================
Create attendance
========================= */
/// Swagger doc for create_attendance endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body(
        content = CreateAttendance,
        description = "Attendance payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Attendance recorded", body = Object, example = json!({
            "message": "Attendance recorded",
            "id": 1
        })),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Duplicate attendance for this employee and date", body = Object, example = json!({
            "code": "DUPLICATE_ATTENDANCE",
            "message": "Attendance already marked for this labour today"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn create_attendance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAttendance>,
) -> actix_web::Result<impl Responder> {
    // 1️⃣ validate required fields
    if payload.labour_name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "labour_name is required"
        })));
    }
    if payload.attachments.iter().any(|a| a.trim().is_empty()) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "attachments must be non-empty upload ids"
        })));
    }

    // 2️⃣ snapshot the project name at write time
    let project_name = sqlx::query_scalar::<_, String>("SELECT name FROM projects WHERE id = ?")
        .bind(payload.project_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, project_id = payload.project_id, "Project lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    let Some(project_name) = project_name else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Unknown project"
        })));
    };

    let hours = payload
        .hours
        .unwrap_or_else(|| compute_hours(payload.time_in.as_deref(), payload.time_out.as_deref()));

    // 3️⃣ insert; the unique key on (employee_id, date) arbitrates duplicates
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, labour_name, project_id, project_name, date,
             time_in, time_out, status, hours, overtime_hours,
             attachments, mobile, location_text, latitude, longitude, accuracy_m)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.labour_name.trim())
    .bind(payload.project_id)
    .bind(&project_name)
    .bind(payload.date)
    .bind(&payload.time_in)
    .bind(&payload.time_out)
    .bind(payload.status.to_string())
    .bind(hours)
    .bind(payload.overtime_hours)
    .bind(Json(&payload.attachments))
    .bind(&payload.mobile)
    .bind(&payload.location_text)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.accuracy_m)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Attendance recorded",
            "id": done.last_insert_id()
        }))),
        Err(e) if is_duplicate_key(&e) => Ok(HttpResponse::Conflict().json(serde_json::json!({
            "code": DUPLICATE_CODE,
            "message": "Attendance already marked for this labour today"
        }))),
        Err(e) => {
            tracing::error!(error = %e, project_id = payload.project_id, "Create attendance failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/* =========================
List attendance
========================= */
/// Swagger doc for attendance_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn attendance_list(
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(project_id) = query.project_id {
        where_sql.push_str(" AND project_id = ?");
        args.push(FilterValue::U64(project_id));
    }
    if let Some(employee_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(employee_id));
    }
    if let Some(from) = query.date_from {
        where_sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = query.date_to {
        where_sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(to));
    }
    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }
    if let Some(approved) = query.is_approved {
        where_sql.push_str(" AND is_approved = ?");
        args.push(FilterValue::Bool(approved));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM attendance{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
            FilterValue::Date(d) => count_q.bind(*d),
            FilterValue::Bool(b) => count_q.bind(*b),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, employee_id, labour_name, project_id, project_name, date,
               time_in, time_out, status, hours, overtime_hours, attachments,
               mobile, location_text, latitude, longitude, accuracy_m,
               is_approved, approved_by, created_at
        FROM attendance
        {}
        ORDER BY date DESC, created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, Attendance>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
            FilterValue::Date(d) => data_q.bind(d),
            FilterValue::Bool(b) => data_q.bind(b),
        };
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch attendance list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: rows,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Get one attendance
========================= */
/// Swagger doc for get_attendance endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Attendance found", body = Attendance),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let row = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, employee_id, labour_name, project_id, project_name, date,
               time_in, time_out, status, hours, overtime_hours, attachments,
               mobile, location_text, latitude, longitude, accuracy_m,
               is_approved, approved_by, created_at
        FROM attendance
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, id, "Failed to fetch attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match row {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Attendance not found"
        }))),
    }
}

/* =========================
Update attendance
========================= */
/// Swagger doc for update_attendance endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    request_body(content = Object, description = "Subset of updatable fields"),
    responses(
        (status = 200, description = "Attendance updated"),
        (status = 400, description = "No valid fields in payload"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let update = build_update_sql("attendance", &payload, UPDATABLE_COLUMNS, "id", id as i64)?;
    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        tracing::error!(error = %e, id, "Update attendance failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Attendance not found"
        })));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance updated"
    })))
}

/* =========================
Delete attendance
========================= */
/// Swagger doc for delete_attendance endpoint
#[utoipa::path(
    delete,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Attendance deleted"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, id, "Delete attendance failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Attendance not found"
        })));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance deleted"
    })))
}

/* =========================
Approve attendance
========================= */
/// Swagger doc for approve_attendance endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{id}/approve",
    params(("id" = u64, Path, description = "Attendance id")),
    request_body = ApproveAttendance,
    responses(
        (status = 200, description = "Attendance approved", body = Object, example = json!({
            "message": "Attendance approved"
        })),
        (status = 400, description = "Attendance not found or already approved")
    ),
    tag = "Attendance"
)]
pub async fn approve_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ApproveAttendance>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET is_approved = 1, approved_by = ?
        WHERE id = ?
        AND is_approved = 0
        "#,
    )
    .bind(payload.approved_by)
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, id, "Approve attendance failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Attendance not found or already approved"
        })));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance approved"
    })))
}
