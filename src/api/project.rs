use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::model::project::Project;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ProjectQuery {
    #[schema(example = "active")]
    pub status: Option<String>,
}

/* =========================
List projects
========================= */
/// Swagger doc for project_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Project list", body = [Project]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Project"
)]
pub async fn project_list(
    pool: web::Data<MySqlPool>,
    query: web::Query<ProjectQuery>,
) -> actix_web::Result<impl Responder> {
    let mut sql =
        String::from("SELECT id, name, location, status, start_date FROM projects WHERE 1=1");
    if query.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY name");

    let mut q = sqlx::query_as::<_, Project>(&sql);
    if let Some(status) = query.status.as_deref() {
        q = q.bind(status);
    }

    let projects = q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch project list");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(projects))
}

/* =========================
Get one project
========================= */
/// Swagger doc for get_project endpoint
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project found", body = Project),
        (status = 404, description = "Project not found")
    ),
    tag = "Project"
)]
pub async fn get_project(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let project = sqlx::query_as::<_, Project>(
        "SELECT id, name, location, status, start_date FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, id, "Failed to fetch project");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match project {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Project not found"
        }))),
    }
}
