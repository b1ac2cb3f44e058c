use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::model::labour::{Labour, Resource};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LabourQuery {
    /// Scope the list to one project
    pub project_id: Option<u64>,
}

/// One person who can be marked present, merged from the labour registry
/// and the labor-typed resource registry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabourEntry {
    /// Registry id when the entry comes from the labour registry
    pub employee_id: Option<u64>,
    pub name: String,
    pub project_id: u64,
    #[schema(example = "mason", nullable = true)]
    pub trade: Option<String>,
    /// "labour" or "resource"
    pub source: String,
}

impl From<Labour> for LabourEntry {
    fn from(l: Labour) -> Self {
        Self {
            employee_id: Some(l.id),
            name: l.name,
            project_id: l.project_id,
            trade: l.trade,
            source: "labour".into(),
        }
    }
}

impl From<Resource> for LabourEntry {
    fn from(r: Resource) -> Self {
        Self {
            employee_id: None,
            name: r.name,
            project_id: r.project_id,
            trade: None,
            source: "resource".into(),
        }
    }
}

/// Merge the two registries, de-duplicating by (name, project). The
/// dedicated labour registry wins on collision since it carries the
/// employee reference needed for the uniqueness constraint.
pub fn merge_registries(labours: Vec<Labour>, resources: Vec<Resource>) -> Vec<LabourEntry> {
    let mut merged: Vec<LabourEntry> = labours.into_iter().map(LabourEntry::from).collect();

    for resource in resources {
        let duplicate = merged.iter().any(|e| {
            e.project_id == resource.project_id
                && e.name.trim().eq_ignore_ascii_case(resource.name.trim())
        });
        if !duplicate {
            merged.push(LabourEntry::from(resource));
        }
    }
    merged
}

/* =========================
List labours (merged registries)
========================= */
/// Swagger doc for labour_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/labours",
    params(LabourQuery),
    responses(
        (status = 200, description = "Merged labour list", body = [LabourEntry]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Labour"
)]
pub async fn labour_list(
    pool: web::Data<MySqlPool>,
    query: web::Query<LabourQuery>,
) -> actix_web::Result<impl Responder> {
    let mut labour_sql =
        String::from("SELECT id, name, project_id, trade, mobile FROM labours WHERE 1=1");
    let mut resource_sql = String::from(
        "SELECT id, name, project_id, resource_type FROM resources WHERE resource_type = 'labour'",
    );
    if query.project_id.is_some() {
        labour_sql.push_str(" AND project_id = ?");
        resource_sql.push_str(" AND project_id = ?");
    }

    let mut labour_q = sqlx::query_as::<_, Labour>(&labour_sql);
    let mut resource_q = sqlx::query_as::<_, Resource>(&resource_sql);
    if let Some(project_id) = query.project_id {
        labour_q = labour_q.bind(project_id);
        resource_q = resource_q.bind(project_id);
    }

    let labours = labour_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch labour registry");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let resources = resource_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch resource registry");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(merge_registries(labours, resources)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labour(id: u64, name: &str, project_id: u64) -> Labour {
        Labour {
            id,
            name: name.into(),
            project_id,
            trade: None,
            mobile: None,
        }
    }

    fn resource(id: u64, name: &str, project_id: u64) -> Resource {
        Resource {
            id,
            name: name.into(),
            project_id,
            resource_type: "labour".into(),
        }
    }

    #[test]
    fn resources_with_the_same_name_and_project_are_dropped() {
        let merged = merge_registries(
            vec![labour(1, "Ravi Kumar", 10)],
            vec![resource(5, "ravi kumar ", 10), resource(6, "Anand", 10)],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].employee_id, Some(1));
        assert_eq!(merged[1].name, "Anand");
        assert_eq!(merged[1].source, "resource");
    }

    #[test]
    fn same_name_on_a_different_project_is_kept() {
        let merged = merge_registries(
            vec![labour(1, "Ravi Kumar", 10)],
            vec![resource(5, "Ravi Kumar", 11)],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn registry_entries_keep_their_employee_reference() {
        let merged = merge_registries(vec![labour(42, "Meena", 1)], vec![]);
        assert_eq!(merged[0].employee_id, Some(42));
        assert_eq!(merged[0].source, "labour");
    }
}
