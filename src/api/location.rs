use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::location::geocode::AddressResolver;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ResolveQuery {
    #[schema(example = 12.971599)]
    pub lat: f64,
    #[schema(example = 77.594566)]
    pub lng: f64,
}

/* =========================
Reverse-geocode coordinates
========================= */
/// Swagger doc for resolve_address endpoint
#[utoipa::path(
    get,
    path = "/api/v1/location/resolve",
    params(ResolveQuery),
    responses(
        (status = 200, description = "Best-effort address; degrades to raw coordinates", body = Object, example = json!({
            "address": "Koramangala, Bengaluru, Karnataka, India"
        }))
    ),
    tag = "Location"
)]
pub async fn resolve_address(
    resolver: web::Data<AddressResolver>,
    query: web::Query<ResolveQuery>,
) -> actix_web::Result<impl Responder> {
    // Never fails; provider exhaustion falls back to coordinate text
    let address = resolver.resolve(query.lat, query.lng).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "address": address })))
}
