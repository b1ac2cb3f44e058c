use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::config::Config;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct UploadQuery {
    #[schema(example = "attendance-1.jpg")]
    pub filename: Option<String>,
    /// Optional associations carried alongside the file
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    pub issue_id: Option<u64>,
}

/// Sniffed content type and the extension we store the file under.
fn sniff(body: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(body) {
        Ok(format) => {
            let ext = format.extensions_str().first().copied().unwrap_or("bin");
            (format.to_mime_type(), ext)
        }
        Err(_) => ("application/octet-stream", "bin"),
    }
}

/* =========================
Upload a file
========================= */
/// Swagger doc for upload_file endpoint
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    params(UploadQuery),
    request_body(content = Vec<u8>, description = "Raw file bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "File stored", body = Object, example = json!({
            "id": "7f8d2c1e-1111-2222-3333-444455556666",
            "filename": "attendance-1.jpg",
            "size": 48213
        })),
        (status = 400, description = "Empty body"),
        (status = 413, description = "File too large"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Upload"
)]
pub async fn upload_file(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    if body.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Empty upload"
        })));
    }
    if body.len() > config.max_upload_bytes {
        return Ok(HttpResponse::PayloadTooLarge().json(serde_json::json!({
            "message": format!("File exceeds {} bytes", config.max_upload_bytes)
        })));
    }

    let (content_type, ext) = sniff(&body);
    let id = Uuid::new_v4().to_string();
    let stored_name = format!("{id}.{ext}");
    let filename = query
        .filename
        .clone()
        .unwrap_or_else(|| stored_name.clone());

    let path = std::path::Path::new(&config.upload_dir).join(&stored_name);
    tokio::fs::write(&path, &body).await.map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "Failed to persist upload");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    sqlx::query(
        r#"
        INSERT INTO uploads
            (id, filename, size, content_type, project_id, task_id, issue_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&filename)
    .bind(body.len() as u64)
    .bind(content_type)
    .bind(query.project_id)
    .bind(query.task_id)
    .bind(query.issue_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, id, "Failed to record upload");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id,
        "filename": filename,
        "size": body.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn jpeg_and_png_are_recognized() {
        let img = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(sniff(&png), ("image/png", "png"));

        let mut jpg = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut jpg), image::ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(sniff(&jpg), ("image/jpeg", "jpg"));
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        assert_eq!(sniff(b"%PDF-1.7 ..."), ("application/octet-stream", "bin"));
    }
}
