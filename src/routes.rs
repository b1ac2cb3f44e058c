use crate::{
    api::{attendance, labour, location, project, upload},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let upload_limiter = build_limiter(config.rate_upload_per_min);
    let api_limiter = build_limiter(config.rate_api_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(api_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::create_attendance))
                            .route(web::get().to(attendance::attendance_list)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    )
                    // /attendance/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(attendance::approve_attendance)),
                    ),
            )
            .service(
                web::scope("/projects")
                    // /projects
                    .service(web::resource("").route(web::get().to(project::project_list)))
                    // /projects/{id}
                    .service(web::resource("/{id}").route(web::get().to(project::get_project))),
            )
            .service(
                web::scope("/labours")
                    // /labours?project_id=
                    .service(web::resource("").route(web::get().to(labour::labour_list))),
            )
            .service(
                web::scope("/location")
                    // /location/resolve?lat=&lng=
                    .service(
                        web::resource("/resolve").route(web::get().to(location::resolve_address)),
                    ),
            )
            .service(
                web::scope("/uploads")
                    // /uploads
                    .service(
                        web::resource("")
                            .wrap(upload_limiter)
                            .route(web::post().to(upload::upload_file)),
                    ),
            ),
    );
}
