use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    // Uploads
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    // Rate limiting
    pub rate_upload_per_min: u32,
    pub rate_api_per_min: u32,

    // Reverse geocoding chain, in priority order
    pub nominatim_url: String,
    pub bigdatacloud_url: String,
    pub photon_url: String,
    pub geocoder_user_agent: String,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| "5242880".to_string()) // default 5 MB
                .parse()
                .unwrap(),

            rate_upload_per_min: env::var("RATE_UPLOAD_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_api_per_min: env::var("RATE_API_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            nominatim_url: env::var("NOMINATIM_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            bigdatacloud_url: env::var("BIGDATACLOUD_URL")
                .unwrap_or_else(|_| "https://api.bigdatacloud.net".to_string()),
            photon_url: env::var("PHOTON_URL")
                .unwrap_or_else(|_| "https://photon.komoot.io".to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| "sitetrack/0.1".to_string()),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }
}
