//! Construction-site attendance tracking: REST backend plus the field-side
//! recording workflow (GPS acquisition, reverse geocoding, photo
//! watermarking, duplicate-aware submission).

pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod location;
pub mod model;
pub mod routes;
pub mod utils;
pub mod workflow;
