pub mod acquire;
pub mod geo;
pub mod geocode;
