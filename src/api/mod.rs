pub mod attendance;
pub mod labour;
pub mod location;
pub mod project;
pub mod upload;
