pub mod attendance;
pub mod labour;
pub mod project;
pub mod upload;
