pub mod auth;
pub mod json_error;
pub mod photos;
pub mod system;
pub mod upload;
