pub mod auth;
pub mod db;
pub mod metadata;
pub mod storage;
pub mod utils;
