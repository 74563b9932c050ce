pub mod photo;
pub mod tag;
pub mod token;
pub mod user;
