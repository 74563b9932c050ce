use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Path under which locally stored photos are served.
pub const LOCAL_FILE_ROUTE: &str = "/api/photos/file";

/// Tags created by the seed binary.
pub const DEFAULT_TAGS: [&str; 4] = ["wildlife", "family", "bird", "sealife"];
