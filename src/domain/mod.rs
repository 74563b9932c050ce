pub mod entities;
pub mod tags;
pub mod use_cases;
