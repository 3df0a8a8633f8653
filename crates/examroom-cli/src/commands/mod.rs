pub mod config;
pub mod exam;
