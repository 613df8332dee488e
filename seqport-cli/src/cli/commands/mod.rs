pub mod cache;
pub mod config;
pub mod container;
pub mod gc;
pub mod import;
