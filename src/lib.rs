pub mod cache;
pub mod config;
pub mod duration;
pub mod error;
pub mod format;
pub mod models;
pub mod portfolio;
pub mod sources;
