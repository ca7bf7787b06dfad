pub mod analyze;
pub mod config;
pub mod inference;
pub mod models;
pub mod prompt;
pub mod server;
pub mod shaping;
