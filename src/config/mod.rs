// Configuration loading

pub mod app;
pub mod tracker;

pub use app::AppConfig;
pub use tracker::*;
