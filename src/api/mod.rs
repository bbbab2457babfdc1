// API routes and handlers

pub mod health;
pub mod refresh;
pub mod routes;
pub mod sensors;

pub use routes::{create_routes, TrackerAppState};
