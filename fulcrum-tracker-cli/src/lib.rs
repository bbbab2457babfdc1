// Library exports for the Fulcrum Tracker CLI

pub mod api;
pub mod commands;
pub mod config;
pub mod models;
