// Concept Tracker shared type definitions
// Each submodule defines types used across the application.

pub mod activity;
pub mod analytics;
pub mod config;
pub mod demo;
pub mod errors;
pub mod favorite;
pub mod mutation;
pub mod profile;
pub mod session;
