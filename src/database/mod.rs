//! SQLite storage behind the backend gateway.
//!
//! [`Database`] opens a file or in-memory store and applies the versioned
//! migrations in [`migrations`] before any query runs.

pub mod connection;
pub mod migrations;

pub use connection::Database;
