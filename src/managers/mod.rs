// Concept Tracker state managers
// Managers hold in-memory state over the backend: the demo catalog, favorites and folders, sessions.

pub mod demo_catalog;
pub mod favorites_manager;
pub mod session_tracker;
