//! Shared tunables for the AR placement subsystem.

pub mod gesture;
pub mod path;
pub mod placement;
pub mod render_settings;
pub mod shadow;
