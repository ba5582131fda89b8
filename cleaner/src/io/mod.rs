//! I/O helpers for cleaner commands.

pub mod ascii_scene;
pub mod backup;
pub mod config;
pub mod discover;
pub mod fs;
pub mod report;
pub mod runtime;
