// Core crate: shared vocabulary, configuration, and persistence layers used by
// the projection pipeline and its read surface.

pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod records;
