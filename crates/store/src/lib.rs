//! Storage implementations for clawcraft.

pub mod sqlite;

pub use sqlite::SqliteStore;
