//! SQLite table store.
//!
//! - `migrations`: connection setup, pragmas and the embedded schema
//! - `repo`: the `Repository` through which every table is read and written

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{Repository, SnapshotCommit, SnapshotReading};
