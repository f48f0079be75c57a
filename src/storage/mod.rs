//! Persistent storage backed by sled

pub mod database;

pub use database::{Database, UtxoChanges};
