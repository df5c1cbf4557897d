//! # DataStore Module
//!
//! This module provides functionality for persisting generated project ideas
//! into a local SQLite database and listing them back, newest first.
//!
//! The module uses sqlx for database operations. The store is append-only:
//! records are inserted once per successful batch and never updated or deleted.

mod datastore;
mod domain;

pub use datastore::sqlite::SqliteDataStore;
pub use datastore::DataStore;
pub use domain::{IdeaRecord, NewIdea};
