//! Staging store: SQLite persistence for scraped postings and scrape runs.
//!
//! - `model`: view models that only exist as query results.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! Callers import from `jobsync::db`; the repository API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::SourceCount;
