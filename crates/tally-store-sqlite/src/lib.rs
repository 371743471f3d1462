//! SQLite backend for the Tally ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] implements the
//! registry, ledger and roster traits from `tally-core`.

mod encode;
mod ledger;
mod registry;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
