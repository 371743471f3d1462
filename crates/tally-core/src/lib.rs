//! Core types and trait definitions for the Tally lending ledger.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement the [`store`] traits; every mutation of unit
//! counters and assignment status goes through the [`Coordinator`].

pub mod assignment;
pub mod coordinator;
pub mod error;
pub mod resource;
pub mod store;
pub mod subject;

pub use coordinator::Coordinator;
pub use error::{Error, Result};
