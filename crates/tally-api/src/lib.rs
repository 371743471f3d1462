//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] backed by a [`Coordinator`] over any
//! [`Store`]. Transport, TLS and auth concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(coordinator.clone()))
//! ```

pub mod assignments;
pub mod error;
pub mod resources;
pub mod subjects;

use std::sync::Arc;

use axum::{Router, routing::get};
use chrono::NaiveDate;
use tally_core::{Coordinator, store::Store};

pub use error::ApiError;

/// The calendar day against which overdue standing is derived.
pub(crate) fn today() -> NaiveDate { chrono::Local::now().date_naive() }

/// Build a fully-materialised API router over `coordinator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(coordinator: Arc<Coordinator<S>>) -> Router<()>
where
  S: Store + 'static,
{
  Router::new()
    // Resources
    .route(
      "/resources",
      get(resources::list::<S>).post(resources::create::<S>),
    )
    .route(
      "/resources/{id}",
      get(resources::get_one::<S>)
        .put(resources::update::<S>)
        .delete(resources::delete::<S>),
    )
    .route(
      "/resources/{id}/assignments",
      get(resources::open_assignments::<S>),
    )
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route("/subjects/{id}", get(subjects::get_one::<S>))
    .route(
      "/subjects/{id}/assignments",
      get(subjects::open_assignments::<S>),
    )
    // Assignments
    .route(
      "/assignments",
      get(assignments::list::<S>).post(assignments::create::<S>),
    )
    .route(
      "/assignments/{id}",
      get(assignments::get_one::<S>).patch(assignments::close::<S>),
    )
    .with_state(coordinator)
}
