//! Storage traits for the ledger's three concerns.
//!
//! - [`Registry`]: resources and their unit counters.
//! - [`Ledger`]: the history of assignments.
//! - [`Roster`]: the subjects that hold units.
//!
//! Backends (e.g. `tally-store-sqlite`) implement all three. The counter and
//! status mutations (`reserve`, `release`, `resize`, `remove_resource`,
//! `open`, `close`) are meant to be driven only by the
//! [`Coordinator`](crate::Coordinator), which owns the backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  Result,
  assignment::{Assignment, AssignmentFilter, NewAssignment, OpenFor},
  resource::{NewResource, Resource, ResourceDetails, ResourceKind},
  subject::{NewSubject, Subject},
};

// ─── Registry ────────────────────────────────────────────────────────────────

/// Single source of truth for capacity.
pub trait Registry: Send + Sync {
  /// Persist a new resource with every unit available.
  ///
  /// Fails with `Conflict` if the natural key (ISBN, bus number) is taken.
  fn create_resource(
    &self,
    input: NewResource,
  ) -> impl Future<Output = Result<Resource>> + Send + '_;

  /// Retrieve a resource by UUID. Returns `None` if not found.
  fn get_resource(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource>>> + Send + '_;

  /// List resources newest first, optionally filtered by kind.
  fn list_resources(
    &self,
    kind: Option<ResourceKind>,
  ) -> impl Future<Output = Result<Vec<Resource>>> + Send + '_;

  /// Replace the kind-specific details; unit counters are untouched.
  fn update_details(
    &self,
    id: Uuid,
    details: ResourceDetails,
  ) -> impl Future<Output = Result<Resource>> + Send + '_;

  /// Take one unit. Fails with `OutOfCapacity` when none is available and
  /// `ResourceNotFound` when the resource does not exist.
  fn reserve(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_;

  /// Return one unit, never raising `available_units` above `total_units`.
  fn release(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_;

  /// Set `total_units` and recompute `available_units` as
  /// `total_units - open`. The caller guarantees `open <= total_units`.
  fn resize(
    &self,
    id: Uuid,
    total_units: u32,
    open: u32,
  ) -> impl Future<Output = Result<Resource>> + Send + '_;

  /// Delete a resource. Fails with `HasOpenAssignments` if any open
  /// assignment still references it.
  fn remove_resource(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Append-only history of who holds what.
pub trait Ledger: Send + Sync {
  /// Record a new open assignment. Performs no capacity check.
  ///
  /// Fails with `DuplicateOpenAssignment` if the pair already has an open
  /// assignment and with `SubjectNotFound` if the subject is unknown.
  fn open(
    &self,
    input: NewAssignment,
  ) -> impl Future<Output = Result<Assignment>> + Send + '_;

  /// Close an open assignment on `end_date`.
  ///
  /// Fails with `AssignmentNotFound` or `AlreadyClosed`.
  fn close(
    &self,
    id: Uuid,
    end_date: NaiveDate,
  ) -> impl Future<Output = Result<Assignment>> + Send + '_;

  /// Retrieve an assignment by UUID. Returns `None` if not found.
  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>>> + Send + '_;

  /// Open assignments for a resource or a subject, oldest `start_date`
  /// first.
  fn list_open_for(
    &self,
    target: OpenFor,
  ) -> impl Future<Output = Result<Vec<Assignment>>> + Send + '_;

  /// Number of open assignments referencing a resource.
  fn count_open_for(
    &self,
    resource_id: Uuid,
  ) -> impl Future<Output = Result<u32>> + Send + '_;

  /// All assignments matching `filter`, newest first.
  fn list_assignments<'a>(
    &'a self,
    filter: &'a AssignmentFilter,
  ) -> impl Future<Output = Result<Vec<Assignment>>> + Send + 'a;
}

// ─── Roster ──────────────────────────────────────────────────────────────────

pub trait Roster: Send + Sync {
  /// Persist a new subject. Fails with `Conflict` on a duplicate roll
  /// number.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject>> + Send + '_;

  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>>> + Send + '_;

  /// All subjects ordered by name.
  fn list_subjects(&self) -> impl Future<Output = Result<Vec<Subject>>> + Send + '_;
}

/// A backend providing all three stores.
pub trait Store: Registry + Ledger + Roster {}

impl<T: Registry + Ledger + Roster> Store for T {}
