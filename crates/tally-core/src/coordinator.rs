//! [`Coordinator`], the only mutation path for unit counters and assignment
//! status.
//!
//! Every operation that touches a resource's counter runs under that
//! resource's mutex, so two concurrent `assign` calls against the last
//! available unit cannot both succeed. Distinct resources never contend.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::{Assignment, AssignmentFilter, NewAssignment, OpenFor},
  resource::{NewResource, Resource, ResourceKind, ResourceUpdate},
  store::Store,
  subject::{NewSubject, Subject},
};

/// Couples ledger writes with registry counter changes.
///
/// The coordinator owns its backend; callers that hold only a `Coordinator`
/// cannot mutate counters or statuses any other way.
pub struct Coordinator<S> {
  store: S,
  locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl<S: Store> Coordinator<S> {
  pub fn new(store: S) -> Self {
    Self { store, locks: Mutex::new(HashMap::new()) }
  }

  /// Acquire the isolation scope of one resource.
  async fn lock(&self, resource_id: Uuid) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.entry(resource_id).or_default().clone()
    };
    debug!(%resource_id, "waiting for resource lock");
    lock.lock_owned().await
  }

  /// Lock a resource and load it. When the resource does not exist the
  /// guard is released and its map entry dropped again.
  async fn lock_existing(&self, id: Uuid) -> Result<(OwnedMutexGuard<()>, Resource)> {
    let guard = self.lock(id).await;
    match self.resource(id).await {
      Ok(resource) => Ok((guard, resource)),
      Err(err) => {
        drop(guard);
        self.forget_idle_lock(id);
        Err(err)
      }
    }
  }

  fn forget_lock(&self, resource_id: Uuid) {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&resource_id);
  }

  /// Remove the entry only if the map holds the last reference; a waiter
  /// that already cloned it keeps it alive.
  fn forget_idle_lock(&self, resource_id: Uuid) {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    if locks
      .get(&resource_id)
      .is_some_and(|lock| Arc::strong_count(lock) == 1)
    {
      locks.remove(&resource_id);
    }
  }

  // ── Resources ─────────────────────────────────────────────────────────────

  pub async fn create_resource(&self, mut input: NewResource) -> Result<Resource> {
    input.details.normalize();
    input.details.validate()?;

    let resource = self.store.create_resource(input).await?;
    info!(
      resource_id = %resource.resource_id,
      kind = %resource.kind(),
      total_units = resource.total_units,
      "resource created"
    );
    Ok(resource)
  }

  pub async fn resource(&self, id: Uuid) -> Result<Resource> {
    self
      .store
      .get_resource(id)
      .await?
      .ok_or(Error::ResourceNotFound(id))
  }

  pub async fn resources(&self, kind: Option<ResourceKind>) -> Result<Vec<Resource>> {
    self.store.list_resources(kind).await
  }

  /// Apply an administrative edit. A capacity change recomputes
  /// `available_units` from the number of open assignments and may not drop
  /// `total_units` below that number.
  ///
  /// Every check runs before the first write, so a rejected edit leaves the
  /// resource untouched.
  pub async fn update_resource(
    &self,
    id: Uuid,
    update: ResourceUpdate,
  ) -> Result<Resource> {
    let (_guard, mut resource) = self.lock_existing(id).await?;

    let details = match update.details {
      Some(mut details) => {
        if details.kind() != resource.kind() {
          return Err(Error::validation(format!(
            "resource {id} is a {}, not a {}",
            resource.kind(),
            details.kind()
          )));
        }
        details.normalize();
        details.validate()?;
        Some(details)
      }
      None => None,
    };

    let resize = match update.total_units {
      Some(total_units) if total_units != resource.total_units => {
        let open = self.store.count_open_for(id).await?;
        if total_units < open {
          return Err(Error::validation(format!(
            "totalUnits {total_units} is below the {open} unit(s) currently assigned"
          )));
        }
        Some((total_units, open))
      }
      _ => None,
    };

    if let Some(details) = details {
      resource = self.store.update_details(id, details).await?;
    }
    // Counters only move under this resource's lock, so `open` is still exact.
    if let Some((total_units, open)) = resize {
      resource = self.store.resize(id, total_units, open).await?;
      info!(resource_id = %id, total_units, open, "resource resized");
    }

    Ok(resource)
  }

  /// Delete a resource that no open assignment references.
  pub async fn delete(&self, id: Uuid) -> Result<()> {
    let (guard, _) = self.lock_existing(id).await?;

    let open = self.store.count_open_for(id).await?;
    if open > 0 {
      return Err(Error::HasOpenAssignments { resource_id: id, open });
    }
    self.store.remove_resource(id).await?;
    drop(guard);

    self.forget_lock(id);
    info!(resource_id = %id, "resource deleted");
    Ok(())
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  /// Reserve a unit and record an open assignment for it.
  ///
  /// If the ledger refuses the assignment, the reservation is released
  /// before the ledger's error is returned.
  pub async fn assign(&self, input: NewAssignment) -> Result<Assignment> {
    input.validate()?;
    let resource_id = input.resource_id;
    let subject_id = input.subject_id;

    let (_guard, resource) = self.lock_existing(resource_id).await?;
    resource.details.check_assignable(&input)?;

    self.store.reserve(resource_id).await?;

    match self.store.open(input).await {
      Ok(assignment) => {
        info!(
          assignment_id = %assignment.assignment_id,
          %resource_id,
          %subject_id,
          "assignment opened"
        );
        Ok(assignment)
      }
      Err(err) => {
        warn!(%resource_id, %subject_id, error = %err, "rolling back reservation");
        if let Err(release_err) = self.store.release(resource_id).await {
          error!(%resource_id, error = %release_err, "rollback failed");
          return Err(release_err);
        }
        Err(err)
      }
    }
  }

  /// Close an open assignment and return its unit to the resource.
  pub async fn unassign(&self, id: Uuid, end_date: NaiveDate) -> Result<Assignment> {
    let resource_id = self.assignment(id).await?.resource_id;
    let guard = self.lock(resource_id).await;

    // Status may have changed while waiting for the lock.
    let existing = match self.assignment(id).await {
      Ok(existing) => existing,
      Err(err) => {
        drop(guard);
        self.forget_idle_lock(resource_id);
        return Err(err);
      }
    };
    if !existing.is_open() {
      return Err(Error::AlreadyClosed(id));
    }
    if end_date < existing.start_date {
      return Err(Error::validation("endDate must not precede startDate"));
    }

    let closed = self.store.close(id, end_date).await?;
    self.store.release(closed.resource_id).await?;

    info!(
      assignment_id = %id,
      resource_id = %closed.resource_id,
      %end_date,
      "assignment closed"
    );
    Ok(closed)
  }

  pub async fn assignment(&self, id: Uuid) -> Result<Assignment> {
    self
      .store
      .get_assignment(id)
      .await?
      .ok_or(Error::AssignmentNotFound(id))
  }

  pub async fn assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>> {
    self.store.list_assignments(filter).await
  }

  /// Open assignments of a resource or subject, oldest start first. Fails
  /// with a not-found error if the target does not exist.
  pub async fn open_for(&self, target: OpenFor) -> Result<Vec<Assignment>> {
    match target {
      OpenFor::Resource(id) => {
        self.resource(id).await?;
      }
      OpenFor::Subject(id) => {
        self.subject(id).await?;
      }
    }
    self.store.list_open_for(target).await
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  pub async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    input.validate()?;
    let subject = self.store.add_subject(input).await?;
    info!(subject_id = %subject.subject_id, "subject added");
    Ok(subject)
  }

  pub async fn subject(&self, id: Uuid) -> Result<Subject> {
    self
      .store
      .get_subject(id)
      .await?
      .ok_or(Error::SubjectNotFound(id))
  }

  pub async fn subjects(&self) -> Result<Vec<Subject>> {
    self.store.list_subjects().await
  }
}
