//! Integration tests for `SqliteStore` behind a `Coordinator`, against an
//! in-memory database.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tally_core::{
  Coordinator, Error,
  assignment::{AssignmentFilter, AssignmentStatus, NewAssignment, OpenFor, overdue},
  resource::{
    BookDetails, BusDetails, BusStatus, NewResource, ResourceDetails, ResourceKind,
    ResourceUpdate,
  },
  store::{Ledger, Registry},
  subject::NewSubject,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn coordinator() -> Coordinator<SqliteStore> {
  Coordinator::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 9, d).unwrap() }

fn book(isbn: Option<&str>, copies: u32) -> NewResource {
  NewResource::new(
    ResourceDetails::Book(BookDetails {
      title:          "To Kill a Mockingbird".into(),
      author:         "Harper Lee".into(),
      isbn:           isbn.map(Into::into),
      category:       Some("Fiction".into()),
      publisher:      None,
      published_year: Some(1960),
      description:    None,
    }),
    copies,
  )
}

fn bus(number: &str, seats: u32) -> NewResource {
  NewResource::new(
    ResourceDetails::Bus(BusDetails {
      bus_number:   number.into(),
      driver_name:  "Maria Garcia".into(),
      driver_phone: Some("+1-555-0102".into()),
      route:        "South Route".into(),
      status:       BusStatus::Active,
    }),
    seats,
  )
}

fn loan(resource_id: Uuid, subject_id: Uuid) -> NewAssignment {
  NewAssignment {
    resource_id,
    subject_id,
    start_date: day(1),
    due_date: Some(day(15)),
  }
}

async fn student(c: &Coordinator<SqliteStore>, name: &str) -> Uuid {
  c.add_subject(NewSubject::new(name)).await.unwrap().subject_id
}

/// `available_units == total_units - open` and `available <= total`.
async fn assert_consistent(c: &Coordinator<SqliteStore>, resource_id: Uuid) {
  let resource = c.resource(resource_id).await.unwrap();
  let open = c.open_for(OpenFor::Resource(resource_id)).await.unwrap().len();
  assert!(resource.available_units <= resource.total_units);
  assert_eq!(
    resource.available_units as usize,
    resource.total_units as usize - open,
    "counter drifted from ledger"
  );
}

// ─── Resources ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_resource() {
  let c = coordinator().await;
  let created = c.create_resource(book(Some("978-0-06-112008-4"), 5)).await.unwrap();
  assert_eq!(created.available_units, 5);

  let fetched = c.resource(created.resource_id).await.unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_missing_resource_is_not_found() {
  let c = coordinator().await;
  let err = c.resource(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::ResourceNotFound(_)));
}

#[tokio::test]
async fn list_resources_filtered_by_kind() {
  let c = coordinator().await;
  c.create_resource(book(None, 1)).await.unwrap();
  c.create_resource(bus("BUS-001", 40)).await.unwrap();
  c.create_resource(bus("BUS-002", 35)).await.unwrap();

  assert_eq!(c.resources(None).await.unwrap().len(), 3);
  let buses = c.resources(Some(ResourceKind::Bus)).await.unwrap();
  assert_eq!(buses.len(), 2);
}

#[tokio::test]
async fn duplicate_isbn_conflicts() {
  let c = coordinator().await;
  c.create_resource(book(Some("978-0-452-28423-4"), 3)).await.unwrap();
  let err = c
    .create_resource(book(Some("978-0-452-28423-4"), 1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  // Books without an ISBN never collide.
  c.create_resource(book(None, 1)).await.unwrap();
  c.create_resource(book(Some(""), 1)).await.unwrap();
}

#[tokio::test]
async fn duplicate_bus_number_conflicts() {
  let c = coordinator().await;
  c.create_resource(bus("BUS-003", 45)).await.unwrap();
  let err = c.create_resource(bus("BUS-003", 10)).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn blank_required_field_is_rejected() {
  let c = coordinator().await;
  let err = c.create_resource(bus("  ", 10)).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn update_details_keeps_counters() {
  let c = coordinator().await;
  let r = c.create_resource(bus("BUS-010", 2)).await.unwrap();
  let s = student(&c, "Ada").await;
  c.assign(NewAssignment { due_date: None, ..loan(r.resource_id, s) })
    .await
    .unwrap();

  let mut details = r.details.clone();
  if let ResourceDetails::Bus(b) = &mut details {
    b.route = "East Route".into();
  }
  let updated = c
    .update_resource(r.resource_id, ResourceUpdate { details: Some(details), total_units: None })
    .await
    .unwrap();

  assert!(matches!(&updated.details, ResourceDetails::Bus(b) if b.route == "East Route"));
  assert_eq!(updated.available_units, 1);
}

#[tokio::test]
async fn update_cannot_change_kind() {
  let c = coordinator().await;
  let r = c.create_resource(bus("BUS-011", 2)).await.unwrap();
  let other = book(None, 1).details;
  let err = c
    .update_resource(r.resource_id, ResourceUpdate { details: Some(other), total_units: None })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn resize_recomputes_available_from_open_assignments() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 3)).await.unwrap();
  let a = student(&c, "Ada").await;
  let b = student(&c, "Grace").await;
  c.assign(loan(r.resource_id, a)).await.unwrap();
  c.assign(loan(r.resource_id, b)).await.unwrap();

  let grown = c
    .update_resource(r.resource_id, ResourceUpdate { details: None, total_units: Some(5) })
    .await
    .unwrap();
  assert_eq!((grown.total_units, grown.available_units), (5, 3));

  let err = c
    .update_resource(r.resource_id, ResourceUpdate { details: None, total_units: Some(1) })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let shrunk = c
    .update_resource(r.resource_id, ResourceUpdate { details: None, total_units: Some(2) })
    .await
    .unwrap();
  assert_eq!((shrunk.total_units, shrunk.available_units), (2, 0));
  assert_consistent(&c, r.resource_id).await;
}

#[tokio::test]
async fn rejected_resize_leaves_details_untouched() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();
  let s = student(&c, "Ada").await;
  c.assign(loan(r.resource_id, s)).await.unwrap();

  let mut details = r.details.clone();
  if let ResourceDetails::Book(b) = &mut details {
    b.title = "Go Set a Watchman".into();
  }
  let err = c
    .update_resource(r.resource_id, ResourceUpdate {
      details:     Some(details),
      total_units: Some(0),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let after = c.resource(r.resource_id).await.unwrap();
  assert_eq!(after.details, r.details);
  assert_eq!((after.total_units, after.available_units), (1, 0));
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_list_subjects() {
  let c = coordinator().await;
  let mut input = NewSubject::new("Zora");
  input.roll_number = Some("R-17".into());
  input.class_name = Some("Grade 5".into());
  let zora = c.add_subject(input).await.unwrap();
  c.add_subject(NewSubject::new("Ada")).await.unwrap();

  let fetched = c.subject(zora.subject_id).await.unwrap();
  assert_eq!(fetched.roll_number.as_deref(), Some("R-17"));

  let names: Vec<_> = c.subjects().await.unwrap().into_iter().map(|s| s.name).collect();
  assert_eq!(names, ["Ada", "Zora"]);
}

#[tokio::test]
async fn duplicate_roll_number_conflicts() {
  let c = coordinator().await;
  let mut input = NewSubject::new("Ada");
  input.roll_number = Some("R-1".into());
  c.add_subject(input.clone()).await.unwrap();
  input.name = "Grace".into();
  let err = c.add_subject(input).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
}

// ─── Assign / unassign ───────────────────────────────────────────────────────

#[tokio::test]
async fn last_unit_then_out_of_capacity() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();
  let s1 = student(&c, "Ada").await;
  let s2 = student(&c, "Grace").await;

  c.assign(loan(r.resource_id, s1)).await.unwrap();
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 0);

  let err = c.assign(loan(r.resource_id, s2)).await.unwrap_err();
  assert!(matches!(err, Error::OutOfCapacity(id) if id == r.resource_id));
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 0);
}

#[tokio::test]
async fn return_frees_the_unit_for_the_next_subject() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();
  let s1 = student(&c, "Ada").await;
  let s2 = student(&c, "Grace").await;

  let first = c.assign(loan(r.resource_id, s1)).await.unwrap();
  let closed = c.unassign(first.assignment_id, day(10)).await.unwrap();
  assert_eq!(closed.status, AssignmentStatus::Closed);
  assert_eq!(closed.end_date, Some(day(10)));
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 1);

  c.assign(loan(r.resource_id, s2)).await.unwrap();
  assert_consistent(&c, r.resource_id).await;
}

#[tokio::test]
async fn duplicate_open_pair_is_rolled_back() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 3)).await.unwrap();
  let s = student(&c, "Ada").await;

  c.assign(loan(r.resource_id, s)).await.unwrap();
  let before = c.resource(r.resource_id).await.unwrap().available_units;

  let err = c.assign(loan(r.resource_id, s)).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateOpenAssignment { .. }));

  let after = c.resource(r.resource_id).await.unwrap().available_units;
  assert_eq!(before, after);
  assert_eq!(after, 2);
  assert_consistent(&c, r.resource_id).await;
}

#[tokio::test]
async fn unknown_subject_is_rolled_back() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();

  let err = c.assign(loan(r.resource_id, Uuid::new_v4())).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 1);
}

#[tokio::test]
async fn same_pair_may_borrow_again_after_return() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();
  let s = student(&c, "Ada").await;

  let first = c.assign(loan(r.resource_id, s)).await.unwrap();
  c.unassign(first.assignment_id, day(5)).await.unwrap();
  let second = c.assign(loan(r.resource_id, s)).await.unwrap();

  assert_ne!(first.assignment_id, second.assignment_id);
  let history = c
    .assignments(&AssignmentFilter { resource_id: Some(r.resource_id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn closing_twice_is_already_closed() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 2)).await.unwrap();
  let s = student(&c, "Ada").await;

  let a = c.assign(loan(r.resource_id, s)).await.unwrap();
  c.unassign(a.assignment_id, day(3)).await.unwrap();
  let err = c.unassign(a.assignment_id, day(4)).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyClosed(_)));
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 2);
}

#[tokio::test]
async fn ledger_close_unknown_assignment() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let err = store.close(Uuid::new_v4(), day(1)).await.unwrap_err();
  assert!(matches!(err, Error::AssignmentNotFound(_)));
}

#[tokio::test]
async fn end_before_start_is_rejected() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 1)).await.unwrap();
  let s = student(&c, "Ada").await;

  let mut input = loan(r.resource_id, s);
  input.start_date = day(10);
  let a = c.assign(input).await.unwrap();

  let err = c.unassign(a.assignment_id, day(9)).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert!(c.assignment(a.assignment_id).await.unwrap().is_open());
}

#[tokio::test]
async fn inactive_bus_refuses_riders() {
  let c = coordinator().await;
  let mut input = bus("BUS-020", 10);
  if let ResourceDetails::Bus(b) = &mut input.details {
    b.status = BusStatus::Maintenance;
  }
  let r = c.create_resource(input).await.unwrap();
  let s = student(&c, "Ada").await;

  let rider = NewAssignment { due_date: None, ..loan(r.resource_id, s) };
  let err = c.assign(rider).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 10);
}

#[tokio::test]
async fn registry_release_never_exceeds_total() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let r = store.create_resource(book(None, 2)).await.unwrap();

  store.release(r.resource_id).await.unwrap();
  store.release(r.resource_id).await.unwrap();

  let after = store.get_resource(r.resource_id).await.unwrap().unwrap();
  assert_eq!(after.available_units, 2);
}

#[tokio::test]
async fn registry_reserve_unknown_resource() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let err = store.reserve(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::ResourceNotFound(_)));
}

// ─── Delete guard ────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_guarded_while_assignment_open() {
  let c = coordinator().await;
  let r = c.create_resource(bus("BUS-030", 40)).await.unwrap();
  let s = student(&c, "Ada").await;
  let a = c
    .assign(NewAssignment { due_date: None, ..loan(r.resource_id, s) })
    .await
    .unwrap();

  let err = c.delete(r.resource_id).await.unwrap_err();
  assert!(matches!(err, Error::HasOpenAssignments { open: 1, .. }));

  c.unassign(a.assignment_id, day(20)).await.unwrap();
  c.delete(r.resource_id).await.unwrap();

  assert!(matches!(c.resource(r.resource_id).await, Err(Error::ResourceNotFound(_))));
  let history = c
    .assignments(&AssignmentFilter { resource_id: Some(r.resource_id), ..Default::default() })
    .await
    .unwrap();
  assert!(history.is_empty());
}

#[tokio::test]
async fn delete_missing_resource_is_not_found() {
  let c = coordinator().await;
  let err = c.delete(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::ResourceNotFound(_)));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_for_subject_oldest_start_first() {
  let c = coordinator().await;
  let s = student(&c, "Ada").await;
  let mut ids = Vec::new();
  for (start, isbn) in [(day(9), "a"), (day(2), "b"), (day(5), "c")] {
    let r = c.create_resource(book(Some(isbn), 1)).await.unwrap();
    let a = c
      .assign(NewAssignment {
        resource_id: r.resource_id,
        subject_id:  s,
        start_date:  start,
        due_date:    Some(day(20)),
      })
      .await
      .unwrap();
    ids.push((start, a.assignment_id));
  }
  ids.sort();

  let open = c.open_for(OpenFor::Subject(s)).await.unwrap();
  let got: Vec<_> = open.iter().map(|a| a.assignment_id).collect();
  let want: Vec<_> = ids.into_iter().map(|(_, id)| id).collect();
  assert_eq!(got, want);
}

#[tokio::test]
async fn open_for_unknown_subject_is_not_found() {
  let c = coordinator().await;
  let err = c.open_for(OpenFor::Subject(Uuid::new_v4())).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

#[tokio::test]
async fn overdue_is_derived_and_drops_out_when_closed() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 2)).await.unwrap();
  let s = student(&c, "Ada").await;
  let today = day(16);

  let a = c
    .assign(NewAssignment {
      resource_id: r.resource_id,
      subject_id:  s,
      start_date:  day(1),
      due_date:    today.checked_sub_days(Days::new(1)),
    })
    .await
    .unwrap();

  let open = c.open_for(OpenFor::Resource(r.resource_id)).await.unwrap();
  assert_eq!(overdue(&open, today).count(), 1);

  c.unassign(a.assignment_id, today).await.unwrap();
  let open = c.open_for(OpenFor::Resource(r.resource_id)).await.unwrap();
  assert_eq!(overdue(&open, today).count(), 0);
  assert!(!c.assignment(a.assignment_id).await.unwrap().is_overdue(today));
}

#[tokio::test]
async fn list_assignments_by_status() {
  let c = coordinator().await;
  let r = c.create_resource(book(None, 3)).await.unwrap();
  let a = student(&c, "Ada").await;
  let b = student(&c, "Grace").await;

  let first = c.assign(loan(r.resource_id, a)).await.unwrap();
  c.assign(loan(r.resource_id, b)).await.unwrap();
  c.unassign(first.assignment_id, day(4)).await.unwrap();

  let closed = c
    .assignments(&AssignmentFilter { status: Some(AssignmentStatus::Closed), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(closed.len(), 1);
  assert_eq!(closed[0].assignment_id, first.assignment_id);

  let by_subject = c
    .assignments(&AssignmentFilter { subject_id: Some(b), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_subject.len(), 1);
  assert!(by_subject[0].is_open());

  let limited = c
    .assignments(&AssignmentFilter { limit: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(limited.len(), 1);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_on_last_unit_admit_one() {
  let c = Arc::new(coordinator().await);
  let r = c.create_resource(book(None, 1)).await.unwrap();

  let mut subjects = Vec::new();
  for i in 0..8 {
    subjects.push(student(&c, &format!("student {i}")).await);
  }

  let handles: Vec<_> = subjects
    .into_iter()
    .map(|s| {
      let c = Arc::clone(&c);
      let resource_id = r.resource_id;
      tokio::spawn(async move { c.assign(loan(resource_id, s)).await })
    })
    .collect();

  let mut admitted = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => admitted += 1,
      Err(Error::OutOfCapacity(_)) => {}
      Err(other) => panic!("unexpected error: {other}"),
    }
  }

  assert_eq!(admitted, 1);
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 0);
  assert_consistent(&c, r.resource_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_keeps_counters_consistent() {
  let c = Arc::new(coordinator().await);
  let r = c.create_resource(bus("BUS-050", 3)).await.unwrap();

  let mut handles = Vec::new();
  for i in 0..6 {
    let s = student(&c, &format!("rider {i}")).await;
    let c = Arc::clone(&c);
    let resource_id = r.resource_id;
    handles.push(tokio::spawn(async move {
      let rider = NewAssignment { due_date: None, ..loan(resource_id, s) };
      if let Ok(a) = c.assign(rider).await {
        c.unassign(a.assignment_id, day(2)).await.unwrap();
      }
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  let after = c.resource(r.resource_id).await.unwrap();
  assert_eq!(after.available_units, 3);
  assert_consistent(&c, r.resource_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_returns_close_once() {
  let c = Arc::new(coordinator().await);
  let r = c.create_resource(book(None, 2)).await.unwrap();
  let s = student(&c, "Ada").await;
  let a = c.assign(loan(r.resource_id, s)).await.unwrap();

  let handles: Vec<_> = (0..6)
    .map(|_| {
      let c = Arc::clone(&c);
      let id = a.assignment_id;
      tokio::spawn(async move { c.unassign(id, day(3)).await })
    })
    .collect();

  let mut closed = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => closed += 1,
      Err(Error::AlreadyClosed(_)) => {}
      Err(other) => panic!("unexpected error: {other}"),
    }
  }

  assert_eq!(closed, 1);
  assert_eq!(c.resource(r.resource_id).await.unwrap().available_units, 2);
  assert_consistent(&c, r.resource_id).await;
}
