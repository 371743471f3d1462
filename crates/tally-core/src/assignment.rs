//! Assignments: one subject holding one unit of one resource over time.
//!
//! An assignment is created `Open` and transitions to `Closed` exactly once.
//! It is never reopened; a later loan of the same pair is a new record.
//! Whether an assignment is overdue is computed at read time from its due
//! date and is never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, resource::Resource, subject::Subject};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The stored lifecycle state. `Closed` is terminal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentStatus {
  Open,
  Closed,
}

/// Display standing derived from status, due date and the current date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
  Open,
  Overdue,
  Returned,
  /// Closed after its due date had passed.
  ReturnedLate,
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
  pub assignment_id: Uuid,
  pub resource_id:   Uuid,
  pub subject_id:    Uuid,
  pub start_date:    NaiveDate,
  /// Lending only.
  pub due_date:      Option<NaiveDate>,
  /// `None` while open.
  pub end_date:      Option<NaiveDate>,
  pub status:        AssignmentStatus,
  /// Server-assigned.
  pub created_at:    DateTime<Utc>,
}

impl Assignment {
  pub fn is_open(&self) -> bool { self.status == AssignmentStatus::Open }

  /// An open assignment is overdue iff its due date lies strictly before
  /// `today`.
  pub fn is_overdue(&self, today: NaiveDate) -> bool {
    self.is_open() && self.due_date.is_some_and(|due| due < today)
  }

  pub fn standing(&self, today: NaiveDate) -> Standing {
    match (self.status, self.due_date, self.end_date) {
      (AssignmentStatus::Open, _, _) if self.is_overdue(today) => {
        Standing::Overdue
      }
      (AssignmentStatus::Open, _, _) => Standing::Open,
      (AssignmentStatus::Closed, Some(due), Some(end)) if end > due => {
        Standing::ReturnedLate
      }
      (AssignmentStatus::Closed, _, _) => Standing::Returned,
    }
  }
}

/// Lazily select the overdue assignments out of any sequence of them.
pub fn overdue<'a, I>(
  assignments: I,
  today: NaiveDate,
) -> impl Iterator<Item = &'a Assignment>
where
  I: IntoIterator<Item = &'a Assignment>,
{
  assignments.into_iter().filter(move |a| a.is_overdue(today))
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`Coordinator::assign`](crate::Coordinator::assign).
#[derive(Debug, Clone)]
pub struct NewAssignment {
  pub resource_id: Uuid,
  pub subject_id:  Uuid,
  pub start_date:  NaiveDate,
  pub due_date:    Option<NaiveDate>,
}

impl NewAssignment {
  pub fn validate(&self) -> Result<()> {
    if self.due_date.is_some_and(|due| due < self.start_date) {
      return Err(Error::validation("dueDate must not precede startDate"));
    }
    Ok(())
  }
}

/// Selects whose open assignments to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFor {
  Resource(Uuid),
  Subject(Uuid),
}

/// Parameters for [`crate::store::Ledger::list_assignments`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
  pub resource_id: Option<Uuid>,
  pub subject_id:  Option<Uuid>,
  pub status:      Option<AssignmentStatus>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// An assignment bundled with its derived standing as of a given day.
/// Computed on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
  #[serde(flatten)]
  pub assignment: Assignment,
  pub overdue:    bool,
  pub standing:   Standing,
}

impl AssignmentView {
  pub fn at(assignment: Assignment, today: NaiveDate) -> Self {
    Self {
      overdue: assignment.is_overdue(today),
      standing: assignment.standing(today),
      assignment,
    }
  }
}

/// An assignment view joined with the resource and subject it links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDetail {
  #[serde(flatten)]
  pub view:     AssignmentView,
  pub resource: Resource,
  pub subject:  Subject,
}
