//! Error types for `tally-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("resource not found: {0}")]
  ResourceNotFound(Uuid),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("no units of resource {0} are available")]
  OutOfCapacity(Uuid),

  #[error(
    "subject {subject_id} already holds an open assignment on resource {resource_id}"
  )]
  DuplicateOpenAssignment { resource_id: Uuid, subject_id: Uuid },

  #[error("assignment {0} is already closed")]
  AlreadyClosed(Uuid),

  #[error("cannot delete resource {resource_id}: {open} open assignment(s)")]
  HasOpenAssignments { resource_id: Uuid, open: u32 },

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Infrastructure failure in a storage backend. Never retried.
  #[error("storage failure: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::ResourceNotFound(_)
        | Self::SubjectNotFound(_)
        | Self::AssignmentNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
