//! The party that holds units of a resource (a student).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
  pub subject_id:  Uuid,
  pub name:        String,
  /// Unique when present.
  pub roll_number: Option<String>,
  pub class_name:  Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::Roster::add_subject`].
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub name:        String,
  pub roll_number: Option<String>,
  pub class_name:  Option<String>,
}

impl NewSubject {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), roll_number: None, class_name: None }
  }

  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::validation("name is required"));
    }
    if self.roll_number.as_deref().is_some_and(|r| r.trim().is_empty()) {
      return Err(Error::validation("rollNumber must not be blank"));
    }
    Ok(())
  }
}
