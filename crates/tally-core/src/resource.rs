//! Resources: unit-bearing entities such as a book title's copies or a
//! bus's seats.
//!
//! A resource's `available_units` is never written by callers. It moves only
//! as a side effect of assignments being opened or closed, and of capacity
//! changes, all of which run through the [`Coordinator`](crate::Coordinator).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, assignment::NewAssignment};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The kind of entity a resource represents. Doubles as the `kind`
/// discriminant stored alongside the details payload.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
  Book,
  Bus,
}

// ─── Details ─────────────────────────────────────────────────────────────────

/// Catalogue data for a book title. Copies are counted by the resource's
/// units, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
  pub title:          String,
  pub author:         String,
  /// Unique among books when present.
  pub isbn:           Option<String>,
  pub category:       Option<String>,
  pub publisher:      Option<String>,
  pub published_year: Option<i32>,
  pub description:    Option<String>,
}

/// Operational state of a bus.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BusStatus {
  #[default]
  Active,
  Inactive,
  Maintenance,
}

/// A school bus. Seats are counted by the resource's units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusDetails {
  /// Unique among buses.
  pub bus_number:   String,
  pub driver_name:  String,
  pub driver_phone: Option<String>,
  pub route:        String,
  #[serde(default)]
  pub status:       BusStatus,
}

/// Kind-specific payload of a resource. The variant name is the `kind`
/// discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceDetails {
  Book(BookDetails),
  Bus(BusDetails),
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(format!("{field} is required")));
  }
  Ok(())
}

fn blank_to_none(value: &mut Option<String>) {
  if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
    *value = None;
  }
}

impl ResourceDetails {
  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::Book(_) => ResourceKind::Book,
      Self::Bus(_) => ResourceKind::Bus,
    }
  }

  /// Collapse blank optional fields to `None` so that an empty ISBN does not
  /// collide with another empty ISBN.
  pub fn normalize(&mut self) {
    match self {
      Self::Book(b) => {
        blank_to_none(&mut b.isbn);
        blank_to_none(&mut b.category);
        blank_to_none(&mut b.publisher);
        blank_to_none(&mut b.description);
      }
      Self::Bus(b) => blank_to_none(&mut b.driver_phone),
    }
  }

  /// Check the required fields of the payload.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Book(b) => {
        require("title", &b.title)?;
        require("author", &b.author)
      }
      Self::Bus(b) => {
        require("busNumber", &b.bus_number)?;
        require("driverName", &b.driver_name)?;
        require("route", &b.route)
      }
    }
  }

  /// The value that must be unique among resources of the same kind: the
  /// ISBN for books, the bus number for buses.
  pub fn natural_key(&self) -> Option<&str> {
    match self {
      Self::Book(b) => b.isbn.as_deref(),
      Self::Bus(b) => Some(b.bus_number.as_str()),
    }
  }

  pub fn conflict_message(&self) -> &'static str {
    match self {
      Self::Book(_) => "a book with this ISBN already exists",
      Self::Bus(_) => "a bus with this bus number already exists",
    }
  }

  /// Kind-specific rules for opening an assignment against this resource.
  ///
  /// Book loans must carry a due date. Buses take no due date and accept new
  /// riders only while active.
  pub fn check_assignable(&self, input: &NewAssignment) -> Result<()> {
    match self {
      Self::Book(_) if input.due_date.is_none() => {
        Err(Error::validation("dueDate is required for book loans"))
      }
      Self::Book(_) => Ok(()),
      Self::Bus(_) if input.due_date.is_some() => {
        Err(Error::validation("dueDate applies to book loans only"))
      }
      Self::Bus(b) if b.status != BusStatus::Active => Err(Error::validation(
        format!("bus {} is not active", b.bus_number),
      )),
      Self::Bus(_) => Ok(()),
    }
  }

  /// Serialise the payload without the `kind` tag for the `details_json`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let mut full = serde_json::to_value(self)?;
    if let Some(obj) = full.as_object_mut() {
      obj.remove("kind");
    }
    Ok(full)
  }

  /// Deserialise from the stored discriminant and JSON payload.
  pub fn from_parts(kind: ResourceKind, data: serde_json::Value) -> Result<Self> {
    let mut data = data;
    if let Some(obj) = data.as_object_mut() {
      obj.insert("kind".to_owned(), serde_json::Value::from(kind.as_ref()));
    }
    Ok(serde_json::from_value(data)?)
  }
}

// ─── Resource ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
  pub resource_id:     Uuid,
  pub details:         ResourceDetails,
  pub total_units:     u32,
  /// Always within `0..=total_units`.
  pub available_units: u32,
  pub created_at:      DateTime<Utc>,
}

impl Resource {
  pub fn kind(&self) -> ResourceKind { self.details.kind() }

  /// Units currently held by open assignments.
  pub fn units_out(&self) -> u32 {
    self.total_units.saturating_sub(self.available_units)
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`Coordinator::create_resource`](crate::Coordinator::create_resource).
/// Every unit starts out available.
#[derive(Debug, Clone)]
pub struct NewResource {
  pub details:     ResourceDetails,
  pub total_units: u32,
}

impl NewResource {
  pub fn new(details: ResourceDetails, total_units: u32) -> Self {
    Self { details, total_units }
  }
}

/// Administrative edit of an existing resource. Absent fields are left as
/// they are.
#[derive(Debug, Clone, Default)]
pub struct ResourceUpdate {
  pub details:     Option<ResourceDetails>,
  pub total_units: Option<u32>,
}
