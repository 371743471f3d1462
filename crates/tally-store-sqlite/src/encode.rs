//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision so they sort lexically. Calendar dates are `YYYY-MM-DD`. UUIDs
//! are hyphenated lowercase strings. Unit counters are INTEGERs.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tally_core::{
  assignment::{Assignment, AssignmentStatus},
  resource::{Resource, ResourceDetails, ResourceKind},
  subject::Subject,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Units ───────────────────────────────────────────────────────────────────

pub fn decode_units(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("unit count out of range: {n}")))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<ResourceKind> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown resource kind: {s:?}")))
}

pub fn decode_status(s: &str) -> Result<AssignmentStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown assignment status: {s:?}")))
}

/// Whether a statement failed on a UNIQUE (or other) constraint.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `resources` row.
pub struct RawResource {
  pub resource_id:     String,
  pub kind:            String,
  pub details_json:    String,
  pub total_units:     i64,
  pub available_units: i64,
  pub created_at:      String,
}

impl RawResource {
  pub const COLUMNS: &'static str =
    "resource_id, kind, details_json, total_units, available_units, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resource_id:     row.get(0)?,
      kind:            row.get(1)?,
      details_json:    row.get(2)?,
      total_units:     row.get(3)?,
      available_units: row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_resource(self) -> Result<Resource> {
    let kind = decode_kind(&self.kind)?;
    let data: serde_json::Value = serde_json::from_str(&self.details_json)?;

    Ok(Resource {
      resource_id:     decode_uuid(&self.resource_id)?,
      details:         ResourceDetails::from_parts(kind, data)?,
      total_units:     decode_units(self.total_units)?,
      available_units: decode_units(self.available_units)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:  String,
  pub name:        String,
  pub roll_number: Option<String>,
  pub class_name:  Option<String>,
  pub created_at:  String,
}

impl RawSubject {
  pub const COLUMNS: &'static str =
    "subject_id, name, roll_number, class_name, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:  row.get(0)?,
      name:        row.get(1)?,
      roll_number: row.get(2)?,
      class_name:  row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:  decode_uuid(&self.subject_id)?,
      name:        self.name,
      roll_number: self.roll_number,
      class_name:  self.class_name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `assignments` row.
pub struct RawAssignment {
  pub assignment_id: String,
  pub resource_id:   String,
  pub subject_id:    String,
  pub start_date:    String,
  pub due_date:      Option<String>,
  pub end_date:      Option<String>,
  pub status:        String,
  pub created_at:    String,
}

impl RawAssignment {
  pub const COLUMNS: &'static str = "assignment_id, resource_id, subject_id, \
     start_date, due_date, end_date, status, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      resource_id:   row.get(1)?,
      subject_id:    row.get(2)?,
      start_date:    row.get(3)?,
      due_date:      row.get(4)?,
      end_date:      row.get(5)?,
      status:        row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      assignment_id: decode_uuid(&self.assignment_id)?,
      resource_id:   decode_uuid(&self.resource_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      start_date:    decode_date(&self.start_date)?,
      due_date:      self.due_date.as_deref().map(decode_date).transpose()?,
      end_date:      self.end_date.as_deref().map(decode_date).transpose()?,
      status:        decode_status(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
