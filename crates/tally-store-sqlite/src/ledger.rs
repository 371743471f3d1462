//! [`Ledger`] implementation: the assignment history.

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tally_core::{
  Error as CoreError,
  assignment::{Assignment, AssignmentFilter, AssignmentStatus, NewAssignment, OpenFor},
  store::Ledger,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{
    RawAssignment, decode_units, encode_date, encode_dt, encode_uuid,
    is_constraint_violation,
  },
};

enum OpenOutcome {
  Opened,
  UnknownSubject,
  Duplicate,
}

enum CloseOutcome {
  Closed,
  Missing,
  AlreadyClosed,
}

fn select_assignment(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Option<RawAssignment>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM assignments WHERE assignment_id = ?1",
        RawAssignment::COLUMNS
      ),
      rusqlite::params![id_str],
      RawAssignment::from_row,
    )
    .optional()
}

impl SqliteStore {
  async fn fetch_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(id);
    let raw = self.call(move |conn| select_assignment(conn, &id_str)).await?;
    raw.map(RawAssignment::into_assignment).transpose()
  }
}

impl Ledger for SqliteStore {
  async fn open(&self, input: NewAssignment) -> tally_core::Result<Assignment> {
    let assignment = Assignment {
      assignment_id: Uuid::new_v4(),
      resource_id:   input.resource_id,
      subject_id:    input.subject_id,
      start_date:    input.start_date,
      due_date:      input.due_date,
      end_date:      None,
      status:        AssignmentStatus::Open,
      created_at:    Utc::now(),
    };

    let id_str       = encode_uuid(assignment.assignment_id);
    let resource_str = encode_uuid(assignment.resource_id);
    let subject_str  = encode_uuid(assignment.subject_id);
    let start_str    = encode_date(assignment.start_date);
    let due_str      = assignment.due_date.map(encode_date);
    let at_str       = encode_dt(assignment.created_at);

    let outcome = self
      .call(move |conn| {
        let tx = conn.transaction()?;

        let subject_exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !subject_exists {
          return Ok(OpenOutcome::UnknownSubject);
        }

        let duplicate = tx
          .query_row(
            "SELECT 1 FROM assignments
             WHERE resource_id = ?1 AND subject_id = ?2 AND status = 'open'",
            rusqlite::params![resource_str, subject_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if duplicate {
          return Ok(OpenOutcome::Duplicate);
        }

        match tx.execute(
          "INSERT INTO assignments (
             assignment_id, resource_id, subject_id,
             start_date, due_date, end_date, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, 'open', ?6)",
          rusqlite::params![id_str, resource_str, subject_str, start_str, due_str, at_str],
        ) {
          Ok(_) => {}
          // The partial unique index backs up the check above.
          Err(e) if is_constraint_violation(&e) => return Ok(OpenOutcome::Duplicate),
          Err(e) => return Err(e),
        }

        tx.commit()?;
        Ok(OpenOutcome::Opened)
      })
      .await?;

    match outcome {
      OpenOutcome::Opened => Ok(assignment),
      OpenOutcome::UnknownSubject => {
        Err(CoreError::SubjectNotFound(assignment.subject_id))
      }
      OpenOutcome::Duplicate => Err(CoreError::DuplicateOpenAssignment {
        resource_id: assignment.resource_id,
        subject_id:  assignment.subject_id,
      }),
    }
  }

  async fn close(
    &self,
    id: Uuid,
    end_date: NaiveDate,
  ) -> tally_core::Result<Assignment> {
    let id_str  = encode_uuid(id);
    let end_str = encode_date(end_date);

    let (outcome, raw) = self
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = tx.execute(
          "UPDATE assignments SET status = 'closed', end_date = ?2
           WHERE assignment_id = ?1 AND status = 'open'",
          rusqlite::params![id_str, end_str],
        )?;
        let raw = select_assignment(&tx, &id_str)?;
        tx.commit()?;

        let outcome = match (changed, &raw) {
          (1, _) => CloseOutcome::Closed,
          (_, Some(_)) => CloseOutcome::AlreadyClosed,
          (_, None) => CloseOutcome::Missing,
        };
        Ok((outcome, raw))
      })
      .await?;

    match (outcome, raw) {
      (CloseOutcome::Closed, Some(raw)) => Ok(raw.into_assignment()?),
      (CloseOutcome::AlreadyClosed, _) => Err(CoreError::AlreadyClosed(id)),
      _ => Err(CoreError::AssignmentNotFound(id)),
    }
  }

  async fn get_assignment(&self, id: Uuid) -> tally_core::Result<Option<Assignment>> {
    Ok(self.fetch_assignment(id).await?)
  }

  async fn list_open_for(&self, target: OpenFor) -> tally_core::Result<Vec<Assignment>> {
    let (column, id) = match target {
      OpenFor::Resource(id) => ("resource_id", id),
      OpenFor::Subject(id) => ("subject_id", id),
    };
    let id_str = encode_uuid(id);

    let raws: Vec<RawAssignment> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM assignments
           WHERE {column} = ?1 AND status = 'open'
           ORDER BY start_date, created_at, assignment_id",
          RawAssignment::COLUMNS
        ))?;
        stmt
          .query_map(rusqlite::params![id_str], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawAssignment::into_assignment)
        .collect::<Result<_>>()?,
    )
  }

  async fn count_open_for(&self, resource_id: Uuid) -> tally_core::Result<u32> {
    let id_str = encode_uuid(resource_id);

    let count: i64 = self
      .call(move |conn| {
        conn.query_row(
          "SELECT COUNT(*) FROM assignments WHERE resource_id = ?1 AND status = 'open'",
          rusqlite::params![id_str],
          |r| r.get(0),
        )
      })
      .await?;

    Ok(decode_units(count)?)
  }

  async fn list_assignments(
    &self,
    filter: &AssignmentFilter,
  ) -> tally_core::Result<Vec<Assignment>> {
    let resource_str = filter.resource_id.map(encode_uuid);
    let subject_str  = filter.subject_id.map(encode_uuid);
    let status_str   = filter.status.map(|s| s.as_ref().to_owned());
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val    = filter.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset_val   = filter.offset.map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));

    let raws: Vec<RawAssignment> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM assignments
           WHERE (?1 IS NULL OR resource_id = ?1)
             AND (?2 IS NULL OR subject_id  = ?2)
             AND (?3 IS NULL OR status      = ?3)
           ORDER BY created_at DESC, assignment_id
           LIMIT ?4 OFFSET ?5",
          RawAssignment::COLUMNS
        ))?;
        stmt
          .query_map(
            rusqlite::params![resource_str, subject_str, status_str, limit_val, offset_val],
            RawAssignment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawAssignment::into_assignment)
        .collect::<Result<_>>()?,
    )
  }
}
