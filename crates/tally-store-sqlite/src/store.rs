//! [`SqliteStore`]: connection handling and the [`Roster`] implementation.
//!
//! The [`Registry`](tally_core::store::Registry) and
//! [`Ledger`](tally_core::store::Ledger) implementations live in their own
//! modules.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tally_core::{
  store::Roster,
  subject::{NewSubject, Subject},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawSubject, encode_dt, encode_uuid, is_constraint_violation},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }

  /// Run `f` on the connection thread.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    Ok(self.conn.call(move |conn| Ok(f(conn)?)).await?)
  }
}

// ─── Roster impl ─────────────────────────────────────────────────────────────

impl Roster for SqliteStore {
  async fn add_subject(&self, input: NewSubject) -> tally_core::Result<Subject> {
    let subject = Subject {
      subject_id:  Uuid::new_v4(),
      name:        input.name,
      roll_number: input.roll_number,
      class_name:  input.class_name,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(subject.subject_id);
    let name        = subject.name.clone();
    let roll_number = subject.roll_number.clone();
    let class_name  = subject.class_name.clone();
    let at_str      = encode_dt(subject.created_at);

    let inserted = self
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO subjects (subject_id, name, roll_number, class_name, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, roll_number, class_name, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_constraint_violation(&e) => Ok(false),
          Err(e) => Err(e),
        }
      })
      .await?;

    if !inserted {
      return Err(tally_core::Error::Conflict(
        "a subject with this roll number already exists".to_owned(),
      ));
    }
    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> tally_core::Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .call(move |conn| {
        conn
          .query_row(
            &format!("SELECT {} FROM subjects WHERE subject_id = ?1", RawSubject::COLUMNS),
            rusqlite::params![id_str],
            RawSubject::from_row,
          )
          .optional()
      })
      .await?;

    Ok(raw.map(RawSubject::into_subject).transpose()?)
  }

  async fn list_subjects(&self) -> tally_core::Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM subjects ORDER BY name, subject_id",
          RawSubject::COLUMNS
        ))?;
        stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawSubject::into_subject)
        .collect::<Result<_>>()?,
    )
  }
}
