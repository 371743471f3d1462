//! [`Registry`] implementation: resources and their unit counters.
//!
//! Counter changes are single conditional `UPDATE`s, so the database refuses
//! a decrement below zero even if two writers were ever to race past the
//! coordinator.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tally_core::{
  Error as CoreError,
  resource::{NewResource, Resource, ResourceDetails, ResourceKind},
  store::Registry,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{RawResource, encode_dt, encode_uuid, is_constraint_violation},
};

/// What a conditional write did.
enum Outcome {
  Applied,
  /// The target row does not exist.
  Missing,
  /// The row exists but the write's condition did not hold.
  Refused,
}

fn resource_exists(conn: &rusqlite::Connection, id_str: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM resources WHERE resource_id = ?1",
        rusqlite::params![id_str],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn refused_or_missing(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Outcome> {
  if resource_exists(conn, id_str)? {
    Ok(Outcome::Refused)
  } else {
    Ok(Outcome::Missing)
  }
}

impl SqliteStore {
  async fn fetch_resource(&self, id: Uuid) -> Result<Option<Resource>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawResource> = self
      .call(move |conn| {
        conn
          .query_row(
            &format!("SELECT {} FROM resources WHERE resource_id = ?1", RawResource::COLUMNS),
            rusqlite::params![id_str],
            RawResource::from_row,
          )
          .optional()
      })
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }

  /// Re-read a resource that a successful write just touched.
  async fn refetch_resource(&self, id: Uuid) -> tally_core::Result<Resource> {
    self
      .fetch_resource(id)
      .await?
      .ok_or(CoreError::ResourceNotFound(id))
  }
}

impl Registry for SqliteStore {
  async fn create_resource(&self, input: NewResource) -> tally_core::Result<Resource> {
    let resource = Resource {
      resource_id:     Uuid::new_v4(),
      details:         input.details,
      total_units:     input.total_units,
      available_units: input.total_units,
      created_at:      Utc::now(),
    };

    let id_str       = encode_uuid(resource.resource_id);
    let kind_str     = resource.kind().as_ref().to_owned();
    let details_json = resource.details.to_json()?.to_string();
    let natural_key  = resource.details.natural_key().map(str::to_owned);
    let units        = i64::from(resource.total_units);
    let at_str       = encode_dt(resource.created_at);

    let inserted = self
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO resources (
             resource_id, kind, details_json, natural_key,
             total_units, available_units, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
          rusqlite::params![id_str, kind_str, details_json, natural_key, units, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_constraint_violation(&e) => Ok(false),
          Err(e) => Err(e),
        }
      })
      .await?;

    if !inserted {
      return Err(CoreError::Conflict(resource.details.conflict_message().to_owned()));
    }
    Ok(resource)
  }

  async fn get_resource(&self, id: Uuid) -> tally_core::Result<Option<Resource>> {
    Ok(self.fetch_resource(id).await?)
  }

  async fn list_resources(
    &self,
    kind: Option<ResourceKind>,
  ) -> tally_core::Result<Vec<Resource>> {
    let kind_str = kind.map(|k| k.as_ref().to_owned());

    let raws: Vec<RawResource> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM resources
           WHERE (?1 IS NULL OR kind = ?1)
           ORDER BY created_at DESC, resource_id",
          RawResource::COLUMNS
        ))?;
        stmt
          .query_map(rusqlite::params![kind_str], RawResource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawResource::into_resource)
        .collect::<Result<_>>()?,
    )
  }

  async fn update_details(
    &self,
    id: Uuid,
    details: ResourceDetails,
  ) -> tally_core::Result<Resource> {
    let id_str       = encode_uuid(id);
    let details_json = details.to_json()?.to_string();
    let natural_key  = details.natural_key().map(str::to_owned);

    let outcome = self
      .call(move |conn| {
        match conn.execute(
          "UPDATE resources SET details_json = ?2, natural_key = ?3
           WHERE resource_id = ?1",
          rusqlite::params![id_str, details_json, natural_key],
        ) {
          Ok(0) => Ok(Outcome::Missing),
          Ok(_) => Ok(Outcome::Applied),
          Err(e) if is_constraint_violation(&e) => Ok(Outcome::Refused),
          Err(e) => Err(e),
        }
      })
      .await?;

    match outcome {
      Outcome::Applied => self.refetch_resource(id).await,
      Outcome::Missing => Err(CoreError::ResourceNotFound(id)),
      Outcome::Refused => {
        Err(CoreError::Conflict(details.conflict_message().to_owned()))
      }
    }
  }

  async fn reserve(&self, id: Uuid) -> tally_core::Result<()> {
    let id_str = encode_uuid(id);

    let outcome = self
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE resources SET available_units = available_units - 1
           WHERE resource_id = ?1 AND available_units > 0",
          rusqlite::params![id_str],
        )?;
        if changed == 1 {
          Ok(Outcome::Applied)
        } else {
          refused_or_missing(conn, &id_str)
        }
      })
      .await?;

    match outcome {
      Outcome::Applied => Ok(()),
      Outcome::Missing => Err(CoreError::ResourceNotFound(id)),
      Outcome::Refused => Err(CoreError::OutOfCapacity(id)),
    }
  }

  async fn release(&self, id: Uuid) -> tally_core::Result<()> {
    let id_str = encode_uuid(id);

    let changed = self
      .call(move |conn| {
        conn.execute(
          "UPDATE resources SET available_units = MIN(available_units + 1, total_units)
           WHERE resource_id = ?1",
          rusqlite::params![id_str],
        )
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::ResourceNotFound(id));
    }
    Ok(())
  }

  async fn resize(
    &self,
    id: Uuid,
    total_units: u32,
    open: u32,
  ) -> tally_core::Result<Resource> {
    let id_str    = encode_uuid(id);
    let total     = i64::from(total_units);
    let available = i64::from(total_units) - i64::from(open);

    let changed = self
      .call(move |conn| {
        conn.execute(
          "UPDATE resources SET total_units = ?2, available_units = ?3
           WHERE resource_id = ?1",
          rusqlite::params![id_str, total, available],
        )
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::ResourceNotFound(id));
    }
    self.refetch_resource(id).await
  }

  async fn remove_resource(&self, id: Uuid) -> tally_core::Result<()> {
    let id_str = encode_uuid(id);

    let (outcome, open) = self
      .call(move |conn| {
        let changed = conn.execute(
          "DELETE FROM resources
           WHERE resource_id = ?1
             AND NOT EXISTS (
               SELECT 1 FROM assignments
               WHERE resource_id = ?1 AND status = 'open'
             )",
          rusqlite::params![id_str],
        )?;
        if changed == 1 {
          return Ok((Outcome::Applied, 0));
        }
        let open: i64 = conn.query_row(
          "SELECT COUNT(*) FROM assignments WHERE resource_id = ?1 AND status = 'open'",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        Ok((refused_or_missing(conn, &id_str)?, open))
      })
      .await?;

    match outcome {
      Outcome::Applied => Ok(()),
      Outcome::Missing => Err(CoreError::ResourceNotFound(id)),
      Outcome::Refused => Err(CoreError::HasOpenAssignments {
        resource_id: id,
        open:        u32::try_from(open).unwrap_or(u32::MAX),
      }),
    }
  }
}
