//! Handlers for `/assignments` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/assignments` | See [`ListParams`]; newest first |
//! | `POST`  | `/assignments` | Body: [`CreateBody`]; returns 201 |
//! | `GET`   | `/assignments/:id` | Joined with its resource and subject |
//! | `PATCH` | `/assignments/:id` | Optional body `{"endDate":"YYYY-MM-DD"}`; closes it |
//!
//! Every assignment is returned as an [`AssignmentView`] whose `overdue` and
//! `standing` fields are computed against the server's current date.

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::{
  Coordinator,
  assignment::{
    AssignmentDetail, AssignmentFilter, AssignmentStatus, AssignmentView, NewAssignment,
  },
  store::Store,
};
use uuid::Uuid;

use crate::{error::ApiError, today};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub resource_id: Option<Uuid>,
  pub subject_id:  Option<Uuid>,
  pub status:      Option<AssignmentStatus>,
  /// `true` keeps only overdue assignments, `false` drops them.
  pub overdue:     Option<bool>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// `GET /assignments[?resourceId=..][&subjectId=..][&status=open|closed][&overdue=true]`
pub async fn list<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<AssignmentView>>, ApiError> {
  let Query(params) = params?;
  let today = today();

  let mut filter = AssignmentFilter {
    resource_id: params.resource_id,
    subject_id:  params.subject_id,
    status:      params.status,
    limit:       params.limit,
    offset:      params.offset,
  };

  let Some(want_overdue) = params.overdue else {
    let all = coordinator.assignments(&filter).await?;
    return Ok(Json(
      all.into_iter().map(|a| AssignmentView::at(a, today)).collect(),
    ));
  };

  // Overdue is derived, so paging happens after the derivation.
  let limit = filter.limit.take().unwrap_or(usize::MAX);
  let offset = filter.offset.take().unwrap_or(0);
  let all = coordinator.assignments(&filter).await?;
  Ok(Json(
    all
      .into_iter()
      .map(|a| AssignmentView::at(a, today))
      .filter(|v| v.overdue == want_overdue)
      .skip(offset)
      .take(limit)
      .collect(),
  ))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /assignments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub resource_id: Uuid,
  pub subject_id:  Uuid,
  /// Defaults to today.
  pub start_date:  Option<NaiveDate>,
  /// Required for books, rejected for buses.
  pub due_date:    Option<NaiveDate>,
}

impl CreateBody {
  fn into_new(self, today: NaiveDate) -> NewAssignment {
    NewAssignment {
      resource_id: self.resource_id,
      subject_id:  self.subject_id,
      start_date:  self.start_date.unwrap_or(today),
      due_date:    self.due_date,
    }
  }
}

/// `POST /assignments`; returns 201 + the open assignment.
pub async fn create<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let today = today();
  let assignment = coordinator.assign(body.into_new(today)).await?;
  Ok((StatusCode::CREATED, Json(AssignmentView::at(assignment, today))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /assignments/:id`
pub async fn get_one<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AssignmentDetail>, ApiError> {
  let Path(id) = id?;
  let assignment = coordinator.assignment(id).await?;
  let resource = coordinator.resource(assignment.resource_id).await?;
  let subject = coordinator.subject(assignment.subject_id).await?;
  Ok(Json(AssignmentDetail {
    view: AssignmentView::at(assignment, today()),
    resource,
    subject,
  }))
}

// ─── Close ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseBody {
  /// Defaults to today.
  pub end_date: Option<NaiveDate>,
}

/// `PATCH /assignments/:id` marks the assignment returned and frees its
/// unit. The body may be omitted entirely.
pub async fn close<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Option<Json<CloseBody>>, JsonRejection>,
) -> Result<Json<AssignmentView>, ApiError> {
  let Path(id) = id?;
  let body = body?.map(|Json(body)| body).unwrap_or_default();
  let today = today();
  let closed = coordinator
    .unassign(id, body.end_date.unwrap_or(today))
    .await?;
  Ok(Json(AssignmentView::at(closed, today)))
}
