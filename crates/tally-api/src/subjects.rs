//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Ordered by name |
//! | `POST` | `/subjects` | Body: `{"name":"...","rollNumber":"...","className":"..."}` |
//! | `GET`  | `/subjects/:id` | 404 if not found |
//! | `GET`  | `/subjects/:id/assignments` | Open assignments, oldest start first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  Coordinator,
  assignment::{AssignmentView, OpenFor},
  store::Store,
  subject::{NewSubject, Subject},
};
use uuid::Uuid;

use crate::{error::ApiError, today};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
) -> Result<Json<Vec<Subject>>, ApiError> {
  Ok(Json(coordinator.subjects().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub name:        String,
  pub roll_number: Option<String>,
  pub class_name:  Option<String>,
}

impl From<CreateBody> for NewSubject {
  fn from(b: CreateBody) -> Self {
    NewSubject {
      name:        b.name,
      roll_number: b.roll_number,
      class_name:  b.class_name,
    }
  }
}

/// `POST /subjects`
pub async fn create<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let subject = coordinator.add_subject(body.into()).await?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Subject>, ApiError> {
  let Path(id) = id?;
  Ok(Json(coordinator.subject(id).await?))
}

/// `GET /subjects/:id/assignments`
pub async fn open_assignments<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<AssignmentView>>, ApiError> {
  let Path(id) = id?;
  let today = today();
  let open = coordinator.open_for(OpenFor::Subject(id)).await?;
  Ok(Json(
    open.into_iter().map(|a| AssignmentView::at(a, today)).collect(),
  ))
}
