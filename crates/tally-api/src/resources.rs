//! Handlers for `/resources` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/resources` | Optional `?kind=book\|bus`; newest first |
//! | `POST`   | `/resources` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/resources/:id` | 404 if not found |
//! | `PUT`    | `/resources/:id` | Body: [`UpdateBody`] |
//! | `DELETE` | `/resources/:id` | 400 while any assignment is open |
//! | `GET`    | `/resources/:id/assignments` | Open assignments, oldest start first |

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
use serde::Deserialize;
use serde_json::{Value, json};
use tally_core::{
  Coordinator,
  assignment::{AssignmentView, OpenFor},
  resource::{NewResource, Resource, ResourceDetails, ResourceKind, ResourceUpdate},
  store::Store,
};
use uuid::Uuid;

use crate::{error::ApiError, today};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind: Option<ResourceKind>,
}

/// `GET /resources[?kind=<kind>]`
pub async fn list<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Resource>>, ApiError> {
  let Query(params) = params?;
  Ok(Json(coordinator.resources(params.kind).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /resources`. The `kind` tag lives inside
/// `details`, e.g. `{"totalUnits":3,"details":{"kind":"book",...}}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub total_units: u32,
  pub details:     ResourceDetails,
}

impl From<CreateBody> for NewResource {
  fn from(b: CreateBody) -> Self { NewResource::new(b.details, b.total_units) }
}

/// `POST /resources`; returns 201 + the stored [`Resource`].
pub async fn create<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let resource = coordinator.create_resource(body.into()).await?;
  Ok((StatusCode::CREATED, Json(resource)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /resources/:id`
pub async fn get_one<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Resource>, ApiError> {
  let Path(id) = id?;
  Ok(Json(coordinator.resource(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
  pub details:     Option<ResourceDetails>,
  pub total_units: Option<u32>,
}

impl From<UpdateBody> for ResourceUpdate {
  fn from(b: UpdateBody) -> Self {
    ResourceUpdate { details: b.details, total_units: b.total_units }
  }
}

/// `PUT /resources/:id`
pub async fn update<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<Resource>, ApiError> {
  let Path(id) = id?;
  let Json(body) = body?;
  Ok(Json(coordinator.update_resource(id, body.into()).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /resources/:id`
pub async fn delete<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
  let Path(id) = id?;
  coordinator.delete(id).await?;
  Ok(Json(json!({ "message": format!("resource {id} deleted") })))
}

// ─── Open assignments ─────────────────────────────────────────────────────────

/// `GET /resources/:id/assignments`
pub async fn open_assignments<S: Store>(
  State(coordinator): State<Arc<Coordinator<S>>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<AssignmentView>>, ApiError> {
  let Path(id) = id?;
  let today = today();
  let open = coordinator.open_for(OpenFor::Resource(id)).await?;
  Ok(Json(
    open.into_iter().map(|a| AssignmentView::at(a, today)).collect(),
  ))
}
