//! Async HTTP client wrapping the Tally JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use tally_core::{
  assignment::AssignmentView,
  resource::{Resource, ResourceKind},
  subject::Subject,
};
use tracing::debug;
use uuid::Uuid;

/// Async HTTP client for the Tally JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|body| body["error"].as_str().map(str::to_owned))
    .unwrap_or_else(|| status.to_string());
  Err(anyhow!("{what} → {status}: {message}"))
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  // ── Resources ─────────────────────────────────────────────────────────────

  /// `GET /api/resources[?kind=<kind>]`
  pub async fn list_resources(&self, kind: Option<ResourceKind>) -> Result<Vec<Resource>> {
    let mut req = self.client.get(self.url("/resources"));
    if let Some(kind) = kind {
      req = req.query(&[("kind", kind.as_ref())]);
    }
    debug!(?kind, "listing resources");
    let resp = req.send().await.context("GET /resources failed")?;
    check(resp, "GET /resources")
      .await?
      .json()
      .await
      .context("deserialising resources")
  }

  /// `GET /api/resources/<id>`
  pub async fn get_resource(&self, id: Uuid) -> Result<Resource> {
    let resp = self
      .client
      .get(self.url(&format!("/resources/{id}")))
      .send()
      .await
      .context("GET /resources/:id failed")?;
    check(resp, "GET /resources/:id")
      .await?
      .json()
      .await
      .context("deserialising resource")
  }

  /// `GET /api/resources/<id>/assignments`
  pub async fn resource_assignments(&self, id: Uuid) -> Result<Vec<AssignmentView>> {
    let resp = self
      .client
      .get(self.url(&format!("/resources/{id}/assignments")))
      .send()
      .await
      .context("GET /resources/:id/assignments failed")?;
    check(resp, "GET /resources/:id/assignments")
      .await?
      .json()
      .await
      .context("deserialising assignments")
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  /// `GET /api/subjects`
  pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let resp = self
      .client
      .get(self.url("/subjects"))
      .send()
      .await
      .context("GET /subjects failed")?;
    check(resp, "GET /subjects")
      .await?
      .json()
      .await
      .context("deserialising subjects")
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  /// `POST /api/assignments`
  pub async fn assign(
    &self,
    resource_id: Uuid,
    subject_id: Uuid,
    start_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
  ) -> Result<AssignmentView> {
    let body = json!({
      "resourceId": resource_id,
      "subjectId":  subject_id,
      "startDate":  start_date,
      "dueDate":    due_date,
    });
    debug!(%resource_id, %subject_id, "opening assignment");
    let resp = self
      .client
      .post(self.url("/assignments"))
      .json(&body)
      .send()
      .await
      .context("POST /assignments failed")?;
    check(resp, "POST /assignments")
      .await?
      .json()
      .await
      .context("deserialising assignment")
  }

  /// `PATCH /api/assignments/<id>`
  pub async fn close(&self, id: Uuid, end_date: Option<NaiveDate>) -> Result<AssignmentView> {
    debug!(assignment_id = %id, "closing assignment");
    let resp = self
      .client
      .patch(self.url(&format!("/assignments/{id}")))
      .json(&json!({ "endDate": end_date }))
      .send()
      .await
      .context("PATCH /assignments/:id failed")?;
    check(resp, "PATCH /assignments/:id")
      .await?
      .json()
      .await
      .context("deserialising assignment")
  }

  /// `GET /api/assignments?overdue=true`
  pub async fn overdue(&self) -> Result<Vec<AssignmentView>> {
    let resp = self
      .client
      .get(self.url("/assignments"))
      .query(&[("overdue", "true")])
      .send()
      .await
      .context("GET /assignments?overdue=true failed")?;
    check(resp, "GET /assignments?overdue=true")
      .await?
      .json()
      .await
      .context("deserialising assignments")
  }
}
