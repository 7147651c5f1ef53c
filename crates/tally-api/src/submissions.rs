//! Handlers for `/submissions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/submissions` | Body: `NewGradeSubmission`; returns 201 + draft |
//! | `GET`  | `/submissions/:id` | Single submission |
//! | `PUT`  | `/submissions/:id/entries` | Body: [`EntriesBody`] |
//! | `POST` | `/submissions/:id/transitions` | Body: [`TransitionBody`] |
//! | `GET`  | `/submissions/:id/history` | Status changes, oldest first |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  grade::{
    GradeSubmission, NewGradeSubmission, SubmissionEvent, SubmissionStatus, WorkflowAction,
  },
  identity::Actor,
  store::SchoolStore,
};
use uuid::Uuid;

use crate::{AppState, ApiError, Caller, ensure_visible};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /submissions`: returns 201 + the new draft.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Json(body): Json<NewGradeSubmission>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + 'static,
{
  let submission = state.workflow().create(&caller, body).await?;
  Ok((StatusCode::CREATED, Json(submission)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /submissions/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<GradeSubmission>, ApiError>
where
  S: SchoolStore + 'static,
{
  Ok(Json(visible(&state, &caller, id).await?))
}

/// `GET /submissions/:id/history`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionEvent>>, ApiError>
where
  S: SchoolStore + 'static,
{
  visible(&state, &caller, id).await?;
  Ok(Json(state.workflow().history(id).await?))
}

// ─── Save draft ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EntriesBody {
  pub entries:         BTreeMap<Uuid, f64>,
  /// The status the caller last saw; a mismatch is reported as stale.
  pub expected_status: Option<SubmissionStatus>,
}

/// `PUT /submissions/:id/entries`
pub async fn save_entries<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<EntriesBody>,
) -> Result<Json<GradeSubmission>, ApiError>
where
  S: SchoolStore + 'static,
{
  let updated = state
    .workflow()
    .save_draft(&caller, id, body.entries, body.expected_status)
    .await?;
  Ok(Json(updated))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub action:          WorkflowAction,
  pub comment:         Option<String>,
  pub expected_status: Option<SubmissionStatus>,
}

/// `POST /submissions/:id/transitions`, body:
/// `{"action":"class_teacher_reject","comment":"...","expected_status":"under_class_teacher_review"}`
pub async fn transition<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<TransitionBody>,
) -> Result<Json<GradeSubmission>, ApiError>
where
  S: SchoolStore + 'static,
{
  let updated = state
    .workflow()
    .transition(id, body.action, &caller, body.comment, body.expected_status)
    .await?;
  Ok(Json(updated))
}

/// Load a submission the caller's school owns.
async fn visible<S>(state: &AppState<S>, caller: &Actor, id: Uuid) -> Result<GradeSubmission, ApiError>
where
  S: SchoolStore + 'static,
{
  let submission = state.workflow().get(id).await?;
  let class = state.class(submission.class_id).await?;
  ensure_visible(caller, class.school_id)?;
  Ok(submission)
}
