//! Handlers for attendance marking and the per-class summary.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance` | Body: [`RecordBody`]; returns 201 + stored record |
//! | `GET`  | `/classes/:id/attendance` | `?from=YYYY-MM-DD&to=YYYY-MM-DD` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::{
  attendance::{AttendanceStatus, AttendanceSummary, DateRange, NewAttendanceRecord},
  store::SchoolStore,
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, ApiError, Caller, ensure_visible, store_error};

/// Longest span a single summary request may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecordBody {
  pub student_id: Uuid,
  pub date:       NaiveDate,
  pub status:     AttendanceStatus,
}

/// `POST /attendance`: append a mark. Posting again for the same student and
/// day records a correction; the latest one wins.
pub async fn record<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Json(body): Json<RecordBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + 'static,
{
  let student = state
    .store
    .get_student(body.student_id)
    .await
    .map_err(store_error)?
    .ok_or(ApiError::Domain(tally_core::Error::StudentNotFound(body.student_id)))?;
  let class = state.class(student.class_id).await?;

  if !(caller.teaches_class(&class) || caller.leads_school(class.school_id)) {
    return Err(ApiError::Forbidden(format!(
      "{} may not mark attendance for {}",
      caller.role,
      class.display_label()
    )));
  }

  let record = state
    .store
    .record_attendance(NewAttendanceRecord {
      student_id:  student.student_id,
      date:        body.date,
      status:      body.status,
      recorded_by: caller.user_id,
    })
    .await
    .map_err(store_error)?;

  info!(
    student_id = %record.student_id,
    date = %record.date,
    status = %record.status,
    "attendance recorded"
  );
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub from: NaiveDate,
  pub to:   NaiveDate,
}

/// `GET /classes/:id/attendance?from=..&to=..`
pub async fn summary<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(class_id): Path<Uuid>,
  Query(params): Query<SummaryParams>,
) -> Result<Json<AttendanceSummary>, ApiError>
where
  S: SchoolStore + 'static,
{
  let range = DateRange::new(params.from, params.to);
  if (range.end - range.start).num_days() >= MAX_RANGE_DAYS {
    return Err(ApiError::BadRequest(format!(
      "range may cover at most {MAX_RANGE_DAYS} days"
    )));
  }

  let class = state.class(class_id).await?;
  ensure_visible(&caller, class.school_id)?;

  let summary = state.dashboard().attendance_summary(class_id, range).await?;
  Ok(Json(summary))
}
