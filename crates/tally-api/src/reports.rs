//! Handlers for the school-level read models.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/schools/:id/absentees` | `?as_of=..[&min_streak=..]` |
//! | `GET`  | `/schools/:id/cutoff-violations` | `?date=..[&evaluated_at=..]` |
//! | `GET`  | `/schools/:id/ranking` | `?metric=attendance\|grades[&date][&order][&n][&exam_cycle_id]` |
//! | `GET`  | `/reviews/pending` | Review queue for the caller |
//! | `GET`  | `/dashboard` | `?date=..`; role-dependent overview |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tally_core::{
  alerts::AbsenteeAlert,
  cutoff::CutoffViolation,
  dashboard::DashboardView,
  grade::GradeSubmission,
  ranking::{RankOrder, RankedClass, RankingMetric},
  store::SchoolStore,
};
use uuid::Uuid;

use crate::{AppState, ApiError, Caller, ensure_visible};

/// Ranking size when `n` is not given.
pub const DEFAULT_RANK_SIZE: usize = 5;

// ─── Absentees ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AbsenteeParams {
  pub as_of:      Option<NaiveDate>,
  pub min_streak: Option<u32>,
}

/// `GET /schools/:id/absentees`
pub async fn absentees<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(school_id): Path<Uuid>,
  Query(params): Query<AbsenteeParams>,
) -> Result<Json<Vec<AbsenteeAlert>>, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_visible(&caller, school_id)?;
  let as_of = params.as_of.unwrap_or_else(|| state.policy.local_date(Utc::now()));
  let min_streak = params.min_streak.unwrap_or(state.min_streak);

  let alerts = state
    .dashboard()
    .consecutive_absentees(school_id, as_of, min_streak)
    .await?;
  Ok(Json(alerts))
}

// ─── Cutoff ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CutoffParams {
  pub date:         Option<NaiveDate>,
  /// Defaults to now.
  pub evaluated_at: Option<DateTime<Utc>>,
}

/// `GET /schools/:id/cutoff-violations`
pub async fn cutoff_violations<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(school_id): Path<Uuid>,
  Query(params): Query<CutoffParams>,
) -> Result<Json<Vec<CutoffViolation>>, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_visible(&caller, school_id)?;
  let evaluated_at = params.evaluated_at.unwrap_or_else(Utc::now);
  let date = params.date.unwrap_or_else(|| state.policy.local_date(evaluated_at));

  let violations = state
    .dashboard()
    .cutoff_violations(school_id, date, evaluated_at)
    .await?;
  Ok(Json(violations))
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricParam {
  Attendance,
  Grades,
}

#[derive(Debug, Deserialize)]
pub struct RankingParams {
  pub metric:        MetricParam,
  pub date:          Option<NaiveDate>,
  pub order:         Option<RankOrder>,
  pub n:             Option<usize>,
  pub exam_cycle_id: Option<Uuid>,
}

/// `GET /schools/:id/ranking`
pub async fn ranking<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(school_id): Path<Uuid>,
  Query(params): Query<RankingParams>,
) -> Result<Json<Vec<RankedClass>>, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_visible(&caller, school_id)?;
  let metric = match params.metric {
    MetricParam::Attendance => RankingMetric::Attendance,
    MetricParam::Grades => RankingMetric::Grades { exam_cycle_id: params.exam_cycle_id },
  };
  let date = params.date.unwrap_or_else(|| state.policy.local_date(Utc::now()));

  let ranked = state
    .dashboard()
    .class_ranking(
      school_id,
      metric,
      date,
      params.order.unwrap_or(RankOrder::Top),
      params.n.unwrap_or(DEFAULT_RANK_SIZE),
    )
    .await?;
  Ok(Json(ranked))
}

// ─── Review queue ────────────────────────────────────────────────────────────

/// `GET /reviews/pending`
pub async fn pending_reviews<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
) -> Result<Json<Vec<GradeSubmission>>, ApiError>
where
  S: SchoolStore + 'static,
{
  Ok(Json(state.dashboard().pending_reviews(&caller).await?))
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
  pub date: Option<NaiveDate>,
}

/// `GET /dashboard[?date=..]`
pub async fn dashboard<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardView>, ApiError>
where
  S: SchoolStore + 'static,
{
  let now = Utc::now();
  let date = params.date.unwrap_or_else(|| state.policy.local_date(now));
  Ok(Json(state.dashboard().overview(&caller, date, now).await?))
}
