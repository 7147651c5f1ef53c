//! Minimal registry endpoints for sections, rosters and exam cycles.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/classes` | Body: `NewClassSection`; school leaders only; 409 if the labels are taken |
//! | `GET`  | `/schools/:id/classes` | Ordered by class then section label |
//! | `GET`  | `/classes/:id/students` | Roll-number order |
//! | `POST` | `/classes/:id/students` | Body: [`StudentBody`]; school leaders only |
//! | `POST` | `/exam-cycles` | Body: `NewExamCycle`; school leaders only |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  identity::{Actor, Role},
  school::{ClassSection, NewClassSection, NewExamCycle, NewStudent, Student},
  store::{SchoolStore, StoreError},
};
use uuid::Uuid;

use crate::{AppState, ApiError, Caller, ensure_visible, store_error};

/// Registry writes are reserved for the school's leadership.
fn ensure_admin(caller: &Actor, school_id: Uuid) -> Result<(), ApiError> {
  if caller.role == Role::SuperAdmin || caller.leads_school(school_id) {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("{} may not edit school {school_id}", caller.role)))
  }
}

fn non_empty(field: &str, value: &str) -> Result<String, ApiError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(value.to_owned())
}

// ─── Classes ─────────────────────────────────────────────────────────────────

/// `POST /classes`
pub async fn create_class<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Json(body): Json<NewClassSection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_admin(&caller, body.school_id)?;
  let input = NewClassSection {
    class_label: non_empty("class_label", &body.class_label)?,
    section_label: non_empty("section_label", &body.section_label)?,
    ..body
  };
  let label = format!("{}{}", input.class_label, input.section_label);
  let class = state.store.add_class(input).await.map_err(|e| {
    if e.is_conflict() {
      ApiError::Domain(tally_core::Error::DuplicateClass { label })
    } else {
      store_error(e)
    }
  })?;
  Ok((StatusCode::CREATED, Json(class)))
}

/// `GET /schools/:id/classes`
pub async fn list_classes<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(school_id): Path<Uuid>,
) -> Result<Json<Vec<ClassSection>>, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_visible(&caller, school_id)?;
  let classes = state.store.list_classes(school_id).await.map_err(store_error)?;
  Ok(Json(classes))
}

// ─── Students ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StudentBody {
  pub roll_number: u32,
  pub name:        String,
}

/// `GET /classes/:id/students`
pub async fn roster<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(class_id): Path<Uuid>,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: SchoolStore + 'static,
{
  let class = state.class(class_id).await?;
  ensure_visible(&caller, class.school_id)?;
  let students = state.store.roster(class_id).await.map_err(store_error)?;
  Ok(Json(students))
}

/// `POST /classes/:id/students`
pub async fn add_student<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Path(class_id): Path<Uuid>,
  Json(body): Json<StudentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + 'static,
{
  let class = state.class(class_id).await?;
  ensure_admin(&caller, class.school_id)?;
  let student = state
    .store
    .add_student(NewStudent {
      roll_number: body.roll_number,
      name: non_empty("name", &body.name)?,
      class_id,
    })
    .await
    .map_err(store_error)?;
  Ok((StatusCode::CREATED, Json(student)))
}

// ─── Exam cycles ─────────────────────────────────────────────────────────────

/// `POST /exam-cycles`
pub async fn create_exam_cycle<S>(
  State(state): State<AppState<S>>,
  Caller(caller): Caller,
  Json(body): Json<NewExamCycle>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + 'static,
{
  ensure_admin(&caller, body.school_id)?;
  let input = NewExamCycle { label: non_empty("label", &body.label)?, ..body };
  let cycle = state.store.add_exam_cycle(input).await.map_err(store_error)?;
  Ok((StatusCode::CREATED, Json(cycle)))
}
