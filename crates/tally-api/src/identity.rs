//! Caller identity extractor.
//!
//! Identity is resolved upstream (gateway or session layer) and forwarded as
//! trusted headers:
//!
//! | Header | Required | Value |
//! |--------|----------|-------|
//! | `x-user-id` | yes | UUID |
//! | `x-role` | yes | snake_case [`Role`] |
//! | `x-school-id` | yes | UUID |
//! | `x-class-teacher-for` | no | UUID |
//! | `x-assigned-classes` | no | comma-separated UUIDs |

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use tally_core::identity::{Actor, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID: &str = "x-user-id";
pub const ROLE: &str = "x-role";
pub const SCHOOL_ID: &str = "x-school-id";
pub const CLASS_TEACHER_FOR: &str = "x-class-teacher-for";
pub const ASSIGNED_CLASSES: &str = "x-assigned-classes";

/// The authenticated caller. Rejects with 403 when identity is absent or
/// malformed.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    actor_from_headers(&parts.headers).map(Caller)
  }
}

/// Parse an [`Actor`] from the identity headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
  let user_id = uuid_header(headers, USER_ID)?.ok_or_else(|| missing(USER_ID))?;
  let school_id = uuid_header(headers, SCHOOL_ID)?.ok_or_else(|| missing(SCHOOL_ID))?;
  let role: Role = text_header(headers, ROLE)?
    .ok_or_else(|| missing(ROLE))?
    .parse()
    .map_err(|_| invalid(ROLE))?;
  let class_teacher_for = uuid_header(headers, CLASS_TEACHER_FOR)?;

  let assigned_classes = match text_header(headers, ASSIGNED_CLASSES)? {
    Some(list) => list
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| Uuid::parse_str(s).map_err(|_| invalid(ASSIGNED_CLASSES)))
      .collect::<Result<Vec<_>, _>>()?,
    None => Vec::new(),
  };

  Ok(Actor { user_id, role, school_id, class_teacher_for, assigned_classes })
}

fn text_header<'h>(headers: &'h HeaderMap, name: &'static str) -> Result<Option<&'h str>, ApiError> {
  headers
    .get(name)
    .map(|v| v.to_str().map(str::trim).map_err(|_| invalid(name)))
    .transpose()
}

fn uuid_header(headers: &HeaderMap, name: &'static str) -> Result<Option<Uuid>, ApiError> {
  text_header(headers, name)?
    .map(|s| Uuid::parse_str(s).map_err(|_| invalid(name)))
    .transpose()
}

fn missing(name: &str) -> ApiError { ApiError::Forbidden(format!("missing {name} header")) }

fn invalid(name: &str) -> ApiError { ApiError::Forbidden(format!("invalid {name} header")) }
