//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  /// Missing or malformed caller identity, or a caller outside the resource's
  /// school.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error(transparent)]
  Domain(#[from] tally_core::Error),
}

impl ApiError {
  /// Status code, stable machine-readable code, and any extra body fields.
  fn parts(&self) -> (StatusCode, &'static str, Option<Value>) {
    use tally_core::Error as E;

    match self {
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
      ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),
      ApiError::Domain(e) => match e {
        E::SubmissionNotFound(_)
        | E::ClassNotFound(_)
        | E::StudentNotFound(_)
        | E::ExamCycleNotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
        E::MissingReason => (StatusCode::BAD_REQUEST, "missing_reason", None),
        E::EmptySubject | E::InvalidMaxMarks(_) => {
          (StatusCode::BAD_REQUEST, "bad_request", None)
        }
        E::UnauthorizedTransition { .. } => {
          (StatusCode::FORBIDDEN, "unauthorized_transition", None)
        }
        E::StaleState { expected, actual, .. } => (
          StatusCode::CONFLICT,
          "stale_state",
          Some(json!({ "expected": expected, "actual": actual })),
        ),
        E::DuplicateSubmission { .. } => {
          (StatusCode::CONFLICT, "duplicate_submission", None)
        }
        E::DuplicateClass { .. } => (StatusCode::CONFLICT, "duplicate_class", None),
        E::InvalidTransition { .. } => {
          (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", None)
        }
        E::IncompleteSubmission { missing } => (
          StatusCode::UNPROCESSABLE_ENTITY,
          "incomplete_submission",
          Some(json!({ "missing": missing })),
        ),
        E::UnknownStudent(_) | E::MarksOutOfRange { .. } => {
          (StatusCode::UNPROCESSABLE_ENTITY, "invalid_entries", None)
        }
        E::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, extra) = self.parts();
    // Backend detail stays in the log.
    let message = if status.is_server_error() {
      error!(error = %self, "request failed");
      "internal server error".to_owned()
    } else {
      self.to_string()
    };

    let mut body = json!({ "error": message, "code": code });
    if let (Some(Value::Object(extra)), Some(obj)) = (extra, body.as_object_mut()) {
      obj.extend(extra);
    }
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn domain_errors_map_to_statuses() {
    use tally_core::{
      Error as E,
      grade::{SubmissionStatus, WorkflowAction},
    };

    let cases = [
      (E::MissingReason, StatusCode::BAD_REQUEST),
      (
        E::StaleState {
          submission_id: Uuid::nil(),
          expected:      SubmissionStatus::UnderClassTeacherReview,
          actual:        SubmissionStatus::Published,
        },
        StatusCode::CONFLICT,
      ),
      (
        E::InvalidTransition {
          action: WorkflowAction::PrincipalApprove,
          from:   SubmissionStatus::Published,
        },
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
      (E::SubmissionNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), status);
    }
  }

  #[tokio::test]
  async fn server_errors_hide_backend_detail() {
    let backend = std::io::Error::other("UNIQUE constraint failed: classes.school_id");
    let resp = ApiError::from(tally_core::Error::store(backend)).into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "internal");
    assert!(!body["error"].as_str().unwrap().contains("UNIQUE"));
  }

  #[test]
  fn duplicate_section_is_a_conflict() {
    let err = tally_core::Error::DuplicateClass { label: "10A".into() };
    assert_eq!(ApiError::from(err).into_response().status(), StatusCode::CONFLICT);
  }
}
