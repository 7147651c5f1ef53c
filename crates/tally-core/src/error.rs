//! Error types for `tally-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  grade::{SubmissionStatus, WorkflowAction},
  identity::Role,
};

#[derive(Debug, Error)]
pub enum Error {
  /// `submit` was attempted while some roster students have no mark.
  /// `missing` lists them in roster order.
  #[error("submission is missing marks for {} student(s)", missing.len())]
  IncompleteSubmission { missing: Vec<Uuid> },

  /// The submission changed since the caller observed it: its status moved
  /// on, or another write landed under the same status.
  #[error(
    "submission {submission_id} changed since it was read (expected {expected}, \
     found {actual}); reload"
  )]
  StaleState {
    submission_id: Uuid,
    expected:      SubmissionStatus,
    actual:        SubmissionStatus,
  },

  #[error("{role} may not perform {action}")]
  UnauthorizedTransition { action: WorkflowAction, role: Role },

  #[error("{action} is not defined from {from}")]
  InvalidTransition {
    action: WorkflowAction,
    from:   SubmissionStatus,
  },

  #[error("a rejection requires a non-empty reason")]
  MissingReason,

  #[error("submission not found: {0}")]
  SubmissionNotFound(Uuid),

  #[error("class not found: {0}")]
  ClassNotFound(Uuid),

  #[error("student not found: {0}")]
  StudentNotFound(Uuid),

  #[error("exam cycle not found: {0}")]
  ExamCycleNotFound(Uuid),

  #[error("student {0} is not on the class roster")]
  UnknownStudent(Uuid),

  #[error("marks {marks} for student {student_id} are outside 0..={max_marks}")]
  MarksOutOfRange {
    student_id: Uuid,
    marks:      f64,
    max_marks:  f64,
  },

  #[error("maximum marks must be positive, got {0}")]
  InvalidMaxMarks(f64),

  #[error("subject must not be empty")]
  EmptySubject,

  #[error("section {label} already exists in this school")]
  DuplicateClass { label: String },

  #[error("a submission for {subject} already exists for this class and exam cycle")]
  DuplicateSubmission { subject: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error. Used at every `SchoolStore` call site.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
