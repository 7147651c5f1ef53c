//! Grade submissions and their approval lifecycle.
//!
//! A submission moves through a fixed graph of statuses:
//!
//! ```text
//! Draft ─► Submitted ─► UnderClassTeacherReview ─┬─► ApprovedByClassTeacher ─► UnderPrincipalReview ─┬─► Published
//!   ▲                                            │                                                  │
//!   │                                            └─► RejectedByClassTeacher                         └─► RejectedByPrincipal
//!   └──────── (both rejected states resubmit into Submitted) ◄───────────────────────────────────────────┘
//! ```
//!
//! Every status change is recorded as an append-only [`SubmissionEvent`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
  Draft,
  Submitted,
  UnderClassTeacherReview,
  ApprovedByClassTeacher,
  UnderPrincipalReview,
  Published,
  RejectedByClassTeacher,
  RejectedByPrincipal,
}

impl SubmissionStatus {
  /// Statuses in which the author may edit entries and (re)submit.
  pub fn is_editable(self) -> bool {
    matches!(
      self,
      Self::Draft | Self::RejectedByClassTeacher | Self::RejectedByPrincipal
    )
  }

  /// Whether `next` is a single edge of the lifecycle graph from `self`.
  pub fn can_become(self, next: Self) -> bool {
    use SubmissionStatus::*;
    matches!(
      (self, next),
      (Draft | RejectedByClassTeacher | RejectedByPrincipal, Submitted)
        | (Submitted, UnderClassTeacherReview)
        | (UnderClassTeacherReview, ApprovedByClassTeacher | RejectedByClassTeacher)
        | (ApprovedByClassTeacher, UnderPrincipalReview)
        | (UnderPrincipalReview, Published | RejectedByPrincipal)
    )
  }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// A caller-initiated workflow operation.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowAction {
  SaveDraft,
  Submit,
  ClassTeacherApprove,
  ClassTeacherReject,
  PrincipalApprove,
  PrincipalReject,
}

impl WorkflowAction {
  /// Whether this action is defined from `from`.
  pub fn accepts(self, from: SubmissionStatus) -> bool {
    match self {
      Self::SaveDraft | Self::Submit => from.is_editable(),
      Self::ClassTeacherApprove | Self::ClassTeacherReject => {
        from == SubmissionStatus::UnderClassTeacherReview
      }
      Self::PrincipalApprove | Self::PrincipalReject => {
        from == SubmissionStatus::UnderPrincipalReview
      }
    }
  }

  /// The statuses this action walks through, in order. The last one is where
  /// the submission comes to rest; intermediate ones are passed through
  /// atomically.
  pub fn path(self) -> &'static [SubmissionStatus] {
    use SubmissionStatus::*;
    match self {
      Self::SaveDraft => &[],
      Self::Submit => &[Submitted, UnderClassTeacherReview],
      Self::ClassTeacherApprove => &[ApprovedByClassTeacher, UnderPrincipalReview],
      Self::ClassTeacherReject => &[RejectedByClassTeacher],
      Self::PrincipalApprove => &[Published],
      Self::PrincipalReject => &[RejectedByPrincipal],
    }
  }

  pub fn requires_reason(self) -> bool {
    matches!(self, Self::ClassTeacherReject | Self::PrincipalReject)
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// Marks for one class, one subject and one exam cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSubmission {
  pub submission_id:      Uuid,
  pub class_id:           Uuid,
  pub subject:            String,
  pub exam_cycle_id:      Uuid,
  /// The authoring teacher.
  pub teacher_id:         Uuid,
  /// Student id → marks. Keys are always a subset of the class roster.
  pub entries:            BTreeMap<Uuid, f64>,
  pub max_marks:          f64,
  pub status:             SubmissionStatus,
  pub reviewer_comment:   Option<String>,
  pub created_at:         DateTime<Utc>,
  /// Set on every (re)submission; drives review queue order.
  pub submitted_at:       Option<DateTime<Utc>>,
  pub last_transition_at: DateTime<Utc>,
  /// Bumped by every write, entry saves included. Commits are guarded on it.
  pub version:            u32,
}

impl GradeSubmission {
  /// Each entry as `marks / max_marks * 100`, in student-id order.
  pub fn percentages(&self) -> impl Iterator<Item = f64> + '_ {
    let max = self.max_marks;
    self
      .entries
      .values()
      .filter(move |_| max > 0.0)
      .map(move |m| m / max * 100.0)
  }
}

/// Input to [`crate::workflow::GradeWorkflow::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGradeSubmission {
  pub class_id:      Uuid,
  pub subject:       String,
  pub exam_cycle_id: Uuid,
  pub max_marks:     f64,
  #[serde(default)]
  pub entries:       BTreeMap<Uuid, f64>,
}

// ─── History ─────────────────────────────────────────────────────────────────

/// One recorded status change. `from` is `None` for the creation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEvent {
  pub event_id:      Uuid,
  pub submission_id: Uuid,
  pub from:          Option<SubmissionStatus>,
  pub to:            SubmissionStatus,
  pub actor_id:      Uuid,
  pub comment:       Option<String>,
  pub at:            DateTime<Utc>,
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::SchoolStore::list_submissions`].
/// Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct SubmissionQuery {
  pub school_id:     Option<Uuid>,
  pub class_ids:     Vec<Uuid>,
  pub teacher_id:    Option<Uuid>,
  pub exam_cycle_id: Option<Uuid>,
  pub statuses:      Vec<SubmissionStatus>,
}
