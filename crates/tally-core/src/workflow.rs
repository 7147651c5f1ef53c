//! The grade approval workflow.
//!
//! Every operation loads the submission, checks the caller's view of its
//! status, the state precondition, the caller's capability and the action's
//! own requirements, then commits through a single
//! [`SchoolStore::compare_and_set`] keyed on the version it read. If another
//! write landed first (a review, or an entry save) the commit fails and the
//! caller receives [`Error::StaleState`].

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  grade::{
    GradeSubmission, NewGradeSubmission, SubmissionEvent, SubmissionStatus,
    WorkflowAction,
  },
  identity::{Actor, may_perform},
  school::{ClassSection, Student},
  store::{SchoolStore, StoreError},
};

/// Grade workflow operations over a borrowed store. Cheap to construct per
/// request.
pub struct GradeWorkflow<'a, S> {
  store: &'a S,
}

impl<'a, S: SchoolStore> GradeWorkflow<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get(&self, submission_id: Uuid) -> Result<GradeSubmission> {
    self
      .store
      .get_submission(submission_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SubmissionNotFound(submission_id))
  }

  /// Every recorded status change, oldest first.
  pub async fn history(&self, submission_id: Uuid) -> Result<Vec<SubmissionEvent>> {
    self.get(submission_id).await?;
    self
      .store
      .submission_history(submission_id)
      .await
      .map_err(Error::store)
  }

  // ── Creation ──────────────────────────────────────────────────────────

  /// Open a new `Draft` for a class the actor teaches.
  pub async fn create(
    &self,
    actor: &Actor,
    input: NewGradeSubmission,
  ) -> Result<GradeSubmission> {
    let class = self.class(input.class_id).await?;
    if !actor.teaches_class(&class) {
      debug!(actor = %actor.user_id, class = %class.class_id, "create denied");
      return Err(Error::UnauthorizedTransition {
        action: WorkflowAction::SaveDraft,
        role:   actor.role,
      });
    }

    let cycle = self
      .store
      .get_exam_cycle(input.exam_cycle_id)
      .await
      .map_err(Error::store)?
      .filter(|c| c.school_id == class.school_id)
      .ok_or(Error::ExamCycleNotFound(input.exam_cycle_id))?;

    let subject = input.subject.trim().to_owned();
    if subject.is_empty() {
      return Err(Error::EmptySubject);
    }
    if !(input.max_marks.is_finite() && input.max_marks > 0.0) {
      return Err(Error::InvalidMaxMarks(input.max_marks));
    }

    let existing = self
      .store
      .find_submission(class.class_id, &subject, cycle.exam_cycle_id)
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Err(Error::DuplicateSubmission { subject });
    }

    let roster = self.roster(class.class_id).await?;
    validate_entries(&roster, &input.entries, input.max_marks)?;

    let now = Utc::now();
    let submission = GradeSubmission {
      submission_id:      Uuid::new_v4(),
      class_id:           class.class_id,
      subject,
      exam_cycle_id:      cycle.exam_cycle_id,
      teacher_id:         actor.user_id,
      entries:            input.entries,
      max_marks:          input.max_marks,
      status:             SubmissionStatus::Draft,
      reviewer_comment:   None,
      created_at:         now,
      submitted_at:       None,
      last_transition_at: now,
      version:            1,
    };
    let created = SubmissionEvent {
      event_id:      Uuid::new_v4(),
      submission_id: submission.submission_id,
      from:          None,
      to:            SubmissionStatus::Draft,
      actor_id:      actor.user_id,
      comment:       None,
      at:            now,
    };

    // A concurrent create can slip past the lookup above; the store's
    // uniqueness rule decides.
    self
      .store
      .insert_submission(submission.clone(), created)
      .await
      .map_err(|e| {
        if e.is_conflict() {
          Error::DuplicateSubmission { subject: submission.subject.clone() }
        } else {
          Error::store(e)
        }
      })?;

    info!(
      submission_id = %submission.submission_id,
      class = %class.display_label(),
      subject = %submission.subject,
      "grade submission created"
    );
    Ok(submission)
  }

  // ── Author actions ────────────────────────────────────────────────────

  /// Replace the entries of an editable submission. The status is unchanged.
  pub async fn save_draft(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    entries: BTreeMap<Uuid, f64>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(submission_id, actor, WorkflowAction::SaveDraft, expected, None, Some(entries))
      .await
  }

  /// Send a complete submission into class-teacher review.
  pub async fn submit(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(submission_id, actor, WorkflowAction::Submit, expected, None, None)
      .await
  }

  // ── Reviewer actions ──────────────────────────────────────────────────

  pub async fn class_teacher_approve(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    comment: Option<String>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(
        submission_id,
        actor,
        WorkflowAction::ClassTeacherApprove,
        expected,
        comment,
        None,
      )
      .await
  }

  pub async fn class_teacher_reject(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    comment: Option<String>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(
        submission_id,
        actor,
        WorkflowAction::ClassTeacherReject,
        expected,
        comment,
        None,
      )
      .await
  }

  pub async fn principal_approve(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    comment: Option<String>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(
        submission_id,
        actor,
        WorkflowAction::PrincipalApprove,
        expected,
        comment,
        None,
      )
      .await
  }

  pub async fn principal_reject(
    &self,
    actor: &Actor,
    submission_id: Uuid,
    comment: Option<String>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(
        submission_id,
        actor,
        WorkflowAction::PrincipalReject,
        expected,
        comment,
        None,
      )
      .await
  }

  /// Dispatch `action` by value.
  ///
  /// `SaveDraft` carries no entries here; it re-validates and rewrites the
  /// stored entries. Use [`Self::save_draft`] to change them.
  pub async fn transition(
    &self,
    submission_id: Uuid,
    action: WorkflowAction,
    actor: &Actor,
    comment: Option<String>,
    expected: Option<SubmissionStatus>,
  ) -> Result<GradeSubmission> {
    self
      .run(submission_id, actor, action, expected, comment, None)
      .await
  }

  // ── Internals ─────────────────────────────────────────────────────────

  async fn run(
    &self,
    submission_id: Uuid,
    actor: &Actor,
    action: WorkflowAction,
    expected: Option<SubmissionStatus>,
    comment: Option<String>,
    entries: Option<BTreeMap<Uuid, f64>>,
  ) -> Result<GradeSubmission> {
    let current = self.get(submission_id).await?;

    if let Some(expected) = expected
      && expected != current.status
    {
      warn!(%submission_id, %expected, actual = %current.status, %action, "stale view");
      return Err(Error::StaleState {
        submission_id,
        expected,
        actual: current.status,
      });
    }

    if !action.accepts(current.status) {
      return Err(Error::InvalidTransition { action, from: current.status });
    }

    let class = self.class(current.class_id).await?;
    if !may_perform(action, actor, &current, &class) {
      debug!(%submission_id, actor = %actor.user_id, role = %actor.role, %action, "denied");
      return Err(Error::UnauthorizedTransition { action, role: actor.role });
    }

    let comment = comment
      .map(|c| c.trim().to_owned())
      .filter(|c| !c.is_empty());
    if action.requires_reason() && comment.is_none() {
      return Err(Error::MissingReason);
    }

    let now = Utc::now();
    let mut updated = current.clone();

    match action {
      WorkflowAction::SaveDraft => {
        let roster = self.roster(class.class_id).await?;
        let entries = entries.unwrap_or_else(|| current.entries.clone());
        validate_entries(&roster, &entries, current.max_marks)?;
        updated.entries = entries;
      }
      WorkflowAction::Submit => {
        let roster = self.roster(class.class_id).await?;
        let missing = missing_students(&roster, &current.entries);
        if !missing.is_empty() {
          return Err(Error::IncompleteSubmission { missing });
        }
        // Marks of students who have since left the roster are dropped.
        let entries = on_roster(&roster, &current.entries);
        validate_entries(&roster, &entries, current.max_marks)?;
        updated.entries = entries;
        updated.submitted_at = Some(now);
      }
      WorkflowAction::ClassTeacherApprove
      | WorkflowAction::ClassTeacherReject
      | WorkflowAction::PrincipalApprove
      | WorkflowAction::PrincipalReject => {
        // An approval clears any earlier rejection reason.
        updated.reviewer_comment = comment.clone();
      }
    }

    let mut events = Vec::with_capacity(action.path().len());
    let mut from = current.status;
    for &to in action.path() {
      events.push(SubmissionEvent {
        event_id: Uuid::new_v4(),
        submission_id,
        from: Some(from),
        to,
        actor_id: actor.user_id,
        comment: comment.clone(),
        at: now,
      });
      from = to;
    }
    if !events.is_empty() {
      updated.status = from;
      updated.last_transition_at = now;
    }
    updated.version = current.version.wrapping_add(1);

    let committed = self
      .store
      .compare_and_set(updated.clone(), current.version, events)
      .await
      .map_err(Error::store)?;

    if !committed {
      let actual = self
        .store
        .get_submission(submission_id)
        .await
        .map_err(Error::store)?
        .map_or(current.status, |s| s.status);
      warn!(%submission_id, expected = %current.status, %actual, %action, "lost race");
      return Err(Error::StaleState {
        submission_id,
        expected: current.status,
        actual,
      });
    }

    info!(
      %submission_id,
      from = %current.status,
      to = %updated.status,
      actor = %actor.user_id,
      %action,
      "grade submission updated"
    );
    Ok(updated)
  }

  async fn class(&self, class_id: Uuid) -> Result<ClassSection> {
    self
      .store
      .get_class(class_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ClassNotFound(class_id))
  }

  async fn roster(&self, class_id: Uuid) -> Result<Vec<Student>> {
    self.store.roster(class_id).await.map_err(Error::store)
  }
}

/// Every key must be on the roster and every mark within `0..=max_marks`.
fn validate_entries(
  roster: &[Student],
  entries: &BTreeMap<Uuid, f64>,
  max_marks: f64,
) -> Result<()> {
  let enrolled: HashSet<Uuid> = roster.iter().map(|s| s.student_id).collect();
  for (&student_id, &marks) in entries {
    if !enrolled.contains(&student_id) {
      return Err(Error::UnknownStudent(student_id));
    }
    if !marks.is_finite() || marks < 0.0 || marks > max_marks {
      return Err(Error::MarksOutOfRange { student_id, marks, max_marks });
    }
  }
  Ok(())
}

/// Roster students without a mark, in roster order.
fn missing_students(roster: &[Student], entries: &BTreeMap<Uuid, f64>) -> Vec<Uuid> {
  roster
    .iter()
    .map(|s| s.student_id)
    .filter(|id| !entries.contains_key(id))
    .collect()
}

/// The entries whose student is on `roster`.
fn on_roster(roster: &[Student], entries: &BTreeMap<Uuid, f64>) -> BTreeMap<Uuid, f64> {
  let enrolled: HashSet<Uuid> = roster.iter().map(|s| s.student_id).collect();
  entries
    .iter()
    .filter(|(id, _)| enrolled.contains(id))
    .map(|(&id, &marks)| (id, marks))
    .collect()
}
