//! Caller identity and per-action capability checks.
//!
//! Identity is resolved by an external system; this crate only receives the
//! resolved [`Actor`] and decides which workflow actions it may invoke.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  grade::{GradeSubmission, WorkflowAction},
  school::ClassSection,
};

/// The closed set of roles known to the platform.
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
pub enum Role {
  SuperAdmin,
  Principal,
  VicePrincipal,
  ClassTeacher,
  SubjectTeacher,
  FleetManager,
  Parent,
}

impl Role {
  /// Principal or vice-principal.
  pub fn is_school_leader(self) -> bool {
    matches!(self, Self::Principal | Self::VicePrincipal)
  }

  /// Roles that author grade submissions.
  pub fn is_teacher(self) -> bool {
    matches!(self, Self::ClassTeacher | Self::SubjectTeacher)
  }
}

/// A resolved, trusted caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:           Uuid,
  pub role:              Role,
  pub school_id:         Uuid,
  /// The section this user leads, when they are a class teacher.
  pub class_teacher_for: Option<Uuid>,
  /// Sections this user teaches a subject in.
  #[serde(default)]
  pub assigned_classes:  Vec<Uuid>,
}

impl Actor {
  /// `true` when this actor is the class teacher of `class`.
  pub fn leads_class(&self, class: &ClassSection) -> bool {
    self.role == Role::ClassTeacher
      && self.school_id == class.school_id
      && class.class_teacher_id == self.user_id
  }

  /// `true` when this actor may author grades for `class`.
  pub fn teaches_class(&self, class: &ClassSection) -> bool {
    self.role.is_teacher()
      && self.school_id == class.school_id
      && (self.assigned_classes.contains(&class.class_id)
        || self.class_teacher_for == Some(class.class_id)
        || class.class_teacher_id == self.user_id)
  }

  /// Read models are tenant-scoped; only a super admin crosses schools.
  pub fn can_view_school(&self, school_id: Uuid) -> bool {
    self.role == Role::SuperAdmin || self.school_id == school_id
  }

  /// `true` when this actor is a principal or vice-principal of `school_id`.
  pub fn leads_school(&self, school_id: Uuid) -> bool {
    self.role.is_school_leader() && self.school_id == school_id
  }
}

/// Whether `actor` holds the capability required for `action` on
/// `submission`, whose class is `class`.
///
/// State preconditions are checked separately; this only answers "is this
/// the right person".
pub fn may_perform(
  action: WorkflowAction,
  actor: &Actor,
  submission: &GradeSubmission,
  class: &ClassSection,
) -> bool {
  match action {
    WorkflowAction::SaveDraft | WorkflowAction::Submit => {
      actor.role.is_teacher()
        && actor.school_id == class.school_id
        && submission.teacher_id == actor.user_id
    }
    WorkflowAction::ClassTeacherApprove | WorkflowAction::ClassTeacherReject => {
      actor.leads_class(class)
    }
    WorkflowAction::PrincipalApprove | WorkflowAction::PrincipalReject => {
      actor.leads_school(class.school_id)
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use chrono::Utc;

  use super::*;
  use crate::grade::SubmissionStatus;

  fn class(school_id: Uuid, class_teacher_id: Uuid) -> ClassSection {
    ClassSection {
      class_id: Uuid::new_v4(),
      school_id,
      class_label: "10".into(),
      section_label: "A".into(),
      class_teacher_id,
    }
  }

  fn submission(class: &ClassSection, teacher_id: Uuid) -> GradeSubmission {
    let now = Utc::now();
    GradeSubmission {
      submission_id: Uuid::new_v4(),
      class_id: class.class_id,
      subject: "Mathematics".into(),
      exam_cycle_id: Uuid::new_v4(),
      teacher_id,
      entries: BTreeMap::new(),
      max_marks: 100.0,
      status: SubmissionStatus::Draft,
      reviewer_comment: None,
      created_at: now,
      submitted_at: None,
      last_transition_at: now,
      version: 1,
    }
  }

  fn actor(user_id: Uuid, role: Role, school_id: Uuid) -> Actor {
    Actor {
      user_id,
      role,
      school_id,
      class_teacher_for: None,
      assigned_classes: vec![],
    }
  }

  #[test]
  fn role_round_trips_through_its_string_form() {
    assert_eq!(Role::VicePrincipal.to_string(), "vice_principal");
    assert_eq!("class_teacher".parse::<Role>().unwrap(), Role::ClassTeacher);
    assert!("janitor".parse::<Role>().is_err());
  }

  #[test]
  fn only_the_author_may_submit() {
    let school = Uuid::new_v4();
    let author = Uuid::new_v4();
    let c = class(school, Uuid::new_v4());
    let s = submission(&c, author);

    let me = actor(author, Role::SubjectTeacher, school);
    let other = actor(Uuid::new_v4(), Role::SubjectTeacher, school);
    assert!(may_perform(WorkflowAction::Submit, &me, &s, &c));
    assert!(!may_perform(WorkflowAction::Submit, &other, &s, &c));
  }

  #[test]
  fn class_review_requires_the_class_teacher_of_that_class() {
    let school = Uuid::new_v4();
    let ct = Uuid::new_v4();
    let c = class(school, ct);
    let s = submission(&c, Uuid::new_v4());

    let right = actor(ct, Role::ClassTeacher, school);
    let wrong = actor(Uuid::new_v4(), Role::ClassTeacher, school);
    let principal = actor(Uuid::new_v4(), Role::Principal, school);
    assert!(may_perform(WorkflowAction::ClassTeacherApprove, &right, &s, &c));
    assert!(!may_perform(WorkflowAction::ClassTeacherApprove, &wrong, &s, &c));
    assert!(!may_perform(WorkflowAction::ClassTeacherReject, &principal, &s, &c));
  }

  #[test]
  fn principal_review_is_scoped_to_the_school() {
    let school = Uuid::new_v4();
    let c = class(school, Uuid::new_v4());
    let s = submission(&c, Uuid::new_v4());

    let vp = actor(Uuid::new_v4(), Role::VicePrincipal, school);
    let elsewhere = actor(Uuid::new_v4(), Role::Principal, Uuid::new_v4());
    let admin = actor(Uuid::new_v4(), Role::SuperAdmin, school);
    assert!(may_perform(WorkflowAction::PrincipalApprove, &vp, &s, &c));
    assert!(!may_perform(WorkflowAction::PrincipalApprove, &elsewhere, &s, &c));
    assert!(!may_perform(WorkflowAction::PrincipalReject, &admin, &s, &c));
  }
}
