//! The `SchoolStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! The workflow engine, the dashboard assembler and `tally-api` depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, DateRange, NewAttendanceRecord},
  grade::{GradeSubmission, SubmissionEvent, SubmissionQuery, SubmissionStatus},
  school::{ClassSection, ExamCycle, NewClassSection, NewExamCycle, NewStudent, Student},
};

/// A backend error the engines can inspect.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write collided with a uniqueness rule: a second section with the
  /// same labels, or a second submission for one class, subject and cycle.
  fn is_conflict(&self) -> bool;
}

/// Abstraction over a school record store.
///
/// Attendance is append-only: a correction is a new record for the same
/// `(student, date)`. Grade submissions change only through
/// [`SchoolStore::compare_and_set`], which is the single serialisation point
/// for concurrent reviewers.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SchoolStore: Send + Sync {
  type Error: StoreError;

  // ── Classes ───────────────────────────────────────────────────────────

  fn add_class(
    &self,
    input: NewClassSection,
  ) -> impl Future<Output = Result<ClassSection, Self::Error>> + Send + '_;

  /// Returns `None` if not found.
  fn get_class(
    &self,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Option<ClassSection>, Self::Error>> + Send + '_;

  /// All sections of a school, ordered by class label then section label.
  fn list_classes(
    &self,
    school_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ClassSection>, Self::Error>> + Send + '_;

  // ── Students ──────────────────────────────────────────────────────────

  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn get_student(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  /// Students currently in `class_id`, in roll-number order.
  fn roster(
    &self,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  /// Every student of every section of `school_id`.
  fn students_in_school(
    &self,
    school_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  // ── Exam cycles ───────────────────────────────────────────────────────

  fn add_exam_cycle(
    &self,
    input: NewExamCycle,
  ) -> impl Future<Output = Result<ExamCycle, Self::Error>> + Send + '_;

  fn get_exam_cycle(
    &self,
    exam_cycle_id: Uuid,
  ) -> impl Future<Output = Result<Option<ExamCycle>, Self::Error>> + Send + '_;

  // ── Attendance (append-only) ──────────────────────────────────────────

  /// Append a record. The store assigns `record_id` and `recorded_at`.
  fn record_attendance(
    &self,
    input: NewAttendanceRecord,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  /// Every record (superseded ones included) for students of `class_id`
  /// dated within `range`.
  fn class_attendance(
    &self,
    class_id: Uuid,
    range: DateRange,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Every record (superseded ones included) for students of `school_id`
  /// dated within `range`.
  fn school_attendance(
    &self,
    school_id: Uuid,
    range: DateRange,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  // ── Grade submissions ─────────────────────────────────────────────────

  /// Persist a freshly created submission together with its creation event.
  fn insert_submission(
    &self,
    submission: GradeSubmission,
    created: SubmissionEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<Option<GradeSubmission>, Self::Error>> + Send + '_;

  /// Look a submission up by its natural key.
  fn find_submission<'a>(
    &'a self,
    class_id: Uuid,
    subject: &'a str,
    exam_cycle_id: Uuid,
  ) -> impl Future<Output = Result<Option<GradeSubmission>, Self::Error>> + Send + 'a;

  /// Submissions matching `query`, ordered by `submitted_at` (unsubmitted
  /// last), then `created_at`, then id.
  fn list_submissions<'a>(
    &'a self,
    query: &'a SubmissionQuery,
  ) -> impl Future<Output = Result<Vec<GradeSubmission>, Self::Error>> + Send + 'a;

  /// Atomically replace the stored submission with `updated` and append
  /// `events`, but only if the stored row is still at `expected_version`.
  /// `updated.version` is written as the new version.
  ///
  /// Returns `false` (and writes nothing) when any other write landed since
  /// the caller read the row, whether or not it changed the status.
  fn compare_and_set(
    &self,
    updated: GradeSubmission,
    expected_version: u32,
    events: Vec<SubmissionEvent>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Recorded status changes for a submission, oldest first.
  fn submission_history(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SubmissionEvent>, Self::Error>> + Send + '_;
}
