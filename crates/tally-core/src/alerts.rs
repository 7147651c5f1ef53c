//! Consecutive-absence detection.
//!
//! A student's streak is the number of most-recent attendance records that are
//! `absent`, counted back from `as_of` until the first `present` record. Days
//! with no record at all are not part of the sequence: they neither extend nor
//! break a streak.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, AttendanceStatus, effective_records},
  school::Student,
};

/// Streak length at which a student is flagged.
pub const DEFAULT_MIN_STREAK: u32 = 3;

/// The run of trailing absences for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streak {
  pub length:      u32,
  /// Oldest absent day in the run.
  pub since:       Option<NaiveDate>,
  /// Most recent absent day in the run.
  pub last_absent: Option<NaiveDate>,
}

/// A flagged student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenteeAlert {
  pub student:     Student,
  pub streak:      u32,
  pub since:       NaiveDate,
  pub last_absent: NaiveDate,
}

/// Compute the current streak from one student's records, ignoring anything
/// dated after `as_of`. Corrections are resolved first.
pub fn current_streak(records: &[AttendanceRecord], as_of: NaiveDate) -> Streak {
  let mut history: Vec<AttendanceRecord> = effective_records(records)
    .into_iter()
    .filter(|r| r.date <= as_of)
    .collect();
  history.sort_by(|a, b| b.date.cmp(&a.date));

  let mut streak = Streak::default();
  for r in history {
    if r.status == AttendanceStatus::Present {
      break;
    }
    streak.length += 1;
    streak.last_absent.get_or_insert(r.date);
    streak.since = Some(r.date);
  }
  streak
}

/// Flag every student in `students` whose streak as of `as_of` is at least
/// `min_streak`.
///
/// `records` may contain records for any students; those for students not in
/// `students` are ignored. Ordered by streak (longest first), then name, then
/// id.
pub fn detect(
  students: &[Student],
  records: &[AttendanceRecord],
  as_of: NaiveDate,
  min_streak: u32,
) -> Vec<AbsenteeAlert> {
  let mut by_student: HashMap<Uuid, Vec<AttendanceRecord>> = HashMap::new();
  for r in records {
    by_student.entry(r.student_id).or_default().push(r.clone());
  }

  let min_streak = min_streak.max(1);
  let mut alerts: Vec<AbsenteeAlert> = students
    .iter()
    .filter_map(|student| {
      let history = by_student.get(&student.student_id)?;
      let streak = current_streak(history, as_of);
      if streak.length < min_streak {
        return None;
      }
      Some(AbsenteeAlert {
        student:     student.clone(),
        streak:      streak.length,
        since:       streak.since?,
        last_absent: streak.last_absent?,
      })
    })
    .collect();

  alerts.sort_by(|a, b| {
    b.streak
      .cmp(&a.streak)
      .then_with(|| a.student.name.cmp(&b.student.name))
      .then_with(|| a.student.student_id.cmp(&b.student.student_id))
  });
  alerts
}
