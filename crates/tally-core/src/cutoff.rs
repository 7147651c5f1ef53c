//! Daily attendance cutoff compliance.
//!
//! A class is non-compliant for a day when nothing was marked for it, or when
//! its first mark of the day was recorded after the configured local cutoff.
//! The check is informational and never blocks marking.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  attendance::AttendanceRecord,
  school::{ClassSection, Student},
};

/// When attendance is due, in the school's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
  pub cutoff:     NaiveTime,
  pub utc_offset: FixedOffset,
}

impl CutoffPolicy {
  pub fn new(cutoff: NaiveTime, utc_offset: FixedOffset) -> Self {
    Self { cutoff, utc_offset }
  }

  /// The cutoff instant for `date`.
  pub fn deadline(&self, date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(self.cutoff);
    match self.utc_offset.from_local_datetime(&local).single() {
      Some(dt) => dt.with_timezone(&Utc),
      // A fixed offset always maps uniquely; fall back to treating it as UTC.
      None => Utc.from_utc_datetime(&local),
    }
  }

  /// The school-local calendar day containing `at`.
  pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&self.utc_offset).date_naive()
  }
}

impl Default for CutoffPolicy {
  fn default() -> Self {
    Self {
      cutoff:     NaiveTime::from_hms_opt(10, 30, 0).unwrap_or(NaiveTime::MIN),
      utc_offset: Utc.fix(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComplianceStatus {
  Compliant { first_marked_at: DateTime<Utc> },
  /// Nothing marked yet, but the cutoff has not passed.
  Pending,
  NotMarked,
  MarkedLate { first_marked_at: DateTime<Utc> },
}

impl ComplianceStatus {
  pub fn is_violation(&self) -> bool {
    matches!(self, Self::NotMarked | Self::MarkedLate { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffViolation {
  pub class:  ClassSection,
  pub status: ComplianceStatus,
}

/// Evaluate one class for `date` given every record (including superseded
/// ones) made for its students on that date.
pub fn check(
  policy: &CutoffPolicy,
  records: &[AttendanceRecord],
  date: NaiveDate,
  evaluated_at: DateTime<Utc>,
) -> ComplianceStatus {
  let deadline = policy.deadline(date);
  let first = records
    .iter()
    .filter(|r| r.date == date)
    .map(|r| r.recorded_at)
    .min();

  match first {
    Some(at) if at > deadline => ComplianceStatus::MarkedLate { first_marked_at: at },
    Some(at) => ComplianceStatus::Compliant { first_marked_at: at },
    None if evaluated_at <= deadline => ComplianceStatus::Pending,
    None => ComplianceStatus::NotMarked,
  }
}

/// Every class in `classes` that violated the cutoff on `date`, ordered by
/// class label then section label.
///
/// `students` maps records to classes; records for unknown students are
/// ignored.
pub fn violations(
  policy: &CutoffPolicy,
  classes: &[ClassSection],
  students: &[Student],
  records: &[AttendanceRecord],
  date: NaiveDate,
  evaluated_at: DateTime<Utc>,
) -> Vec<CutoffViolation> {
  let class_of: HashMap<Uuid, Uuid> =
    students.iter().map(|s| (s.student_id, s.class_id)).collect();
  let wanted: HashSet<Uuid> = classes.iter().map(|c| c.class_id).collect();

  let mut by_class: HashMap<Uuid, Vec<AttendanceRecord>> = HashMap::new();
  for r in records.iter().filter(|r| r.date == date) {
    if let Some(class_id) = class_of.get(&r.student_id)
      && wanted.contains(class_id)
    {
      by_class.entry(*class_id).or_default().push(r.clone());
    }
  }

  let mut out: Vec<CutoffViolation> = classes
    .iter()
    .filter_map(|class| {
      let recs = by_class.get(&class.class_id).map(Vec::as_slice).unwrap_or(&[]);
      let status = check(policy, recs, date, evaluated_at);
      status
        .is_violation()
        .then(|| CutoffViolation { class: class.clone(), status })
    })
    .collect();

  out.sort_by(|a, b| {
    a.class
      .class_label
      .cmp(&b.class.class_label)
      .then_with(|| a.class.section_label.cmp(&b.class.section_label))
      .then_with(|| a.class.class_id.cmp(&b.class.class_id))
  });
  out
}
