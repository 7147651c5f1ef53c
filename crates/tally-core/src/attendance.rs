//! Attendance records and per-class daily roll-ups.
//!
//! Records are append-only. Marking a student twice for the same day is a
//! correction: the record with the latest `recorded_at` wins. All functions in
//! this module are pure over the records they are given.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Records ─────────────────────────────────────────────────────────────────

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
  Present,
  Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:   Uuid,
  pub student_id:  Uuid,
  pub date:        NaiveDate,
  pub status:      AttendanceStatus,
  /// The teacher who marked the session.
  pub recorded_by: Uuid,
  /// Server-assigned; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::SchoolStore::record_attendance`].
/// `recorded_at` is always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttendanceRecord {
  pub student_id:  Uuid,
  pub date:        NaiveDate,
  pub status:      AttendanceStatus,
  pub recorded_by: Uuid,
}

/// Reduce `records` to one record per `(student_id, date)`: the latest
/// `recorded_at` wins, ties broken by `record_id`.
///
/// Output is sorted by `(student_id, date)`.
pub fn effective_records(records: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
  let mut latest: BTreeMap<(Uuid, NaiveDate), &AttendanceRecord> = BTreeMap::new();
  for r in records {
    latest
      .entry((r.student_id, r.date))
      .and_modify(|cur| {
        if (r.recorded_at, r.record_id) > (cur.recorded_at, cur.record_id) {
          *cur = r;
        }
      })
      .or_insert(r);
  }
  latest.into_values().cloned().collect()
}

// ─── Date ranges ─────────────────────────────────────────────────────────────

/// An inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  /// Build a range; an inverted pair is swapped rather than rejected.
  pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
    if a <= b {
      Self { start: a, end: b }
    } else {
      Self { start: b, end: a }
    }
  }

  pub fn single(day: NaiveDate) -> Self { Self { start: day, end: day } }

  /// The `len` days ending at (and including) `end`.
  pub fn trailing(end: NaiveDate, len: u64) -> Self {
    let start = end
      .checked_sub_days(Days::new(len.saturating_sub(1)))
      .unwrap_or(NaiveDate::MIN);
    Self { start, end }
  }

  pub fn contains(&self, day: NaiveDate) -> bool {
    self.start <= day && day <= self.end
  }

  /// The smallest range covering both `self` and `other`.
  pub fn union(&self, other: &Self) -> Self {
    Self {
      start: self.start.min(other.start),
      end:   self.end.max(other.end),
    }
  }

  pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }
}

// ─── Daily roll-up ───────────────────────────────────────────────────────────

/// One class, one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAttendance {
  pub date:       NaiveDate,
  pub present:    u32,
  pub absent:     u32,
  pub total:      u32,
  /// `round(present / total * 100)`; `0` when nothing is marked.
  pub percentage: u32,
  /// `false` means "no records yet", as opposed to 0% attendance.
  pub marked:     bool,
}

impl DailyAttendance {
  pub fn unmarked(date: NaiveDate) -> Self { Self::from_counts(date, 0, 0) }

  fn from_counts(date: NaiveDate, present: u32, absent: u32) -> Self {
    let total = present + absent;
    let percentage = if total == 0 {
      0
    } else {
      (f64::from(present) / f64::from(total) * 100.0).round() as u32
    };
    Self { date, present, absent, total, percentage, marked: total > 0 }
  }
}

/// One [`DailyAttendance`] per calendar day of `range`, in date order.
/// Days without records are included with `marked = false`.
pub fn daily_counts(records: &[AttendanceRecord], range: DateRange) -> Vec<DailyAttendance> {
  let mut counts: HashMap<NaiveDate, (u32, u32)> = HashMap::new();
  for r in effective_records(records) {
    if !range.contains(r.date) {
      continue;
    }
    let entry = counts.entry(r.date).or_default();
    match r.status {
      AttendanceStatus::Present => entry.0 += 1,
      AttendanceStatus::Absent => entry.1 += 1,
    }
  }

  range
    .days()
    .map(|day| {
      let (present, absent) = counts.get(&day).copied().unwrap_or_default();
      DailyAttendance::from_counts(day, present, absent)
    })
    .collect()
}

// ─── Rolling averages ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingAverage {
  /// Mean of daily percentages over marked days; `0.0` when `marked_days == 0`.
  pub mean:        f64,
  pub marked_days: u32,
}

/// Average the daily percentages of marked days falling inside `window`.
/// Unmarked days are left out of the denominator.
pub fn rolling_average(daily: &[DailyAttendance], window: DateRange) -> RollingAverage {
  let (sum, n) = daily
    .iter()
    .filter(|d| d.marked && window.contains(d.date))
    .fold((0u64, 0u32), |(sum, n), d| (sum + u64::from(d.percentage), n + 1));
  let mean = if n == 0 { 0.0 } else { sum as f64 / f64::from(n) };
  RollingAverage { mean, marked_days: n }
}

pub const WEEK_DAYS: u64 = 7;
pub const MONTH_DAYS: u64 = 30;
pub const YEAR_DAYS: u64 = 365;

/// Attendance read model for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
  pub class_id: Uuid,
  pub range:    DateRange,
  pub daily:    Vec<DailyAttendance>,
  /// Trailing windows ending at `range.end`.
  pub weekly:   RollingAverage,
  pub monthly:  RollingAverage,
  pub yearly:   RollingAverage,
}

/// The span of records [`summarize`] needs to see for `range`.
pub fn summary_span(range: DateRange) -> DateRange {
  range.union(&DateRange::trailing(range.end, YEAR_DAYS))
}

/// Build the summary for `class_id` over `range` from the class's records.
/// `records` should cover at least [`summary_span`] of `range`.
pub fn summarize(class_id: Uuid, records: &[AttendanceRecord], range: DateRange) -> AttendanceSummary {
  let span = summary_span(range);
  let all_days = daily_counts(records, span);

  let weekly = rolling_average(&all_days, DateRange::trailing(range.end, WEEK_DAYS));
  let monthly = rolling_average(&all_days, DateRange::trailing(range.end, MONTH_DAYS));
  let yearly = rolling_average(&all_days, DateRange::trailing(range.end, YEAR_DAYS));

  let daily = all_days.into_iter().filter(|d| range.contains(d.date)).collect();

  AttendanceSummary { class_id, range, daily, weekly, monthly, yearly }
}
