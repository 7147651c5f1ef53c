//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so they sort lexically. Calendar days are stored as
//! `YYYY-MM-DD`. Enum columns hold the snake_case strum/serde names. UUIDs are
//! stored as hyphenated lowercase strings.

use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tally_core::{
  attendance::{AttendanceRecord, AttendanceStatus},
  grade::{GradeSubmission, SubmissionEvent, SubmissionStatus},
  school::{ClassSection, ExamCycle, Student},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enum columns ────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownDiscriminant {
    column,
    value: s.to_owned(),
  })
}

pub fn decode_status(s: &str) -> Result<SubmissionStatus> { decode_enum("status", s) }

pub fn decode_attendance_status(s: &str) -> Result<AttendanceStatus> {
  decode_enum("attendance status", s)
}

// ─── Entries ─────────────────────────────────────────────────────────────────

pub fn encode_entries(entries: &BTreeMap<Uuid, f64>) -> Result<String> {
  Ok(serde_json::to_string(entries)?)
}

pub fn decode_entries(s: &str) -> Result<BTreeMap<Uuid, f64>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `classes` row.
pub struct RawClass {
  pub class_id:         String,
  pub school_id:        String,
  pub class_label:      String,
  pub section_label:    String,
  pub class_teacher_id: String,
}

impl RawClass {
  pub const COLUMNS: &'static str =
    "class_id, school_id, class_label, section_label, class_teacher_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      class_id:         row.get(0)?,
      school_id:        row.get(1)?,
      class_label:      row.get(2)?,
      section_label:    row.get(3)?,
      class_teacher_id: row.get(4)?,
    })
  }

  pub fn into_class(self) -> Result<ClassSection> {
    Ok(ClassSection {
      class_id:         decode_uuid(&self.class_id)?,
      school_id:        decode_uuid(&self.school_id)?,
      class_label:      self.class_label,
      section_label:    self.section_label,
      class_teacher_id: decode_uuid(&self.class_teacher_id)?,
    })
  }
}

/// Raw values read directly from a `students` row.
pub struct RawStudent {
  pub student_id:  String,
  pub class_id:    String,
  pub roll_number: u32,
  pub name:        String,
}

impl RawStudent {
  pub const COLUMNS: &'static str = "s.student_id, s.class_id, s.roll_number, s.name";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:  row.get(0)?,
      class_id:    row.get(1)?,
      roll_number: row.get(2)?,
      name:        row.get(3)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:  decode_uuid(&self.student_id)?,
      roll_number: self.roll_number,
      name:        self.name,
      class_id:    decode_uuid(&self.class_id)?,
    })
  }
}

/// Raw strings read directly from an `exam_cycles` row.
pub struct RawExamCycle {
  pub exam_cycle_id: String,
  pub school_id:     String,
  pub label:         String,
  pub academic_year: String,
  pub created_at:    String,
}

impl RawExamCycle {
  pub fn into_exam_cycle(self) -> Result<ExamCycle> {
    Ok(ExamCycle {
      exam_cycle_id: decode_uuid(&self.exam_cycle_id)?,
      school_id:     decode_uuid(&self.school_id)?,
      label:         self.label,
      academic_year: self.academic_year,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `attendance_records` row.
pub struct RawAttendance {
  pub record_id:   String,
  pub student_id:  String,
  pub date:        String,
  pub status:      String,
  pub recorded_by: String,
  pub recorded_at: String,
}

impl RawAttendance {
  pub const COLUMNS: &'static str =
    "a.record_id, a.student_id, a.date, a.status, a.recorded_by, a.recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      student_id:  row.get(1)?,
      date:        row.get(2)?,
      status:      row.get(3)?,
      recorded_by: row.get(4)?,
      recorded_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:   decode_uuid(&self.record_id)?,
      student_id:  decode_uuid(&self.student_id)?,
      date:        decode_date(&self.date)?,
      status:      decode_attendance_status(&self.status)?,
      recorded_by: decode_uuid(&self.recorded_by)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read directly from a `grade_submissions` row.
pub struct RawSubmission {
  pub submission_id:      String,
  pub class_id:           String,
  pub subject:            String,
  pub exam_cycle_id:      String,
  pub teacher_id:         String,
  pub entries_json:       String,
  pub max_marks:          f64,
  pub status:             String,
  pub reviewer_comment:   Option<String>,
  pub created_at:         String,
  pub submitted_at:       Option<String>,
  pub last_transition_at: String,
  pub version:            u32,
}

impl RawSubmission {
  pub const COLUMNS: &'static str = "g.submission_id, g.class_id, g.subject, \
     g.exam_cycle_id, g.teacher_id, g.entries_json, g.max_marks, g.status, \
     g.reviewer_comment, g.created_at, g.submitted_at, g.last_transition_at, \
     g.version";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id:      row.get(0)?,
      class_id:           row.get(1)?,
      subject:            row.get(2)?,
      exam_cycle_id:      row.get(3)?,
      teacher_id:         row.get(4)?,
      entries_json:       row.get(5)?,
      max_marks:          row.get(6)?,
      status:             row.get(7)?,
      reviewer_comment:   row.get(8)?,
      created_at:         row.get(9)?,
      submitted_at:       row.get(10)?,
      last_transition_at: row.get(11)?,
      version:            row.get(12)?,
    })
  }

  pub fn into_submission(self) -> Result<GradeSubmission> {
    Ok(GradeSubmission {
      submission_id:      decode_uuid(&self.submission_id)?,
      class_id:           decode_uuid(&self.class_id)?,
      subject:            self.subject,
      exam_cycle_id:      decode_uuid(&self.exam_cycle_id)?,
      teacher_id:         decode_uuid(&self.teacher_id)?,
      entries:            decode_entries(&self.entries_json)?,
      max_marks:          self.max_marks,
      status:             decode_status(&self.status)?,
      reviewer_comment:   self.reviewer_comment,
      created_at:         decode_dt(&self.created_at)?,
      submitted_at:       self.submitted_at.as_deref().map(decode_dt).transpose()?,
      last_transition_at: decode_dt(&self.last_transition_at)?,
      version:            self.version,
    })
  }
}

/// Raw strings read directly from a `submission_events` row.
pub struct RawEvent {
  pub event_id:      String,
  pub submission_id: String,
  pub from_status:   Option<String>,
  pub to_status:     String,
  pub actor_id:      String,
  pub comment:       Option<String>,
  pub at:            String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<SubmissionEvent> {
    Ok(SubmissionEvent {
      event_id:      decode_uuid(&self.event_id)?,
      submission_id: decode_uuid(&self.submission_id)?,
      from:          self.from_status.as_deref().map(decode_status).transpose()?,
      to:            decode_status(&self.to_status)?,
      actor_id:      decode_uuid(&self.actor_id)?,
      comment:       self.comment,
      at:            decode_dt(&self.at)?,
    })
  }
}

/// Column values for one `submission_events` insert, owned so they can move
/// onto the connection thread.
pub struct EventRow {
  pub event_id:      String,
  pub submission_id: String,
  pub from_status:   Option<&'static str>,
  pub to_status:     &'static str,
  pub actor_id:      String,
  pub comment:       Option<String>,
  pub at:            String,
}

impl From<&SubmissionEvent> for EventRow {
  fn from(e: &SubmissionEvent) -> Self {
    Self {
      event_id:      encode_uuid(e.event_id),
      submission_id: encode_uuid(e.submission_id),
      from_status:   e.from.map(status_str),
      to_status:     status_str(e.to),
      actor_id:      encode_uuid(e.actor_id),
      comment:       e.comment.clone(),
      at:            encode_dt(e.at),
    }
  }
}

impl EventRow {
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO submission_events
         (event_id, submission_id, from_status, to_status, actor_id, comment, at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        self.event_id,
        self.submission_id,
        self.from_status,
        self.to_status,
        self.actor_id,
        self.comment,
        self.at,
      ],
    )
  }
}

/// The stored string for a status. Matches the strum `snake_case` names.
pub fn status_str(s: SubmissionStatus) -> &'static str {
  match s {
    SubmissionStatus::Draft => "draft",
    SubmissionStatus::Submitted => "submitted",
    SubmissionStatus::UnderClassTeacherReview => "under_class_teacher_review",
    SubmissionStatus::ApprovedByClassTeacher => "approved_by_class_teacher",
    SubmissionStatus::UnderPrincipalReview => "under_principal_review",
    SubmissionStatus::Published => "published",
    SubmissionStatus::RejectedByClassTeacher => "rejected_by_class_teacher",
    SubmissionStatus::RejectedByPrincipal => "rejected_by_principal",
  }
}
