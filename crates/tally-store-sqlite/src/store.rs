//! [`SqliteStore`], the SQLite implementation of [`SchoolStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use tally_core::{
  attendance::{AttendanceRecord, DateRange, NewAttendanceRecord},
  grade::{GradeSubmission, SubmissionEvent, SubmissionQuery},
  school::{ClassSection, ExamCycle, NewClassSection, NewExamCycle, NewStudent, Student},
  store::SchoolStore,
};

use crate::{
  Result,
  encode::{
    EventRow, RawAttendance, RawClass, RawEvent, RawExamCycle, RawStudent, RawSubmission,
    encode_date, encode_dt, encode_entries, encode_uuid, status_str,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally school record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_attendance(
    &self,
    scope_sql: &'static str,
    scope_id: Uuid,
    range: DateRange,
  ) -> Result<Vec<AttendanceRecord>> {
    let scope_str = encode_uuid(scope_id);
    let start_str = encode_date(range.start);
    let end_str   = encode_date(range.end);

    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {cols}
           FROM attendance_records a
           JOIN students s ON s.student_id = a.student_id
           JOIN classes  c ON c.class_id   = s.class_id
           WHERE {scope_sql} = ?1
             AND a.date BETWEEN ?2 AND ?3
           ORDER BY a.date, a.recorded_at, a.record_id",
          cols = RawAttendance::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![scope_str, start_str, end_str],
            RawAttendance::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_record).collect()
  }

  async fn query_submission(
    &self,
    where_sql: &'static str,
    params: Vec<String>,
  ) -> Result<Option<GradeSubmission>> {
    let raw: Option<RawSubmission> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {cols} FROM grade_submissions g WHERE {where_sql}",
          cols = RawSubmission::COLUMNS,
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params_from_iter(params.iter()),
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubmission::into_submission).transpose()
  }
}

// ─── SchoolStore impl ────────────────────────────────────────────────────────

impl SchoolStore for SqliteStore {
  type Error = crate::Error;

  // ── Classes ───────────────────────────────────────────────────────────────

  async fn add_class(&self, input: NewClassSection) -> Result<ClassSection> {
    let class = ClassSection {
      class_id:         Uuid::new_v4(),
      school_id:        input.school_id,
      class_label:      input.class_label,
      section_label:    input.section_label,
      class_teacher_id: input.class_teacher_id,
    };

    let id_str      = encode_uuid(class.class_id);
    let school_str  = encode_uuid(class.school_id);
    let class_label = class.class_label.clone();
    let section     = class.section_label.clone();
    let teacher_str = encode_uuid(class.class_teacher_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO classes (class_id, school_id, class_label, section_label, class_teacher_id)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, school_str, class_label, section, teacher_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(class)
  }

  async fn get_class(&self, class_id: Uuid) -> Result<Option<ClassSection>> {
    let id_str = encode_uuid(class_id);

    let raw: Option<RawClass> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM classes WHERE class_id = ?1", RawClass::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawClass::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClass::into_class).transpose()
  }

  async fn list_classes(&self, school_id: Uuid) -> Result<Vec<ClassSection>> {
    let school_str = encode_uuid(school_id);

    let raws: Vec<RawClass> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM classes WHERE school_id = ?1
           ORDER BY class_label, section_label, class_id",
          RawClass::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![school_str], RawClass::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClass::into_class).collect()
  }

  // ── Students ──────────────────────────────────────────────────────────────

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    let student = Student {
      student_id:  Uuid::new_v4(),
      roll_number: input.roll_number,
      name:        input.name,
      class_id:    input.class_id,
    };

    let id_str    = encode_uuid(student.student_id);
    let class_str = encode_uuid(student.class_id);
    let roll      = student.roll_number;
    let name      = student.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, class_id, roll_number, name)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, class_str, roll, name],
        )?;
        Ok(())
      })
      .await?;

    Ok(student)
  }

  async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(student_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM students s WHERE s.student_id = ?1",
          RawStudent::COLUMNS,
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawStudent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn roster(&self, class_id: Uuid) -> Result<Vec<Student>> {
    let class_str = encode_uuid(class_id);

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM students s WHERE s.class_id = ?1
           ORDER BY s.roll_number, s.name, s.student_id",
          RawStudent::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![class_str], RawStudent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn students_in_school(&self, school_id: Uuid) -> Result<Vec<Student>> {
    let school_str = encode_uuid(school_id);

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM students s
           JOIN classes c ON c.class_id = s.class_id
           WHERE c.school_id = ?1
           ORDER BY c.class_label, c.section_label, s.roll_number, s.student_id",
          RawStudent::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![school_str], RawStudent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  // ── Exam cycles ───────────────────────────────────────────────────────────

  async fn add_exam_cycle(&self, input: NewExamCycle) -> Result<ExamCycle> {
    let cycle = ExamCycle {
      exam_cycle_id: Uuid::new_v4(),
      school_id:     input.school_id,
      label:         input.label,
      academic_year: input.academic_year,
      created_at:    Utc::now(),
    };

    let id_str     = encode_uuid(cycle.exam_cycle_id);
    let school_str = encode_uuid(cycle.school_id);
    let label      = cycle.label.clone();
    let year       = cycle.academic_year.clone();
    let at_str     = encode_dt(cycle.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO exam_cycles (exam_cycle_id, school_id, label, academic_year, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, school_str, label, year, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(cycle)
  }

  async fn get_exam_cycle(&self, exam_cycle_id: Uuid) -> Result<Option<ExamCycle>> {
    let id_str = encode_uuid(exam_cycle_id);

    let raw: Option<RawExamCycle> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT exam_cycle_id, school_id, label, academic_year, created_at
               FROM exam_cycles WHERE exam_cycle_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawExamCycle {
                  exam_cycle_id: row.get(0)?,
                  school_id:     row.get(1)?,
                  label:         row.get(2)?,
                  academic_year: row.get(3)?,
                  created_at:    row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawExamCycle::into_exam_cycle).transpose()
  }

  // ── Attendance (append-only) ──────────────────────────────────────────────

  async fn record_attendance(&self, input: NewAttendanceRecord) -> Result<AttendanceRecord> {
    let record = AttendanceRecord {
      record_id:   Uuid::new_v4(),
      student_id:  input.student_id,
      date:        input.date,
      status:      input.status,
      recorded_by: input.recorded_by,
      recorded_at: Utc::now(),
    };

    let id_str      = encode_uuid(record.record_id);
    let student_str = encode_uuid(record.student_id);
    let date_str    = encode_date(record.date);
    let status      = record.status.as_ref().to_owned();
    let by_str      = encode_uuid(record.recorded_by);
    let at_str      = encode_dt(record.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO attendance_records
             (record_id, student_id, date, status, recorded_by, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, student_str, date_str, status, by_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn class_attendance(
    &self,
    class_id: Uuid,
    range: DateRange,
  ) -> Result<Vec<AttendanceRecord>> {
    self.query_attendance("s.class_id", class_id, range).await
  }

  async fn school_attendance(
    &self,
    school_id: Uuid,
    range: DateRange,
  ) -> Result<Vec<AttendanceRecord>> {
    self.query_attendance("c.school_id", school_id, range).await
  }

  // ── Grade submissions ─────────────────────────────────────────────────────

  async fn insert_submission(
    &self,
    submission: GradeSubmission,
    created: SubmissionEvent,
  ) -> Result<()> {
    let id_str       = encode_uuid(submission.submission_id);
    let class_str    = encode_uuid(submission.class_id);
    let subject      = submission.subject;
    let cycle_str    = encode_uuid(submission.exam_cycle_id);
    let teacher_str  = encode_uuid(submission.teacher_id);
    let entries_str  = encode_entries(&submission.entries)?;
    let max_marks    = submission.max_marks;
    let status       = status_str(submission.status);
    let comment      = submission.reviewer_comment;
    let created_str  = encode_dt(submission.created_at);
    let submitted    = submission.submitted_at.map(encode_dt);
    let last_str     = encode_dt(submission.last_transition_at);
    let version      = submission.version;
    let event        = EventRow::from(&created);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO grade_submissions (
             submission_id, class_id, subject, exam_cycle_id, teacher_id,
             entries_json, max_marks, status, reviewer_comment,
             created_at, submitted_at, last_transition_at, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str,
            class_str,
            subject,
            cycle_str,
            teacher_str,
            entries_str,
            max_marks,
            status,
            comment,
            created_str,
            submitted,
            last_str,
            version,
          ],
        )?;
        event.insert(&tx)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn get_submission(&self, submission_id: Uuid) -> Result<Option<GradeSubmission>> {
    self
      .query_submission("g.submission_id = ?1", vec![encode_uuid(submission_id)])
      .await
  }

  async fn find_submission<'a>(
    &'a self,
    class_id: Uuid,
    subject: &'a str,
    exam_cycle_id: Uuid,
  ) -> Result<Option<GradeSubmission>> {
    self
      .query_submission(
        "g.class_id = ?1 AND g.subject = ?2 AND g.exam_cycle_id = ?3",
        vec![encode_uuid(class_id), subject.to_owned(), encode_uuid(exam_cycle_id)],
      )
      .await
  }

  async fn list_submissions<'a>(
    &'a self,
    query: &'a SubmissionQuery,
  ) -> Result<Vec<GradeSubmission>> {
    // Build WHERE clause dynamically; every bound value is text.
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<String> = vec![];

    if let Some(school_id) = query.school_id {
      conds.push("c.school_id = ?".into());
      params.push(encode_uuid(school_id));
    }
    if !query.class_ids.is_empty() {
      conds.push(in_list("g.class_id", query.class_ids.len()));
      params.extend(query.class_ids.iter().copied().map(encode_uuid));
    }
    if let Some(teacher_id) = query.teacher_id {
      conds.push("g.teacher_id = ?".into());
      params.push(encode_uuid(teacher_id));
    }
    if let Some(cycle_id) = query.exam_cycle_id {
      conds.push("g.exam_cycle_id = ?".into());
      params.push(encode_uuid(cycle_id));
    }
    if !query.statuses.is_empty() {
      conds.push(in_list("g.status", query.statuses.len()));
      params.extend(query.statuses.iter().map(|s| status_str(*s).to_owned()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {cols}
           FROM grade_submissions g
           JOIN classes c ON c.class_id = g.class_id
           {where_clause}
           ORDER BY g.submitted_at IS NULL, g.submitted_at, g.created_at, g.submission_id",
          cols = RawSubmission::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn compare_and_set(
    &self,
    updated: GradeSubmission,
    expected_version: u32,
    events: Vec<SubmissionEvent>,
  ) -> Result<bool> {
    let id_str      = encode_uuid(updated.submission_id);
    let entries_str = encode_entries(&updated.entries)?;
    let status      = status_str(updated.status);
    let comment     = updated.reviewer_comment;
    let submitted   = updated.submitted_at.map(encode_dt);
    let last_str    = encode_dt(updated.last_transition_at);
    let version     = updated.version;
    let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();

    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE grade_submissions
           SET entries_json = ?1, status = ?2, reviewer_comment = ?3,
               submitted_at = ?4, last_transition_at = ?5, version = ?6
           WHERE submission_id = ?7 AND version = ?8",
          rusqlite::params![
            entries_str,
            status,
            comment,
            submitted,
            last_str,
            version,
            id_str,
            expected_version,
          ],
        )?;
        if changed == 0 {
          // Dropping the transaction rolls it back; nothing was written.
          return Ok(false);
        }
        for row in &rows {
          row.insert(&tx)?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !applied {
      debug!(submission_id = %updated.submission_id, expected_version, "compare-and-set missed");
    }
    Ok(applied)
  }

  async fn submission_history(&self, submission_id: Uuid) -> Result<Vec<SubmissionEvent>> {
    let id_str = encode_uuid(submission_id);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, submission_id, from_status, to_status, actor_id, comment, at
           FROM submission_events
           WHERE submission_id = ?1
           ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawEvent {
              event_id:      row.get(0)?,
              submission_id: row.get(1)?,
              from_status:   row.get(2)?,
              to_status:     row.get(3)?,
              actor_id:      row.get(4)?,
              comment:       row.get(5)?,
              at:            row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

/// `column IN (?, ?, …)` with `n` anonymous placeholders.
fn in_list(column: &str, n: usize) -> String {
  let marks = vec!["?"; n].join(", ");
  format!("{column} IN ({marks})")
}
