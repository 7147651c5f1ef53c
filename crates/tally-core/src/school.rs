//! School reference data: class sections, students and exam cycles.
//!
//! These records are owned by external CRUD surfaces; the engines in this
//! crate only read them to group attendance and scope grade submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Class sections ──────────────────────────────────────────────────────────

/// One class + section pair (e.g. class `10`, section `A`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSection {
  pub class_id:         Uuid,
  pub school_id:        Uuid,
  pub class_label:      String,
  pub section_label:    String,
  /// The teacher who reviews grade submissions for this section.
  pub class_teacher_id: Uuid,
}

impl ClassSection {
  /// `class_label` followed by `section_label`, e.g. `10A`.
  pub fn display_label(&self) -> String {
    format!("{}{}", self.class_label, self.section_label)
  }
}

/// Input to [`crate::store::SchoolStore::add_class`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassSection {
  pub school_id:        Uuid,
  pub class_label:      String,
  pub section_label:    String,
  pub class_teacher_id: Uuid,
}

// ─── Students ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:  Uuid,
  pub roll_number: u32,
  pub name:        String,
  pub class_id:    Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
  pub roll_number: u32,
  pub name:        String,
  pub class_id:    Uuid,
}

// ─── Exam cycles ─────────────────────────────────────────────────────────────

/// A named grading period, e.g. "Mid-Term 2025".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamCycle {
  pub exam_cycle_id: Uuid,
  pub school_id:     Uuid,
  pub label:         String,
  pub academic_year: String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExamCycle {
  pub school_id:     Uuid,
  pub label:         String,
  pub academic_year: String,
}
