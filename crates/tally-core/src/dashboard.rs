//! Read models for role-specific dashboards.
//!
//! Every function here is a fresh, request-scoped pass over the store. Nothing
//! is cached and nothing reads the wall clock: the evaluation date is always a
//! parameter. Missing data yields empty or zero results, not errors.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  alerts::{self, AbsenteeAlert},
  attendance::{
    self, AttendanceSummary, DailyAttendance, DateRange, RollingAverage, WEEK_DAYS,
  },
  cutoff::{self, CutoffPolicy, CutoffViolation},
  grade::{GradeSubmission, SubmissionQuery, SubmissionStatus},
  identity::{Actor, Role},
  ranking::{self, RankOrder, RankedClass, RankingMetric},
  school::ClassSection,
  store::SchoolStore,
};

/// How far back streak detection looks.
pub const STREAK_LOOKBACK_DAYS: u64 = attendance::YEAR_DAYS;

/// Size of the top/bottom lists on the school overview.
pub const OVERVIEW_RANK_SIZE: usize = 3;

// ─── Role views ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolOverview {
  pub school_id:         Uuid,
  pub date:              NaiveDate,
  pub top_attendance:    Vec<RankedClass>,
  pub bottom_attendance: Vec<RankedClass>,
  pub cutoff_violations: Vec<CutoffViolation>,
  pub absentees:         Vec<AbsenteeAlert>,
  pub pending_reviews:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOverview {
  pub class:           ClassSection,
  pub today:           DailyAttendance,
  pub weekly:          RollingAverage,
  pub absentees:       Vec<AbsenteeAlert>,
  pub pending_reviews: Vec<GradeSubmission>,
}

/// A subject teacher's own submissions, grouped by where they stand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherOverview {
  pub drafts:    Vec<GradeSubmission>,
  pub in_review: Vec<GradeSubmission>,
  /// Rejected and waiting on the author.
  pub returned:  Vec<GradeSubmission>,
  pub published: Vec<GradeSubmission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
  School(SchoolOverview),
  Class(ClassOverview),
  Teacher(TeacherOverview),
  /// The role has no academic dashboard.
  Unavailable,
}

// ─── Assembler ───────────────────────────────────────────────────────────────

pub struct Dashboard<'a, S> {
  store:  &'a S,
  policy: CutoffPolicy,
}

impl<'a, S: SchoolStore> Dashboard<'a, S> {
  pub fn new(store: &'a S, policy: CutoffPolicy) -> Self { Self { store, policy } }

  /// Daily roll-up for `range` plus weekly, monthly and yearly averages
  /// ending at `range.end`.
  pub async fn attendance_summary(
    &self,
    class_id: Uuid,
    range: DateRange,
  ) -> Result<AttendanceSummary> {
    self.class(class_id).await?;
    let records = self
      .store
      .class_attendance(class_id, attendance::summary_span(range))
      .await
      .map_err(Error::store)?;
    Ok(attendance::summarize(class_id, &records, range))
  }

  /// Students whose trailing absence streak as of `as_of` is at least
  /// `min_streak`.
  pub async fn consecutive_absentees(
    &self,
    school_id: Uuid,
    as_of: NaiveDate,
    min_streak: u32,
  ) -> Result<Vec<AbsenteeAlert>> {
    let students = self
      .store
      .students_in_school(school_id)
      .await
      .map_err(Error::store)?;
    let records = self
      .store
      .school_attendance(school_id, DateRange::trailing(as_of, STREAK_LOOKBACK_DAYS))
      .await
      .map_err(Error::store)?;
    Ok(alerts::detect(&students, &records, as_of, min_streak))
  }

  /// Sections that missed the attendance cutoff on `date`.
  pub async fn cutoff_violations(
    &self,
    school_id: Uuid,
    date: NaiveDate,
    evaluated_at: DateTime<Utc>,
  ) -> Result<Vec<CutoffViolation>> {
    let classes = self.store.list_classes(school_id).await.map_err(Error::store)?;
    let students = self
      .store
      .students_in_school(school_id)
      .await
      .map_err(Error::store)?;
    let records = self
      .store
      .school_attendance(school_id, DateRange::single(date))
      .await
      .map_err(Error::store)?;
    Ok(cutoff::violations(
      &self.policy,
      &classes,
      &students,
      &records,
      date,
      evaluated_at,
    ))
  }

  /// Rank the school's sections by `metric`. Sections with no data for the
  /// metric are left out.
  pub async fn class_ranking(
    &self,
    school_id: Uuid,
    metric: RankingMetric,
    date: NaiveDate,
    order: RankOrder,
    n: usize,
  ) -> Result<Vec<RankedClass>> {
    let entries = match metric {
      RankingMetric::Attendance => self.attendance_percentages(school_id, date).await?,
      RankingMetric::Grades { exam_cycle_id } => {
        self.grade_percentages(school_id, exam_cycle_id).await?
      }
    };
    Ok(ranking::rank(entries, order, n))
  }

  /// The caller's review queue, oldest submission first.
  pub async fn pending_reviews(&self, actor: &Actor) -> Result<Vec<GradeSubmission>> {
    let query = match actor.role {
      Role::ClassTeacher => {
        let led: Vec<Uuid> = self
          .store
          .list_classes(actor.school_id)
          .await
          .map_err(Error::store)?
          .into_iter()
          .filter(|c| actor.leads_class(c))
          .map(|c| c.class_id)
          .collect();
        if led.is_empty() {
          return Ok(Vec::new());
        }
        SubmissionQuery {
          school_id: Some(actor.school_id),
          class_ids: led,
          statuses: vec![SubmissionStatus::UnderClassTeacherReview],
          ..Default::default()
        }
      }
      Role::Principal | Role::VicePrincipal => SubmissionQuery {
        school_id: Some(actor.school_id),
        statuses: vec![SubmissionStatus::UnderPrincipalReview],
        ..Default::default()
      },
      _ => return Ok(Vec::new()),
    };

    let mut queue = self
      .store
      .list_submissions(&query)
      .await
      .map_err(Error::store)?;
    queue.sort_by(|a, b| {
      a.submitted_at
        .cmp(&b.submitted_at)
        .then_with(|| a.submission_id.cmp(&b.submission_id))
    });
    Ok(queue)
  }

  /// The dashboard for `actor`'s role as of `date`.
  pub async fn overview(
    &self,
    actor: &Actor,
    date: NaiveDate,
    evaluated_at: DateTime<Utc>,
  ) -> Result<DashboardView> {
    match actor.role {
      Role::Principal | Role::VicePrincipal => {
        let school_id = actor.school_id;
        let attendance = self.attendance_percentages(school_id, date).await?;
        Ok(DashboardView::School(SchoolOverview {
          school_id,
          date,
          top_attendance: ranking::rank(
            attendance.clone(),
            RankOrder::Top,
            OVERVIEW_RANK_SIZE,
          ),
          bottom_attendance: ranking::rank(
            attendance,
            RankOrder::Bottom,
            OVERVIEW_RANK_SIZE,
          ),
          cutoff_violations: self
            .cutoff_violations(school_id, date, evaluated_at)
            .await?,
          absentees: self
            .consecutive_absentees(school_id, date, alerts::DEFAULT_MIN_STREAK)
            .await?,
          pending_reviews: self.pending_reviews(actor).await?.len(),
        }))
      }
      Role::ClassTeacher => {
        let classes = self
          .store
          .list_classes(actor.school_id)
          .await
          .map_err(Error::store)?;
        let Some(class) = classes
          .into_iter()
          .filter(|c| actor.leads_class(c))
          .min_by_key(|c| actor.class_teacher_for != Some(c.class_id))
        else {
          return Ok(DashboardView::Unavailable);
        };
        self.class_overview(actor, class, date).await.map(DashboardView::Class)
      }
      Role::SubjectTeacher => {
        let mine = self
          .store
          .list_submissions(&SubmissionQuery {
            school_id: Some(actor.school_id),
            teacher_id: Some(actor.user_id),
            ..Default::default()
          })
          .await
          .map_err(Error::store)?;
        let mut view = TeacherOverview::default();
        for s in mine {
          match s.status {
            SubmissionStatus::Draft => view.drafts.push(s),
            SubmissionStatus::RejectedByClassTeacher
            | SubmissionStatus::RejectedByPrincipal => view.returned.push(s),
            SubmissionStatus::Published => view.published.push(s),
            _ => view.in_review.push(s),
          }
        }
        Ok(DashboardView::Teacher(view))
      }
      Role::SuperAdmin | Role::FleetManager | Role::Parent => {
        Ok(DashboardView::Unavailable)
      }
    }
  }

  // ── Internals ─────────────────────────────────────────────────────────

  async fn class(&self, class_id: Uuid) -> Result<ClassSection> {
    self
      .store
      .get_class(class_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ClassNotFound(class_id))
  }

  async fn class_overview(
    &self,
    actor: &Actor,
    class: ClassSection,
    date: NaiveDate,
  ) -> Result<ClassOverview> {
    let roster = self.store.roster(class.class_id).await.map_err(Error::store)?;
    let records = self
      .store
      .class_attendance(
        class.class_id,
        DateRange::trailing(date, STREAK_LOOKBACK_DAYS),
      )
      .await
      .map_err(Error::store)?;

    let week = DateRange::trailing(date, WEEK_DAYS);
    let daily = attendance::daily_counts(&records, week);
    let weekly = attendance::rolling_average(&daily, week);
    let today = daily
      .last()
      .filter(|d| d.date == date)
      .cloned()
      .unwrap_or_else(|| DailyAttendance::unmarked(date));

    let class_id = class.class_id;
    let pending_reviews = self
      .pending_reviews(actor)
      .await?
      .into_iter()
      .filter(|s| s.class_id == class_id)
      .collect();

    Ok(ClassOverview {
      class,
      today,
      weekly,
      absentees: alerts::detect(&roster, &records, date, alerts::DEFAULT_MIN_STREAK),
      pending_reviews,
    })
  }

  /// One entry per section with attendance marked on `date`.
  async fn attendance_percentages(
    &self,
    school_id: Uuid,
    date: NaiveDate,
  ) -> Result<Vec<RankedClass>> {
    let classes = self.store.list_classes(school_id).await.map_err(Error::store)?;
    let students = self
      .store
      .students_in_school(school_id)
      .await
      .map_err(Error::store)?;
    let records = self
      .store
      .school_attendance(school_id, DateRange::single(date))
      .await
      .map_err(Error::store)?;

    let class_of: HashMap<Uuid, Uuid> =
      students.iter().map(|s| (s.student_id, s.class_id)).collect();
    let mut by_class: HashMap<Uuid, Vec<_>> = HashMap::new();
    for r in records {
      if let Some(class_id) = class_of.get(&r.student_id) {
        by_class.entry(*class_id).or_default().push(r);
      }
    }

    Ok(
      classes
        .into_iter()
        .filter_map(|class| {
          let recs = by_class.get(&class.class_id)?;
          let day = attendance::daily_counts(recs, DateRange::single(date))
            .into_iter()
            .next()?;
          day.marked.then(|| RankedClass {
            class,
            percentage: f64::from(day.percentage),
          })
        })
        .collect(),
    )
  }

  /// One entry per section with at least one published mark.
  async fn grade_percentages(
    &self,
    school_id: Uuid,
    exam_cycle_id: Option<Uuid>,
  ) -> Result<Vec<RankedClass>> {
    let classes = self.store.list_classes(school_id).await.map_err(Error::store)?;
    let published = self
      .store
      .list_submissions(&SubmissionQuery {
        school_id: Some(school_id),
        exam_cycle_id,
        statuses: vec![SubmissionStatus::Published],
        ..Default::default()
      })
      .await
      .map_err(Error::store)?;

    let mut sums: HashMap<Uuid, (f64, u32)> = HashMap::new();
    for s in &published {
      let acc = sums.entry(s.class_id).or_default();
      for pct in s.percentages() {
        acc.0 += pct;
        acc.1 += 1;
      }
    }

    Ok(
      classes
        .into_iter()
        .filter_map(|class| {
          let (sum, n) = sums.get(&class.class_id).copied()?;
          (n > 0).then(|| RankedClass { class, percentage: sum / f64::from(n) })
        })
        .collect(),
    )
  }
}
