//! Router tests driving the full API against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tally_core::{
  identity::{Actor, Role},
  school::{ClassSection, NewClassSection, NewExamCycle, NewStudent, Student},
  store::SchoolStore,
};
use tally_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  AppState, api_router,
  identity::{ASSIGNED_CLASSES, CLASS_TEACHER_FOR, ROLE, SCHOOL_ID, USER_ID},
};

struct Fixture {
  app:       Router,
  store:     Arc<SqliteStore>,
  school_id: Uuid,
  class:     ClassSection,
  students:  Vec<Student>,
  cycle_id:  Uuid,
  teacher:   Actor,
  ct:        Actor,
  principal: Actor,
}

fn actor(role: Role, school_id: Uuid) -> Actor {
  Actor {
    user_id: Uuid::new_v4(),
    role,
    school_id,
    class_teacher_for: None,
    assigned_classes: vec![],
  }
}

impl Fixture {
  async fn new(n_students: u32) -> Self {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let school_id = Uuid::new_v4();

    let mut ct = actor(Role::ClassTeacher, school_id);
    let class = store
      .add_class(NewClassSection {
        school_id,
        class_label: "10".into(),
        section_label: "A".into(),
        class_teacher_id: ct.user_id,
      })
      .await
      .unwrap();
    ct.class_teacher_for = Some(class.class_id);

    let mut teacher = actor(Role::SubjectTeacher, school_id);
    teacher.assigned_classes = vec![class.class_id];

    let mut students = Vec::new();
    for roll in 1..=n_students {
      students.push(
        store
          .add_student(NewStudent {
            roll_number: roll,
            name: format!("Student {roll}"),
            class_id: class.class_id,
          })
          .await
          .unwrap(),
      );
    }

    let cycle_id = store
      .add_exam_cycle(NewExamCycle {
        school_id,
        label: "Mid-Term 2025".into(),
        academic_year: "2025-26".into(),
      })
      .await
      .unwrap()
      .exam_cycle_id;

    Self {
      app: api_router(AppState::new(Arc::clone(&store))),
      store,
      school_id,
      class,
      students,
      cycle_id,
      teacher,
      ct,
      principal: actor(Role::Principal, school_id),
    }
  }

  async fn call(
    &self,
    method: &str,
    uri: &str,
    as_actor: Option<&Actor>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(a) = as_actor {
      req = req
        .header(USER_ID, a.user_id.to_string())
        .header(ROLE, a.role.as_ref())
        .header(SCHOOL_ID, a.school_id.to_string());
      if let Some(class_id) = a.class_teacher_for {
        req = req.header(CLASS_TEACHER_FOR, class_id.to_string());
      }
      if !a.assigned_classes.is_empty() {
        let list: Vec<String> = a.assigned_classes.iter().map(Uuid::to_string).collect();
        req = req.header(ASSIGNED_CLASSES, list.join(","));
      }
    }
    let req = match body {
      Some(b) => req
        .header("content-type", "application/json")
        .body(Body::from(b.to_string()))
        .unwrap(),
      None => req.body(Body::empty()).unwrap(),
    };

    let resp = self.app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
      .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
  }

  fn all_marks(&self) -> Value {
    let entries: serde_json::Map<String, Value> = self
      .students
      .iter()
      .map(|s| (s.student_id.to_string(), json!(75.0)))
      .collect();
    Value::Object(entries)
  }

  async fn create_draft(&self, subject: &str) -> String {
    let (status, body) = self
      .call(
        "POST",
        "/submissions",
        Some(&self.teacher),
        Some(json!({
          "class_id": self.class.class_id,
          "subject": subject,
          "exam_cycle_id": self.cycle_id,
          "max_marks": 100.0,
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "draft");
    body["submission_id"].as_str().unwrap().to_owned()
  }

  async fn act(&self, id: &str, who: &Actor, body: Value) -> (StatusCode, Value) {
    self
      .call("POST", &format!("/submissions/{id}/transitions"), Some(who), Some(body))
      .await
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_identity_is_forbidden() {
  let f = Fixture::new(1).await;
  let (status, body) = f.call("GET", "/reviews/pending", None, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn other_school_is_forbidden() {
  let f = Fixture::new(1).await;
  let outsider = actor(Role::Principal, Uuid::new_v4());
  let uri = format!(
    "/classes/{}/attendance?from=2025-01-06&to=2025-01-10",
    f.class.class_id
  );
  let (status, _) = f.call("GET", &uri, Some(&outsider), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── Grade workflow ──────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_walks_to_published() {
  let f = Fixture::new(30).await;
  let id = f.create_draft("Mathematics").await;

  let (status, body) = f
    .call(
      "PUT",
      &format!("/submissions/{id}/entries"),
      Some(&f.teacher),
      Some(json!({ "entries": f.all_marks(), "expected_status": "draft" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");

  let (status, body) = f.act(&id, &f.teacher, json!({ "action": "submit" })).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["status"], "under_class_teacher_review");

  let (status, body) = f
    .act(&id, &f.ct, json!({ "action": "class_teacher_approve" }))
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["status"], "under_principal_review");

  let (_, queue) = f.call("GET", "/reviews/pending", Some(&f.principal), None).await;
  assert_eq!(queue.as_array().unwrap().len(), 1);

  let (status, body) = f
    .act(&id, &f.principal, json!({ "action": "principal_approve" }))
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["status"], "published");

  let (status, body) = f
    .act(&id, &f.principal, json!({ "action": "principal_approve" }))
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["code"], "invalid_transition");

  let (status, history) = f
    .call("GET", &format!("/submissions/{id}/history"), Some(&f.ct), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(history.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn incomplete_submit_lists_missing_students() {
  let f = Fixture::new(3).await;
  let id = f.create_draft("Science").await;

  let (status, body) = f.act(&id, &f.teacher, json!({ "action": "submit" })).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["code"], "incomplete_submission");
  assert_eq!(body["missing"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn reject_needs_reason_and_stale_views_conflict() {
  let f = Fixture::new(2).await;
  let id = f.create_draft("History").await;
  f.call(
    "PUT",
    &format!("/submissions/{id}/entries"),
    Some(&f.teacher),
    Some(json!({ "entries": f.all_marks() })),
  )
  .await;
  f.act(&id, &f.teacher, json!({ "action": "submit" })).await;

  let (status, body) = f
    .act(&id, &f.ct, json!({ "action": "class_teacher_reject", "comment": "  " }))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "missing_reason");

  let (status, _) = f
    .act(&id, &f.ct, json!({
      "action": "class_teacher_reject",
      "comment": "marks for roll 2 look wrong",
      "expected_status": "under_class_teacher_review",
    }))
    .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = f
    .act(&id, &f.ct, json!({
      "action": "class_teacher_approve",
      "expected_status": "under_class_teacher_review",
    }))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], "stale_state");
  assert_eq!(body["actual"], "rejected_by_class_teacher");
}

#[tokio::test]
async fn subject_teacher_cannot_approve() {
  let f = Fixture::new(1).await;
  let id = f.create_draft("Art").await;
  f.call(
    "PUT",
    &format!("/submissions/{id}/entries"),
    Some(&f.teacher),
    Some(json!({ "entries": f.all_marks() })),
  )
  .await;
  f.act(&id, &f.teacher, json!({ "action": "submit" })).await;

  let (status, body) = f
    .act(&id, &f.teacher, json!({ "action": "class_teacher_approve" }))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["code"], "unauthorized_transition");
}

#[tokio::test]
async fn duplicate_draft_conflicts() {
  let f = Fixture::new(1).await;
  f.create_draft("Music").await;
  let (status, body) = f
    .call(
      "POST",
      "/submissions",
      Some(&f.teacher),
      Some(json!({
        "class_id": f.class.class_id,
        "subject": "Music",
        "exam_cycle_id": f.cycle_id,
        "max_marks": 50.0,
      })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], "duplicate_submission");
}

// ─── Attendance & reports ────────────────────────────────────────────────────

#[tokio::test]
async fn marking_feeds_summary_and_absentees() {
  let f = Fixture::new(2).await;
  let absent = f.students[0].student_id;
  let present = f.students[1].student_id;

  for d in ["2025-01-06", "2025-01-07", "2025-01-08"] {
    for (student, status) in [(absent, "absent"), (present, "present")] {
      let (code, body) = f
        .call(
          "POST",
          "/attendance",
          Some(&f.ct),
          Some(json!({ "student_id": student, "date": d, "status": status })),
        )
        .await;
      assert_eq!(code, StatusCode::CREATED, "{body}");
    }
  }

  let uri = format!(
    "/classes/{}/attendance?from=2025-01-06&to=2025-01-08",
    f.class.class_id
  );
  let (status, summary) = f.call("GET", &uri, Some(&f.principal), None).await;
  assert_eq!(status, StatusCode::OK);
  let daily = summary["daily"].as_array().unwrap();
  assert_eq!(daily.len(), 3);
  assert!(daily.iter().all(|d| d["percentage"] == 50));

  let uri = format!("/schools/{}/absentees?as_of=2025-01-08", f.school_id);
  let (status, alerts) = f.call("GET", &uri, Some(&f.principal), None).await;
  assert_eq!(status, StatusCode::OK);
  let alerts = alerts.as_array().unwrap();
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0]["streak"], 3);
  assert_eq!(alerts[0]["student"]["student_id"], absent.to_string());
}

#[tokio::test]
async fn parents_cannot_mark_attendance() {
  let f = Fixture::new(1).await;
  let parent = actor(Role::Parent, f.school_id);
  let (status, _) = f
    .call(
      "POST",
      "/attendance",
      Some(&parent),
      Some(json!({
        "student_id": f.students[0].student_id,
        "date": "2025-01-06",
        "status": "present",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ranking_rejects_unknown_metric() {
  let f = Fixture::new(1).await;
  let uri = format!("/schools/{}/ranking?metric=bus_routes", f.school_id);
  let (status, _) = f.call("GET", &uri, Some(&f.principal), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let uri = format!(
    "/schools/{}/ranking?metric=attendance&date=2025-01-06&order=bottom&n=3",
    f.school_id
  );
  let (status, ranked) = f.call("GET", &uri, Some(&f.principal), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(ranked.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_view_follows_role() {
  let f = Fixture::new(1).await;

  let (status, view) = f
    .call("GET", "/dashboard?date=2025-01-06", Some(&f.principal), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["view"], "school");

  let (_, view) = f
    .call("GET", "/dashboard?date=2025-01-06", Some(&f.ct), None)
    .await;
  assert_eq!(view["view"], "class");

  let (_, view) = f
    .call("GET", "/dashboard?date=2025-01-06", Some(&f.teacher), None)
    .await;
  assert_eq!(view["view"], "teacher");
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_leaders_edit_the_registry() {
  let f = Fixture::new(0).await;
  let body = json!({
    "school_id": f.school_id,
    "class_label": "9",
    "section_label": "B",
    "class_teacher_id": Uuid::new_v4(),
  });

  let (status, _) = f.call("POST", "/classes", Some(&f.teacher), Some(body.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, created) = f.call("POST", "/classes", Some(&f.principal), Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  let class_id = created["class_id"].as_str().unwrap().to_owned();

  let (status, _) = f
    .call(
      "POST",
      &format!("/classes/{class_id}/students"),
      Some(&f.principal),
      Some(json!({ "roll_number": 1, "name": "Asha" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, classes) = f
    .call("GET", &format!("/schools/{}/classes", f.school_id), Some(&f.teacher), None)
    .await;
  assert_eq!(classes.as_array().unwrap().len(), 2);
  assert_eq!(f.store.roster(class_id.parse().unwrap()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn registering_a_taken_section_is_a_conflict() {
  let f = Fixture::new(0).await;
  let body = json!({
    "school_id": f.school_id,
    "class_label": "10",
    "section_label": "A",
    "class_teacher_id": Uuid::new_v4(),
  });

  let (status, err) = f.call("POST", "/classes", Some(&f.principal), Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT, "{err}");
  assert_eq!(err["code"], "duplicate_class");
  assert!(!err["error"].as_str().unwrap().contains("constraint"));
}
