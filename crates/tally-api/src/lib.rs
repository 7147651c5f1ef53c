//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] backed by any [`tally_core::store::SchoolStore`].
//! Caller identity arrives as trusted headers (see [`identity`]); TLS and
//! authentication are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(AppState::new(store.clone())))
//! ```

pub mod attendance;
pub mod error;
pub mod identity;
pub mod registry;
pub mod reports;
pub mod submissions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use tally_core::{
  alerts::DEFAULT_MIN_STREAK,
  cutoff::CutoffPolicy,
  dashboard::Dashboard,
  identity::Actor,
  school::ClassSection,
  store::SchoolStore,
  workflow::GradeWorkflow,
};
use uuid::Uuid;

pub use error::ApiError;
pub use identity::Caller;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub policy:     CutoffPolicy,
  /// Default `min_streak` for absentee queries that do not give one.
  pub min_streak: u32,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      policy:     self.policy,
      min_streak: self.min_streak,
    }
  }
}

impl<S: SchoolStore> AppState<S> {
  /// State with the default cutoff policy and absence threshold.
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      policy: CutoffPolicy::default(),
      min_streak: DEFAULT_MIN_STREAK,
    }
  }

  pub fn workflow(&self) -> GradeWorkflow<'_, S> { GradeWorkflow::new(&*self.store) }

  pub fn dashboard(&self) -> Dashboard<'_, S> { Dashboard::new(&*self.store, self.policy) }

  async fn class(&self, class_id: Uuid) -> Result<ClassSection, ApiError> {
    self
      .store
      .get_class(class_id)
      .await
      .map_err(store_error)?
      .ok_or(ApiError::Domain(tally_core::Error::ClassNotFound(class_id)))
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SchoolStore + 'static,
{
  Router::new()
    // Registry
    .route("/classes", post(registry::create_class::<S>))
    .route("/schools/{id}/classes", get(registry::list_classes::<S>))
    .route(
      "/classes/{id}/students",
      get(registry::roster::<S>).post(registry::add_student::<S>),
    )
    .route("/exam-cycles", post(registry::create_exam_cycle::<S>))
    // Attendance
    .route("/attendance", post(attendance::record::<S>))
    .route("/classes/{id}/attendance", get(attendance::summary::<S>))
    // Reports
    .route("/schools/{id}/absentees", get(reports::absentees::<S>))
    .route("/schools/{id}/cutoff-violations", get(reports::cutoff_violations::<S>))
    .route("/schools/{id}/ranking", get(reports::ranking::<S>))
    .route("/reviews/pending", get(reports::pending_reviews::<S>))
    .route("/dashboard", get(reports::dashboard::<S>))
    // Grade submissions
    .route("/submissions", post(submissions::create::<S>))
    .route("/submissions/{id}", get(submissions::get_one::<S>))
    .route("/submissions/{id}/entries", put(submissions::save_entries::<S>))
    .route("/submissions/{id}/transitions", post(submissions::transition::<S>))
    .route("/submissions/{id}/history", get(submissions::history::<S>))
    .with_state(state)
}

// ─── Access helpers ──────────────────────────────────────────────────────────

fn store_error<E>(e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  ApiError::Domain(tally_core::Error::store(e))
}

/// Read models are tenant-scoped.
fn ensure_visible(caller: &Actor, school_id: Uuid) -> Result<(), ApiError> {
  if caller.can_view_school(school_id) {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("no access to school {school_id}")))
  }
}

#[cfg(test)]
mod tests;
