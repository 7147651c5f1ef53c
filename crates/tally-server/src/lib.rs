//! Server wiring for Tally: configuration, application state and the HTTP
//! router served by the `tally-server` binary.

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use tally_api::{AppState, api_router};
use tally_core::{alerts::DEFAULT_MIN_STREAK, cutoff::CutoffPolicy, store::SchoolStore};
use thiserror::Error;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid attendance cutoff {0:?}; expected HH:MM")]
  InvalidCutoff(String),

  #[error("utc offset of {0} minutes is out of range")]
  InvalidOffset(i32),

  #[error("absence streak threshold must be at least 1")]
  InvalidStreak,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `TALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub attendance: AttendanceConfig,
}

/// School-local attendance rules.
#[derive(Debug, Deserialize, Clone)]
pub struct AttendanceConfig {
  /// Local time by which the day's register is due, `HH:MM`.
  #[serde(default = "default_cutoff")]
  pub cutoff:             String,
  /// School timezone as minutes east of UTC (IST is 330).
  #[serde(default)]
  pub utc_offset_minutes: i32,
  /// Consecutive absences that raise an alert.
  #[serde(default = "default_streak")]
  pub absence_streak:     u32,
}

impl Default for AttendanceConfig {
  fn default() -> Self {
    Self {
      cutoff:             default_cutoff(),
      utc_offset_minutes: 0,
      absence_streak:     default_streak(),
    }
  }
}

impl AttendanceConfig {
  pub fn cutoff_policy(&self) -> Result<CutoffPolicy, ConfigError> {
    let cutoff = NaiveTime::parse_from_str(self.cutoff.trim(), "%H:%M")
      .map_err(|_| ConfigError::InvalidCutoff(self.cutoff.clone()))?;
    let utc_offset = self
      .utc_offset_minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))?;
    Ok(CutoffPolicy::new(cutoff, utc_offset))
  }
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/tally/tally.db") }

fn default_cutoff() -> String { "10:30".into() }

fn default_streak() -> u32 { DEFAULT_MIN_STREAK }

// ─── Application ─────────────────────────────────────────────────────────────

/// Build the API state for `store` from validated configuration.
pub fn app_state<S>(config: &ServerConfig, store: Arc<S>) -> Result<AppState<S>, ConfigError>
where
  S: SchoolStore,
{
  if config.attendance.absence_streak == 0 {
    return Err(ConfigError::InvalidStreak);
  }
  Ok(AppState {
    policy: config.attendance.cutoff_policy()?,
    min_streak: config.attendance.absence_streak,
    ..AppState::new(store)
  })
}

/// The full HTTP surface: the JSON API under `/api`, a health check and
/// request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SchoolStore + 'static,
{
  Router::new()
    .route("/healthz", get(|| async { "ok" }))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}
