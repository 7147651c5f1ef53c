//! Deterministic class ranking for "top N / bottom N" views.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::school::ClassSection;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RankOrder {
  Top,
  Bottom,
}

/// What a ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum RankingMetric {
  /// Daily attendance percentage on the ranking date.
  Attendance,
  /// Mean published grade percentage, optionally for one exam cycle.
  Grades { exam_cycle_id: Option<Uuid> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedClass {
  pub class:      ClassSection,
  pub percentage: f64,
}

/// Canonical ascending order: percentage, then class label, then section
/// label, then id.
fn ascending(a: &RankedClass, b: &RankedClass) -> Ordering {
  a.percentage
    .total_cmp(&b.percentage)
    .then_with(|| by_label(a, b))
}

/// Percentage descending; ties keep the ascending label order.
fn descending(a: &RankedClass, b: &RankedClass) -> Ordering {
  b.percentage
    .total_cmp(&a.percentage)
    .then_with(|| by_label(a, b))
}

fn by_label(a: &RankedClass, b: &RankedClass) -> Ordering {
  a.class
    .class_label
    .cmp(&b.class.class_label)
    .then_with(|| a.class.section_label.cmp(&b.class.section_label))
    .then_with(|| a.class.class_id.cmp(&b.class.class_id))
}

/// Sort `entries` for `order` and keep the first `n`. The result does not
/// depend on input order.
///
/// Bottom-N is always "sort ascending, take N".
pub fn rank(mut entries: Vec<RankedClass>, order: RankOrder, n: usize) -> Vec<RankedClass> {
  match order {
    RankOrder::Top => entries.sort_by(descending),
    RankOrder::Bottom => entries.sort_by(ascending),
  }
  entries.truncate(n);
  entries
}
