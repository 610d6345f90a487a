use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

const TIME_OF_DAY: &str = "%H:%M";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEntry {
    pub id: String,
    pub time: String,
    pub actor: String,
    pub notes: String,
    /// Data URLs, in display order.
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
    pub action: String,
    pub owner: String,
    pub priority: String,
    pub due: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonsLearned {
    pub good: String,
    pub improve: String,
}

impl LessonsLearned {
    pub fn is_empty(&self) -> bool {
        self.good.trim().is_empty() && self.improve.trim().is_empty()
    }
}

/// Branding images as data URLs. An empty string means the image is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingSet {
    pub logo: String,
    pub header: String,
    pub footer: String,
}

/// One postmortem as submitted by the editor. Every field is optional in
/// the payload and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportRecord {
    pub title: String,
    pub date: String,
    pub severity: String,
    pub owners: String,
    pub creator: String,
    pub duration: String,
    pub affected: String,
    pub summary: String,
    pub impact: String,
    pub root_cause: String,
    pub detection: String,
    pub response: String,
    pub comm: String,
    pub timeline: Vec<TimelineEntry>,
    pub actions: Vec<ActionItem>,
    pub lessons: LessonsLearned,
    pub references: String,
    pub branding: BrandingSet,
    pub lang: String,
    pub start_time: String,
    pub end_time: String,
}

impl ReportRecord {
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Elapsed time between `start_time` and `end_time`, e.g. `"1h 30m"`.
    pub fn computed_duration(&self) -> String {
        compute_duration(&self.start_time, &self.end_time)
    }
}

/// `"{h}h {m}m"` between two `HH:MM` times of day. An end before the start
/// wraps past midnight. Unparseable input gives an empty string.
pub fn compute_duration(start: &str, end: &str) -> String {
    let parse = |value: &str| NaiveTime::parse_from_str(value.trim(), TIME_OF_DAY);
    let (start, end) = match (parse(start), parse(end)) {
        (Ok(start), Ok(end)) => (start, end),
        (start, end) => {
            tracing::debug!(
                start_ok = start.is_ok(),
                end_ok = end.is_ok(),
                "duration left empty: unparseable time"
            );
            return String::new();
        }
    };
    let mut elapsed = end.signed_duration_since(start);
    if elapsed < TimeDelta::zero() {
        elapsed = elapsed + TimeDelta::days(1);
    }
    let minutes = elapsed.num_minutes();
    format!("{}h {}m", minutes / 60, minutes % 60)
}
