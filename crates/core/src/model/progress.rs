use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::LessonId;

//
// ─── PERCENT ──────────────────────────────────────────────────────────────────
//

/// A completion percentage, always within `[0, 100]`.
///
/// Servers have been seen reporting values above 100; constructing a
/// `Percent` clamps so nothing downstream can compare an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
    pub const ZERO: Percent = Percent(0.0);
    pub const FULL: Percent = Percent(100.0);

    /// Clamp a raw value into `[0, 100]`. `NaN` becomes 0.
    #[must_use]
    pub fn clamped(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::ZERO;
        }
        Self(raw.clamp(0.0, 100.0))
    }

    /// Percentage of `part` in `whole`; 0 when `whole` is not positive.
    #[must_use]
    pub fn of(part: f64, whole: f64) -> Self {
        if whole > 0.0 {
            Self::clamped(part / whole * 100.0)
        } else {
            Self::ZERO
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 >= 100.0
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(Self::clamped(raw.unwrap_or(0.0)))
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

//
// ─── COMPLETION THRESHOLD ─────────────────────────────────────────────────────
//

/// Videos at least this long complete at half-way.
pub const LONG_VIDEO_SECS: f64 = 20.0;

/// Watched share at which a lesson counts as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionThreshold {
    /// Lectures of 20 s or more: 50 %.
    Half,
    /// Short clips under 20 s: 90 %.
    NearlyAll,
}

impl CompletionThreshold {
    #[must_use]
    pub fn for_duration(duration_secs: f64) -> Self {
        if duration_secs >= LONG_VIDEO_SECS {
            Self::Half
        } else {
            Self::NearlyAll
        }
    }

    #[must_use]
    pub fn percent(self) -> Percent {
        match self {
            Self::Half => Percent(50.0),
            Self::NearlyAll => Percent(90.0),
        }
    }

    #[must_use]
    pub fn is_met(self, watched: Percent) -> bool {
        watched >= self.percent()
    }
}

//
// ─── LESSON PROGRESS ──────────────────────────────────────────────────────────
//

/// Saved progress for one viewer on one lesson.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    #[serde(default)]
    pub watched_duration: u32,
    #[serde(default)]
    pub completion_percentage: Percent,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_completed: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Body of a durable progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub lesson_id: LessonId,
    pub watched_duration: u32,
}
