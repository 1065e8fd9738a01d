//! Coverage and recency scoring for suggested workflows.
//!
//! Recency is an exponentially decayed event intensity (a Hawkes-style
//! kernel) squashed through a logistic, so a burst of recent activity scores
//! close to the cap while a stale cluster sits at the floor.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tether_core::Trace;

pub const DEFAULT_HALF_LIFE_SECS: i64 = 30 * 60;
pub const DEFAULT_HORIZON_SECS: i64 = 6 * 60 * 60;
pub const DEFAULT_SCORE_FLOOR: f64 = 0.1;
pub const DEFAULT_SCORE_CAP: f64 = 1.0;

/// Event count observed in one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub count: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct IntensityScorer {
    pub half_life: Duration,
    /// Lower bound of both scores.
    pub floor: f64,
    /// Upper bound of both scores.
    pub cap: f64,
    /// Points older than this, relative to the newest point, are ignored.
    pub observation_horizon: Duration,
}

impl Default for IntensityScorer {
    fn default() -> Self {
        Self {
            half_life: Duration::seconds(DEFAULT_HALF_LIFE_SECS),
            floor: DEFAULT_SCORE_FLOOR,
            cap: DEFAULT_SCORE_CAP,
            observation_horizon: Duration::seconds(DEFAULT_HORIZON_SECS),
        }
    }
}

impl IntensityScorer {
    /// Scorer whose half-life is one session window and whose horizon spans
    /// twelve of them.
    pub fn for_window(window: Duration) -> Self {
        Self {
            half_life: window,
            observation_horizon: window * 12,
            ..Self::default()
        }
    }

    /// Non-positive settings fall back to the defaults.
    fn effective(&self) -> Self {
        let defaults = Self::default();
        Self {
            half_life: if self.half_life > Duration::zero() { self.half_life } else { defaults.half_life },
            floor: if self.floor > 0.0 { self.floor } else { defaults.floor },
            cap: if self.cap > 0.0 { self.cap } else { defaults.cap },
            observation_horizon: if self.observation_horizon > Duration::zero() {
                self.observation_horizon
            } else {
                defaults.observation_horizon
            },
        }
    }

    /// Returns `(coverage, recency)`.
    ///
    /// Coverage is `coverage / population` clamped to `[floor, cap]` (a
    /// population of zero counts as one). Recency is the logistic of the
    /// decayed intensity at the newest point, also clamped; an empty series
    /// scores the floor.
    pub fn score(&self, series: &[TimeSeriesPoint], coverage: usize, population: usize) -> (f64, f64) {
        let s = self.effective();
        let population = population.max(1) as f64;
        let coverage_score = (coverage as f64 / population).min(s.cap).max(s.floor);

        let Some(end) = series.iter().map(|p| p.timestamp).max() else {
            return (coverage_score, s.floor);
        };
        let horizon_start = end - s.observation_horizon;
        let decay = std::f64::consts::LN_2 / seconds(s.half_life);

        let intensity: f64 = series
            .iter()
            .filter(|p| p.timestamp >= horizon_start)
            .map(|p| p.count * (-decay * seconds(end - p.timestamp)).exp())
            .sum();

        let recency_score = (1.0 / (1.0 + (-intensity).exp())).max(s.floor).min(s.cap);
        (coverage_score, recency_score)
    }
}

fn seconds(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

/// Mean of the two scores, clamped to `[0.1, 1.0]`.
pub fn confidence(coverage: f64, recency: f64) -> f64 {
    ((coverage + recency) / 2.0).clamp(DEFAULT_SCORE_FLOOR, DEFAULT_SCORE_CAP)
}

/// Per-bucket event counts for `traces`, oldest bucket first.
///
/// Buckets are `window` wide and aligned to the Unix epoch. Untimed events
/// are skipped. A non-positive window means one minute.
pub fn build_time_series<'a>(traces: impl IntoIterator<Item = &'a Trace>, window: Duration) -> Vec<TimeSeriesPoint> {
    let width = if window > Duration::zero() { window.num_seconds().max(1) } else { 60 };

    let mut buckets: BTreeMap<i64, f64> = BTreeMap::new();
    for ts in traces
        .into_iter()
        .flat_map(|t| t.events.iter())
        .filter_map(|e| e.timestamp)
    {
        let secs = ts.timestamp();
        *buckets.entry(secs - secs.rem_euclid(width)).or_default() += 1.0;
    }

    buckets
        .into_iter()
        .filter_map(|(start, count)| {
            DateTime::from_timestamp(start, 0).map(|timestamp| TimeSeriesPoint { timestamp, count })
        })
        .collect()
}
