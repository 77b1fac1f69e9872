//! # Drop Analysis
//!
//! Pure functions over recorded sessions. Nothing here touches storage.
//!
//! ```text
//! sessions ──► DropTotals ──► probabilities ──► forecast
//!     │
//!     └──────► per-item series ──► least-squares slope ──► trend
//! ```
//!
//! All probabilities are expressed in percent: units of an item obtained
//! per container opened, times 100. An item that comes in stacks can
//! therefore exceed 100%.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rarity::Rarity;
use crate::record::{DropSession, LootAggregate};

/// z-score of the two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Slope (percentage points per session) beyond which a trend is directional.
pub const TREND_SLOPE_THRESHOLD: f64 = 0.5;

/// Minimum sessions, overall and per item, before a trend is reported.
pub const MIN_TREND_SESSIONS: usize = 3;

// =============================================================================
// TOTALS
// =============================================================================

/// Sums over a set of sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTotals {
    /// Containers opened across all sessions.
    pub total_opened: u64,
    /// Item totals across all sessions.
    pub items: LootAggregate,
    /// Number of sessions summed.
    pub sessions: usize,
}

impl DropTotals {
    /// Sums `sessions`.
    #[must_use]
    pub fn from_sessions(sessions: &[DropSession]) -> Self {
        let mut totals = Self::default();
        for session in sessions {
            totals.total_opened = totals.total_opened.saturating_add(session.total_opened);
            totals.items.merge(&session.loot);
            totals.sessions += 1;
        }
        totals
    }

    /// Probability of every observed item, most likely first.
    ///
    /// Empty when nothing has been opened.
    #[must_use]
    pub fn probabilities(&self) -> Vec<ItemProbability> {
        if self.total_opened == 0 {
            return Vec::new();
        }
        #[allow(clippy::cast_precision_loss)]
        let opened = self.total_opened as f64;

        let mut out: Vec<ItemProbability> = self
            .items
            .iter()
            .map(|(name, count)| {
                #[allow(clippy::cast_precision_loss)]
                let rate = count as f64 / opened;
                let percent = rate * 100.0;
                ItemProbability {
                    name: name.to_string(),
                    count,
                    percent,
                    rate,
                    rarity: Rarity::from_percent(percent),
                }
            })
            .collect();

        out.sort_by(|a, b| b.percent.total_cmp(&a.percent).then_with(|| a.name.cmp(&b.name)));
        out
    }

    /// Expected yield of opening `units` more containers, per item.
    #[must_use]
    pub fn forecast(&self, units: u64) -> Vec<ItemForecast> {
        self.probabilities()
            .into_iter()
            .map(|p| ItemForecast::from_probability(&p, units))
            .collect()
    }
}

// =============================================================================
// PROBABILITY / FORECAST
// =============================================================================

/// Empirical drop probability of one item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemProbability {
    /// Item name.
    pub name: String,
    /// Units observed.
    pub count: u64,
    /// Units per container opened, in percent.
    pub percent: f64,
    /// Units per container opened.
    pub rate: f64,
    /// Tier derived from `percent`.
    pub rarity: Rarity,
}

/// Expected yield for one item over a planned number of opens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemForecast {
    /// Item name.
    pub name: String,
    /// Units per container opened, in percent.
    pub percent: f64,
    /// Expected units.
    pub expected: f64,
    /// Lower bound of the 95% interval, never below zero.
    pub low: f64,
    /// Upper bound of the 95% interval.
    pub high: f64,
}

impl ItemForecast {
    /// Normal approximation to the binomial: `n*p ± 1.96*sqrt(n*p*(1-p))`.
    ///
    /// Rates above 1 (stacked drops) have no binomial variance; their
    /// interval collapses onto the expectation.
    #[must_use]
    pub fn from_probability(probability: &ItemProbability, units: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n = units as f64;
        let p = probability.rate;
        let expected = n * p;
        let std_dev = (n * p * (1.0 - p)).max(0.0).sqrt();
        let margin = Z_95 * std_dev;

        Self {
            name: probability.name.clone(),
            percent: probability.percent,
            expected,
            low: (expected - margin).max(0.0),
            high: expected + margin,
        }
    }
}

// =============================================================================
// TRENDS
// =============================================================================

/// Direction of an item's probability over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Slope above the threshold.
    Rising,
    /// Slope below the negative threshold.
    Falling,
    /// Within the threshold.
    Stable,
}

impl TrendDirection {
    /// Classifies a slope in percentage points per session.
    #[must_use]
    pub fn from_slope(slope: f64) -> Self {
        if slope > TREND_SLOPE_THRESHOLD {
            Self::Rising
        } else if slope < -TREND_SLOPE_THRESHOLD {
            Self::Falling
        } else {
            Self::Stable
        }
    }
}

/// Trend of one item across the sessions that contain it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemTrend {
    /// Item name.
    pub name: String,
    /// Classified direction.
    pub direction: TrendDirection,
    /// Least-squares slope, percentage points per session.
    pub slope: f64,
    /// Probability in the most recent session containing the item.
    pub recent_percent: f64,
    /// Mean per-session probability.
    pub average_percent: f64,
    /// Sessions in the series.
    pub samples: usize,
}

/// Per-item trends over `sessions`.
///
/// Empty with fewer than [`MIN_TREND_SESSIONS`] sessions. An item's series
/// holds only the sessions in which it appeared; items seen in fewer than
/// [`MIN_TREND_SESSIONS`] sessions are omitted.
#[must_use]
pub fn trends(sessions: &[DropSession]) -> Vec<ItemTrend> {
    if sessions.len() < MIN_TREND_SESSIONS {
        return Vec::new();
    }

    let mut series: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for session in sessions {
        for (name, _) in session.loot.iter() {
            series
                .entry(name)
                .or_default()
                .push(session.probability_percent(name));
        }
    }

    series
        .into_iter()
        .filter(|(_, points)| points.len() >= MIN_TREND_SESSIONS)
        .map(|(name, points)| {
            let slope = least_squares_slope(&points);
            #[allow(clippy::cast_precision_loss)]
            let average = points.iter().sum::<f64>() / points.len() as f64;
            ItemTrend {
                name: name.to_string(),
                direction: TrendDirection::from_slope(slope),
                slope,
                recent_percent: points.last().copied().unwrap_or_default(),
                average_percent: average,
                samples: points.len(),
            }
        })
        .collect()
}

/// Slope of the best-fit line through `(i, points[i])`.
#[must_use]
pub fn least_squares_slope(points: &[f64]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().sum::<f64>() / n;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in points.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

// =============================================================================
// SESSION COMPARISON / BEST DROPS
// =============================================================================

/// Summary row for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unix seconds.
    pub timestamp: u64,
    /// Containers opened.
    pub opened: u64,
    /// Units obtained.
    pub total_items: u64,
    /// Distinct item names.
    pub unique_items: usize,
    /// Units per container opened.
    pub items_per_open: f64,
}

impl SessionSummary {
    /// Summarizes one session.
    #[must_use]
    pub fn of(session: &DropSession) -> Self {
        let total_items = session.loot.total_units();
        #[allow(clippy::cast_precision_loss)]
        let items_per_open = if session.total_opened == 0 {
            0.0
        } else {
            total_items as f64 / session.total_opened as f64
        };
        Self {
            timestamp: session.timestamp,
            opened: session.total_opened,
            total_items,
            unique_items: session.loot.len(),
            items_per_open,
        }
    }
}

/// How hard an item is to get.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestDrop {
    /// Item name.
    pub name: String,
    /// Units per container opened, in percent.
    pub percent: f64,
    /// Containers to open, on average, for one unit.
    pub expected_opens: u64,
    /// Tier derived from `percent`.
    pub rarity: Rarity,
}

/// Rarest observed items, or the named ones if `names` is non-empty.
///
/// Names never observed are skipped.
#[must_use]
pub fn best_drops(totals: &DropTotals, names: &[&str], limit: usize) -> Vec<BestDrop> {
    let probabilities = totals.probabilities();

    let picked: Vec<&ItemProbability> = if names.is_empty() {
        probabilities.iter().rev().take(limit).collect()
    } else {
        names
            .iter()
            .filter_map(|name| probabilities.iter().find(|p| p.name == *name))
            .collect()
    };

    picked
        .into_iter()
        .map(|p| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let expected_opens = (1.0 / p.rate).floor() as u64;
            BestDrop {
                name: p.name.clone(),
                percent: p.percent,
                expected_opens,
                rarity: p.rarity,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(opened: u64, items: &[(&str, u64)]) -> DropSession {
        DropSession {
            timestamp: 0,
            total_opened: opened,
            loot: items.iter().map(|(n, q)| (*n, *q)).collect(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_totals_sum_sessions() {
        let totals = DropTotals::from_sessions(&[
            session(10, &[("X", 3)]),
            session(10, &[("X", 7), ("Y", 1)]),
        ]);
        assert_eq!(totals.total_opened, 20);
        assert_eq!(totals.items.get("X"), 10);
        assert_eq!(totals.items.get("Y"), 1);
        assert_eq!(totals.sessions, 2);
    }

    #[test]
    fn test_probability_and_rarity() {
        let totals = DropTotals::from_sessions(&[
            session(10, &[("X", 3)]),
            session(10, &[("X", 7), ("Y", 1)]),
        ]);
        let probs = totals.probabilities();
        assert_eq!(probs[0].name, "X");
        assert!(approx(probs[0].percent, 50.0));
        assert_eq!(probs[0].rarity, Rarity::Legendary);
        assert!(approx(probs[1].percent, 5.0));
        assert_eq!(probs[1].rarity, Rarity::Uncommon);
    }

    #[test]
    fn test_probabilities_empty_when_nothing_opened() {
        let totals = DropTotals::from_sessions(&[session(0, &[])]);
        assert!(totals.probabilities().is_empty());
    }

    #[test]
    fn test_forecast_interval() {
        let totals = DropTotals::from_sessions(&[session(20, &[("X", 10)])]);
        let forecast = totals.forecast(100);
        assert_eq!(forecast.len(), 1);
        assert!(approx(forecast[0].expected, 50.0));
        assert!(approx(forecast[0].low, 40.2));
        assert!(approx(forecast[0].high, 59.8));
    }

    #[test]
    fn test_forecast_low_clamped_at_zero() {
        let totals = DropTotals::from_sessions(&[session(100, &[("Rare", 1)])]);
        let forecast = totals.forecast(10);
        assert!(forecast[0].low.abs() < f64::EPSILON);
        assert!(forecast[0].high > forecast[0].expected);
    }

    #[test]
    fn test_forecast_stacked_drop_has_no_spread() {
        let totals = DropTotals::from_sessions(&[session(10, &[("Ammo", 30)])]);
        let forecast = totals.forecast(10);
        assert!(approx(forecast[0].expected, 30.0));
        assert!(approx(forecast[0].low, 30.0));
        assert!(approx(forecast[0].high, 30.0));
    }

    #[test]
    fn test_trend_rising() {
        let sessions = vec![
            session(10, &[("X", 1)]),
            session(10, &[("X", 2)]),
            session(10, &[("X", 3)]),
        ];
        let trends = trends(&sessions);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].direction, TrendDirection::Rising);
        assert!(approx(trends[0].slope, 10.0));
        assert!(approx(trends[0].recent_percent, 30.0));
        assert!(approx(trends[0].average_percent, 20.0));
    }

    #[test]
    fn test_trend_needs_three_sessions() {
        let sessions = vec![session(10, &[("X", 1)]), session(10, &[("X", 5)])];
        assert!(trends(&sessions).is_empty());
    }

    #[test]
    fn test_trend_series_skips_absent_sessions() {
        let sessions = vec![
            session(10, &[("X", 1), ("Y", 1)]),
            session(10, &[("Y", 1)]),
            session(10, &[("X", 1), ("Y", 1)]),
            session(10, &[("Y", 1)]),
        ];
        let trends = trends(&sessions);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].name, "Y");
        assert_eq!(trends[0].direction, TrendDirection::Stable);
        assert_eq!(trends[0].samples, 4);
    }

    #[test]
    fn test_slope_of_flat_series() {
        assert!(least_squares_slope(&[5.0, 5.0, 5.0]).abs() < f64::EPSILON);
        assert!(least_squares_slope(&[1.0]).abs() < f64::EPSILON);
        assert!(approx(least_squares_slope(&[3.0, 1.0]), -2.0));
    }

    #[test]
    fn test_session_summary() {
        let summary = SessionSummary::of(&session(4, &[("A", 6), ("B", 2)]));
        assert_eq!(summary.total_items, 8);
        assert_eq!(summary.unique_items, 2);
        assert!(approx(summary.items_per_open, 2.0));
    }

    #[test]
    fn test_best_drops_rarest_first() {
        let totals = DropTotals::from_sessions(&[session(
            100,
            &[("Common", 80), ("Rare", 2), ("Mid", 10)],
        )]);
        let best = best_drops(&totals, &[], 2);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].name, "Rare");
        assert_eq!(best[0].expected_opens, 50);
        assert_eq!(best[1].name, "Mid");
        assert_eq!(best[1].expected_opens, 10);
    }

    #[test]
    fn test_best_drops_by_name() {
        let totals = DropTotals::from_sessions(&[session(10, &[("A", 5), ("B", 1)])]);
        let best = best_drops(&totals, &["B", "Unknown"], 5);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].name, "B");
        assert_eq!(best[0].expected_opens, 10);
        assert_eq!(best[0].rarity, Rarity::Rare);
    }
}
