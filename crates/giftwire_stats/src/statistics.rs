//! # Drop Statistics Engine
//!
//! Records resolution runs into a [`DropLog`] and answers questions about
//! the accumulated history.

use std::ops::RangeBounds;

use crate::analysis::{self, BestDrop, DropTotals, ItemForecast, ItemProbability, ItemTrend, SessionSummary};
use crate::drop_log::DropLog;
use crate::error::StatsResult;
use crate::export::{self, StatsExport};
use crate::record::{unix_now, DropSession, LootAggregate};

/// Sessions shown by [`DropStatistics::compare_sessions`] by default.
pub const DEFAULT_COMPARE_WINDOW: usize = 5;

/// Items reported by [`DropStatistics::best_drops`] when no names are given.
pub const DEFAULT_BEST_DROPS: usize = 5;

/// Statistics over a drop log.
pub struct DropStatistics<L: DropLog> {
    log: L,
}

impl<L: DropLog> DropStatistics<L> {
    /// Wraps a log.
    #[must_use]
    pub const fn new(log: L) -> Self {
        Self { log }
    }

    /// The underlying log.
    #[must_use]
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Records a run, stamped now.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn record(&self, total_opened: u64, loot: LootAggregate) -> StatsResult<DropSession> {
        let session = DropSession::now(total_opened, loot);
        self.record_session(&session)?;
        Ok(session)
    }

    /// Records a fully formed session.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn record_session(&self, session: &DropSession) -> StatsResult<()> {
        self.log.append(session)?;
        tracing::info!(
            opened = session.total_opened,
            items = session.loot.len(),
            units = session.loot.total_units(),
            "Drop session recorded"
        );
        Ok(())
    }

    /// Every recorded session, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn sessions(&self) -> StatsResult<Vec<DropSession>> {
        self.log.sessions()
    }

    /// Totals across all sessions; `None` if nothing was recorded.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn total_stats(&self) -> StatsResult<Option<DropTotals>> {
        self.stats_for(..)
    }

    /// Totals of the most recent session only.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn last_session_stats(&self) -> StatsResult<Option<DropTotals>> {
        let sessions = self.log.sessions()?;
        Ok(sessions
            .last()
            .map(|last| DropTotals::from_sessions(std::slice::from_ref(last))))
    }

    /// Totals over a range of session indices (oldest is 0).
    ///
    /// Out-of-range bounds are clamped; `None` if the range selects nothing.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn stats_for(&self, range: impl RangeBounds<usize>) -> StatsResult<Option<DropTotals>> {
        use std::ops::Bound;

        let sessions = self.log.sessions()?;
        let len = sessions.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len);

        if start >= end {
            return Ok(None);
        }
        Ok(Some(DropTotals::from_sessions(&sessions[start..end])))
    }

    /// Probabilities for a set of totals.
    #[must_use]
    pub fn probabilities(&self, totals: &DropTotals) -> Vec<ItemProbability> {
        totals.probabilities()
    }

    /// Forecast for opening `units` more containers.
    #[must_use]
    pub fn forecast(&self, units: u64, totals: &DropTotals) -> Vec<ItemForecast> {
        totals.forecast(units)
    }

    /// Per-item trends across the whole history.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn trend(&self) -> StatsResult<Vec<ItemTrend>> {
        Ok(analysis::trends(&self.log.sessions()?))
    }

    /// Summaries of the last `window` sessions, oldest first.
    ///
    /// Empty with fewer than two sessions.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn compare_sessions(&self, window: usize) -> StatsResult<Vec<SessionSummary>> {
        let sessions = self.log.sessions()?;
        if sessions.len() < 2 {
            return Ok(Vec::new());
        }
        let skip = sessions.len().saturating_sub(window);
        Ok(sessions[skip..].iter().map(SessionSummary::of).collect())
    }

    /// Rarest items overall, or the named ones.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn best_drops(&self, names: &[&str]) -> StatsResult<Vec<BestDrop>> {
        Ok(self
            .total_stats()?
            .map(|totals| analysis::best_drops(&totals, names, DEFAULT_BEST_DROPS))
            .unwrap_or_default())
    }

    /// The whole history with its totals, ready for JSON.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn export(&self) -> StatsResult<StatsExport> {
        Ok(StatsExport::new(self.log.sessions()?, unix_now()))
    }

    /// Plain-text report over the whole history; `None` if nothing was
    /// recorded yet.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn full_report(&self, forecast_units: u64) -> StatsResult<Option<String>> {
        Ok(self
            .total_stats()?
            .map(|totals| export::full_report(&totals, forecast_units, unix_now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TrendDirection;
    use crate::drop_log::MemoryDropLog;

    fn loot(items: &[(&str, u64)]) -> LootAggregate {
        items.iter().map(|(n, q)| (*n, *q)).collect()
    }

    #[test]
    fn test_empty_history() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        assert!(stats.total_stats().unwrap().is_none());
        assert!(stats.last_session_stats().unwrap().is_none());
        assert!(stats.trend().unwrap().is_empty());
        assert!(stats.compare_sessions(DEFAULT_COMPARE_WINDOW).unwrap().is_empty());
        assert!(stats.best_drops(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_record_then_totals() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        stats.record(10, loot(&[("X", 3)])).unwrap();
        stats.record(10, loot(&[("X", 7)])).unwrap();

        let totals = stats.total_stats().unwrap().unwrap();
        assert_eq!(totals.total_opened, 20);
        assert_eq!(totals.items.get("X"), 10);

        let probs = stats.probabilities(&totals);
        assert!((probs[0].percent - 50.0).abs() < 1e-9);

        let forecast = stats.forecast(100, &totals);
        assert!((forecast[0].expected - 50.0).abs() < 1e-9);

        let last = stats.last_session_stats().unwrap().unwrap();
        assert_eq!(last.total_opened, 10);
        assert_eq!(last.items.get("X"), 7);
    }

    #[test]
    fn test_stats_for_range() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        for i in 1..=4 {
            stats.record(i, loot(&[("X", i)])).unwrap();
        }
        assert_eq!(stats.stats_for(1..3).unwrap().unwrap().total_opened, 5);
        assert_eq!(stats.stats_for(2..).unwrap().unwrap().total_opened, 7);
        assert_eq!(stats.stats_for(..=0).unwrap().unwrap().total_opened, 1);
        assert!(stats.stats_for(10..).unwrap().is_none());
    }

    #[test]
    fn test_compare_window() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        stats.record(1, loot(&[("A", 1)])).unwrap();
        assert!(stats.compare_sessions(5).unwrap().is_empty());

        for i in 2..=7 {
            stats.record(i, loot(&[("A", 1)])).unwrap();
        }
        let rows = stats.compare_sessions(5).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].opened, 3);
        assert_eq!(rows[4].opened, 7);
    }

    #[test]
    fn test_trend_through_engine() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        stats.record(10, loot(&[("X", 6)])).unwrap();
        stats.record(10, loot(&[("X", 4)])).unwrap();
        stats.record(10, loot(&[("X", 2)])).unwrap();

        let trends = stats.trend().unwrap();
        assert_eq!(trends[0].direction, TrendDirection::Falling);
    }

    #[test]
    fn test_exports_cover_history() {
        let stats = DropStatistics::new(MemoryDropLog::new());
        assert!(stats.full_report(100).unwrap().is_none());
        assert!(stats.export().unwrap().totals.is_none());

        stats.record(4, loot(&[("Coin", 8)])).unwrap();
        stats.record(6, loot(&[("Coin", 2), ("Gem", 1)])).unwrap();

        let export = stats.export().unwrap();
        assert_eq!(export.sessions.len(), 2);
        assert_eq!(export.totals.unwrap().total_opened, 10);

        let report = stats.full_report(100).unwrap().unwrap();
        assert!(report.contains("Sessions:        2"));
        assert!(report.contains("Gem"));
    }
}
