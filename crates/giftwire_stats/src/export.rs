//! # Exports
//!
//! Shareable copies of the drop history: a JSON dump of every recorded
//! session with the overall totals, and a plain-text report of
//! probabilities and a forecast.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::analysis::DropTotals;
use crate::error::StatsResult;
use crate::record::DropSession;

/// Forecast horizon used by the full report unless told otherwise.
pub const REPORT_FORECAST_UNITS: u64 = 100;

const RULE: &str = "═══════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────";

/// The JSON export document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsExport {
    /// Unix seconds at which the export was made.
    pub exported_at: u64,
    /// Totals over every session; absent for an empty history.
    pub totals: Option<DropTotals>,
    /// Every session, oldest first.
    pub sessions: Vec<DropSession>,
}

impl StatsExport {
    /// Builds the document from the full history.
    #[must_use]
    pub fn new(sessions: Vec<DropSession>, exported_at: u64) -> Self {
        let totals = (!sessions.is_empty()).then(|| DropTotals::from_sessions(&sessions));
        Self {
            exported_at,
            totals,
            sessions,
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`StatsError::Json`](crate::StatsError::Json) if serialization fails.
    pub fn to_json(&self) -> StatsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Plain-text report: totals, per-item probabilities, and a forecast for
/// `forecast_units` more opens.
#[must_use]
pub fn full_report(totals: &DropTotals, forecast_units: u64, generated_at: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  DROP REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Generated: unix {generated_at}");
    let _ = writeln!(out);

    let _ = writeln!(out, "TOTALS");
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out, "Sessions:        {}", totals.sessions);
    let _ = writeln!(out, "Containers:      {}", totals.total_opened);
    let _ = writeln!(out, "Distinct items:  {}", totals.items.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "PROBABILITIES");
    let _ = writeln!(out, "{THIN_RULE}");
    for p in totals.probabilities() {
        let _ = writeln!(out, "{}", p.name);
        let _ = writeln!(out, "  count:     {}", p.count);
        let _ = writeln!(out, "  percent:   {:.2}%", p.percent);
        let _ = writeln!(out, "  per open:  {:.4}", p.rate);
        let _ = writeln!(out, "  rarity:    {}", p.rarity.as_str());
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "FORECAST FOR {forecast_units} OPENS");
    let _ = writeln!(out, "{THIN_RULE}");
    for f in totals.forecast(forecast_units) {
        let _ = writeln!(out, "{}: {:.1} (95% CI: {:.1}-{:.1})", f.name, f.expected, f.low, f.high);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{RULE}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(ts: u64, opened: u64, items: &[(&str, u64)]) -> DropSession {
        DropSession {
            timestamp: ts,
            total_opened: opened,
            loot: items.iter().map(|(n, q)| (*n, *q)).collect(),
        }
    }

    #[test]
    fn test_json_export_reads_back() {
        let export = StatsExport::new(
            vec![session(1, 10, &[("X", 3)]), session(2, 10, &[("X", 7), ("Y", 1)])],
            99,
        );
        let json = export.to_json().unwrap();
        let parsed: StatsExport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.sessions, export.sessions);
        let totals = parsed.totals.unwrap();
        assert_eq!(totals.total_opened, 20);
        assert_eq!(totals.items.get("X"), 10);
    }

    #[test]
    fn test_empty_history_has_no_totals() {
        let export = StatsExport::new(Vec::new(), 5);
        assert!(export.totals.is_none());
        assert!(export.to_json().unwrap().contains("\"sessions\": []"));
    }

    #[test]
    fn test_report_sections() {
        let totals = DropTotals::from_sessions(&[session(1, 10, &[("X", 3)]), session(2, 10, &[("X", 7)])]);
        let report = full_report(&totals, 100, 1234);

        assert!(report.contains("Generated: unix 1234"));
        assert!(report.contains("Sessions:        2"));
        assert!(report.contains("percent:   50.00%"));
        assert!(report.contains("rarity:    legendary"));
        assert!(report.contains("X: 50.0 (95% CI: 40.2-59.8)"));
    }
}
