//! # Giftwire Stats
//!
//! Drop statistics for container resolution runs.
//!
//! ```text
//! resolution run ──► DropSession ──► DropLog (append-only, CRC-checked)
//!                                        │
//!                    DropStatistics ◄────┘
//!                      ├─ total / last / ranged totals
//!                      ├─ probabilities + rarity
//!                      ├─ forecasts (95% interval)
//!                      ├─ per-item trends
//!                      ├─ session comparison, best drops
//!                      └─ JSON export, text report
//! ```
//!
//! ## Design Principles
//!
//! 1. **History is the only state**: every figure is recomputed from the log
//! 2. **Crash tolerant**: a torn final record is dropped, not fatal
//! 3. **Serialized appends**: concurrent recorders never interleave

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod analysis;
pub mod drop_log;
pub mod error;
pub mod export;
pub mod rarity;
pub mod record;
pub mod statistics;

pub use analysis::{
    BestDrop, DropTotals, ItemForecast, ItemProbability, ItemTrend, SessionSummary, TrendDirection,
};
pub use drop_log::{DropLog, FileDropLog, MemoryDropLog};
pub use error::{StatsError, StatsResult};
pub use export::{full_report, StatsExport, REPORT_FORECAST_UNITS};
pub use rarity::Rarity;
pub use record::{DropSession, LootAggregate};
pub use statistics::{DropStatistics, DEFAULT_BEST_DROPS, DEFAULT_COMPARE_WINDOW};
