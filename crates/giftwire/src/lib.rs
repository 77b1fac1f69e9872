//! # Giftwire
//!
//! Inventory automation for a game server that speaks a framed tag
//! protocol: open reward containers, clear inventories, buy and send
//! gifts, and keep statistics on what containers yield.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              GIFTWIRE                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌────────────────┐   ┌────────────────┐   ┌────────────────────┐   │
//! │  │ giftwire       │   │ giftwire       │   │ giftwire_stats     │   │
//! │  │   engine       │──>│   _protocol    │   │                    │   │
//! │  │                │   │                │   │  • drop log        │   │
//! │  │  • snapshots   │   │  • commands    │   │  • probabilities   │   │
//! │  │  • resolver    │   │  • captures    │   │  • forecasts       │   │
//! │  │  • disposal    │   │  • sessions    │   │  • trends          │   │
//! │  │  • catalog/send│   │  • transports  │   │                    │   │
//! │  └───────┬────────┘   └────────────────┘   └─────────▲──────────┘   │
//! │          │                  loot per run             │              │
//! │          └───────────────────────────────────────────┘              │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `inventory`: snapshot decoding and partition scopes
//! - `gifts`: recursive container resolution
//! - `disposal`: bulk deletion with stall detection
//! - `catalog`, `send`, `inspect`: the remaining server operations
//! - `store`: container allow-list persistence
//! - `cancel`: stopping a run from another thread
//! - `engine`: one session per unit of work, as the right account

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod disposal;
pub mod engine;
pub mod error;
pub mod events;
pub mod gifts;
pub mod inspect;
pub mod inventory;
pub mod send;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the layers below
pub use giftwire_protocol as protocol;
pub use giftwire_stats as stats;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use catalog::{parse_catalog, request_catalog, CatalogEntry};
pub use config::{GiftwireConfig, ReadBudget, Tuning};
pub use disposal::{DisposalOutcome, DisposalReport, InventoryCleaner};
pub use engine::{Connector, Engine, FarmReport, Role, TcpConnector};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventSink};
pub use gifts::{GiftResolver, Resolution};
pub use inspect::{inspect, InventoryReport};
pub use inventory::{take_snapshot, InventoryItem, InventorySnapshot, PartitionScope, PLAYER_PARTITIONS};
pub use send::{send_gifts, SendReport};
pub use store::{refresh_from_catalog, AllowList, AllowListStore, MemoryAllowList, TomlAllowList};
