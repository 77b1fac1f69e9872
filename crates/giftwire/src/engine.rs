//! # Engine Facade
//!
//! The operations a front-end calls. Each one is a unit of work with its
//! own session, opened as the right account and closed when the work ends.
//!
//! ```text
//!                 ┌──────────────┐
//!  front-end ────>│    Engine    │──── allow-list store
//!                 │              │──── drop statistics (log)
//!                 └──────┬───────┘
//!                        │ connect(role)
//!                 ┌──────▼───────┐
//!                 │  Connector   │  TCP in production, scripted in tests
//!                 └──────────────┘
//! ```
//!
//! | Operation      | Account  |
//! |----------------|----------|
//! | farm           | receiver |
//! | dispose        | receiver |
//! | inspect        | receiver |
//! | catalog        | sender   |
//! | refresh list   | sender   |
//! | send           | sender   |
//!
//! Farming and disposal stop between protocol operations once the
//! engine's [`CancelToken`] is set. Allow-list management and exports
//! never touch the server.

use std::time::Duration;

use giftwire_protocol::{Endpoint, ReadPlan, Session, TcpTransport, Transport};
use giftwire_stats::{DropLog, DropSession, DropStatistics, FileDropLog};

use crate::cancel::CancelToken;
use crate::catalog::{request_catalog, CatalogEntry};
use crate::config::{GiftwireConfig, Identities, Tuning};
use crate::disposal::{DisposalReport, InventoryCleaner};
use crate::error::{EngineError, EngineResult};
use crate::events::EventSink;
use crate::gifts::{GiftResolver, Resolution};
use crate::inspect::{inspect, InventoryReport};
use crate::send::{send_gifts, SendReport};
use crate::store::{refresh_from_catalog, AllowList, AllowListStore, TomlAllowList};

/// Which configured account a session logs in as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Catalog queries and sending.
    Sender,
    /// Farming, disposal, inspection.
    Receiver,
}

impl Role {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

/// Opens authenticated sessions.
pub trait Connector {
    /// Byte stream the sessions run over.
    type Transport: Transport;

    /// Connects and logs in as `role`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Session`](crate::EngineError::Session) if the server
    /// cannot be reached.
    fn connect(&self, role: Role) -> EngineResult<Session<Self::Transport>>;
}

/// Connects over TCP with the configured identities.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    endpoint: Endpoint,
    identities: Identities,
    connect_timeout: Duration,
    login_plan: ReadPlan,
}

impl TcpConnector {
    /// Builds a connector from configuration.
    #[must_use]
    pub fn from_config(config: &GiftwireConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            identities: config.identities.clone(),
            connect_timeout: config.server.connect_timeout(),
            login_plan: config.tuning.login.plan(),
        }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&self, role: Role) -> EngineResult<Session<TcpTransport>> {
        let identity = match role {
            Role::Sender => &self.identities.sender,
            Role::Receiver => &self.identities.receiver,
        };
        tracing::info!(endpoint = %self.endpoint, role = role.as_str(), "connecting");
        Ok(Session::open(
            &self.endpoint,
            identity,
            self.connect_timeout,
            &self.login_plan,
        )?)
    }
}

/// A finished farming run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FarmReport {
    /// What was opened and obtained.
    pub resolution: Resolution,
    /// The recorded session; `None` if nothing was opened.
    pub recorded: Option<DropSession>,
}

/// The engine a front-end drives.
pub struct Engine<C: Connector, L: DropLog, S: AllowListStore> {
    connector: C,
    tuning: Tuning,
    recipient: String,
    stats: DropStatistics<L>,
    allow_list: S,
    events: EventSink,
    cancel: CancelToken,
}

impl Engine<TcpConnector, FileDropLog, TomlAllowList> {
    /// Production engine: TCP sessions, file-backed drop log and allow-list.
    ///
    /// # Errors
    ///
    /// Fails if the drop log cannot be opened.
    pub fn from_config(config: &GiftwireConfig) -> EngineResult<Self> {
        let log = FileDropLog::open(&config.paths.drop_log)?;
        Ok(Self::new(
            TcpConnector::from_config(config),
            config.tuning.clone(),
            config.identities.receiver.login.clone(),
            DropStatistics::new(log),
            TomlAllowList::new(&config.paths.allow_list),
        ))
    }
}

impl<C: Connector, L: DropLog, S: AllowListStore> Engine<C, L, S> {
    /// Assembles an engine. `recipient` is the login that sent gifts go to.
    #[must_use]
    pub fn new(
        connector: C,
        tuning: Tuning,
        recipient: impl Into<String>,
        stats: DropStatistics<L>,
        allow_list: S,
    ) -> Self {
        Self {
            connector,
            tuning,
            recipient: recipient.into(),
            stats,
            allow_list,
            events: EventSink::disabled(),
            cancel: CancelToken::new(),
        }
    }

    /// Routes progress events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Handle a supervisor uses to stop [`farm`](Self::farm) and
    /// [`dispose`](Self::dispose) between protocol operations.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Opens every listed container and records the yield.
    ///
    /// A run that stops early still records what it opened: those
    /// containers are consumed on the server.
    ///
    /// # Errors
    ///
    /// Connection failures, the recursion bound, cancellation, and store or
    /// log failures.
    pub fn farm(&self) -> EngineResult<FarmReport> {
        let allowed = self.allow_list.load()?;
        let mut session = self.connector.connect(Role::Receiver)?;
        let mut resolver = GiftResolver::new(&self.tuning, &self.events).with_cancel(self.cancel.clone());
        let outcome = resolver.resolve_all(&mut session, &allowed);
        session.close();

        match outcome {
            Ok(resolution) => {
                let recorded = self.record(&resolution)?;
                Ok(FarmReport {
                    resolution,
                    recorded,
                })
            }
            Err(error) => {
                let partial = resolver.partial();
                tracing::warn!(%error, opened = partial.total_opened, "farm stopped early");
                if let Err(record_error) = self.record(partial) {
                    tracing::error!(%record_error, "could not record the partial run");
                }
                Err(error)
            }
        }
    }

    fn record(&self, resolution: &Resolution) -> EngineResult<Option<DropSession>> {
        if resolution.total_opened == 0 {
            return Ok(None);
        }
        Ok(Some(
            self.stats
                .record(resolution.total_opened, resolution.loot.clone())?,
        ))
    }

    /// Deletes everything in the player partitions.
    ///
    /// # Errors
    ///
    /// Connection failures, the pass cap, and cancellation.
    pub fn dispose(&self) -> EngineResult<DisposalReport> {
        let mut session = self.connector.connect(Role::Receiver)?;
        let report = InventoryCleaner::new(&self.tuning, &self.events)
            .with_cancel(self.cancel.clone())
            .dispose_all(&mut session, self.tuning.max_disposal_iterations);
        session.close();
        report
    }

    /// Groups the receiver's inventory by partition.
    ///
    /// # Errors
    ///
    /// Connection failures.
    pub fn inspect(&self) -> EngineResult<InventoryReport> {
        let mut session = self.connector.connect(Role::Receiver)?;
        let report = inspect(&mut session, &self.tuning);
        session.close();
        Ok(report?)
    }

    /// Lists the containers the server sells.
    ///
    /// # Errors
    ///
    /// Connection failures.
    pub fn catalog(&self) -> EngineResult<Vec<CatalogEntry>> {
        let mut session = self.connector.connect(Role::Sender)?;
        let entries = request_catalog(&mut session, &self.tuning);
        session.close();
        Ok(entries?)
    }

    /// Replaces the allow-list with the current catalog names.
    ///
    /// # Errors
    ///
    /// Connection and store failures.
    pub fn refresh_allow_list(&self) -> EngineResult<AllowList> {
        let entries = self.catalog()?;
        refresh_from_catalog(&self.allow_list, &entries)
    }

    /// Buys `count` units of `souvenir` for the receiver account.
    ///
    /// # Errors
    ///
    /// Connection failures.
    pub fn send(&self, souvenir: &str, count: u32) -> EngineResult<SendReport> {
        let mut session = self.connector.connect(Role::Sender)?;
        let report = send_gifts(
            &mut session,
            &self.tuning,
            &self.events,
            &self.recipient,
            souvenir,
            count,
        );
        session.close();
        Ok(report?)
    }

    // =========================================================================
    // Allow-list management
    // =========================================================================

    /// The current allow-list.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn allow_list_names(&self) -> EngineResult<AllowList> {
        self.allow_list.load()
    }

    /// Adds a container name. Returns false if it was already listed.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] for a blank name, and store failures.
    pub fn add_container(&self, name: &str) -> EngineResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Store("container name is empty".to_string()));
        }
        let mut list = self.allow_list.load()?;
        if !list.insert(name) {
            return Ok(false);
        }
        self.allow_list.save(&list)?;
        tracing::info!(name, names = list.len(), "container added to allow-list");
        Ok(true)
    }

    /// Removes a container name. Returns false if it was not listed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn remove_container(&self, name: &str) -> EngineResult<bool> {
        let mut list = self.allow_list.load()?;
        if !list.remove(name.trim()) {
            return Ok(false);
        }
        self.allow_list.save(&list)?;
        tracing::info!(name, names = list.len(), "container removed from allow-list");
        Ok(true)
    }

    // =========================================================================
    // Exports
    // =========================================================================

    /// Every recorded session with overall totals, as pretty JSON.
    ///
    /// # Errors
    ///
    /// Log and serialization failures.
    pub fn export_stats_json(&self) -> EngineResult<String> {
        Ok(self.stats.export()?.to_json()?)
    }

    /// The allow-list as pretty JSON (`{"names": [...]}`).
    ///
    /// # Errors
    ///
    /// Store and serialization failures.
    pub fn export_allow_list_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.allow_list.load()?)?)
    }

    /// Plain-text report with a forecast for `forecast_units` opens; `None`
    /// before the first recorded session.
    ///
    /// # Errors
    ///
    /// Log failures.
    pub fn full_report(&self, forecast_units: u64) -> EngineResult<Option<String>> {
        Ok(self.stats.full_report(forecast_units)?)
    }

    /// Drop statistics.
    #[must_use]
    pub const fn stats(&self) -> &DropStatistics<L> {
        &self.stats
    }

    /// Allow-list store.
    #[must_use]
    pub const fn allow_list(&self) -> &S {
        &self.allow_list
    }

    /// Tuning in effect.
    #[must_use]
    pub const fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Login that sent gifts go to.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}
