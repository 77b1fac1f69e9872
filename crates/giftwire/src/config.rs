//! # Configuration
//!
//! Loaded once at startup from a TOML file.
//!
//! ```toml
//! [server]
//! host = "game.example.net"
//! port = 8123
//!
//! [identities.sender]      # catalog queries, sending gifts
//! login = "alice"
//! key = "..."
//! local_ip = "10.0.0.2"
//! client_version = "2.1.0"
//! version = "55"
//! lang = "en"
//!
//! [identities.receiver]    # farming, disposal, inspection; receives sends
//! # same fields
//!
//! [tuning]                 # optional, every field defaulted
//! stall_tolerance = 2
//! [tuning.inventory]
//! attempts = 8
//! timeout_ms = 1300
//! chunk_size = 65536
//!
//! [paths]
//! drop_log = "drop_statistics.log"
//! allow_list = "present_list.toml"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use giftwire_protocol::{Endpoint, Identity, ReadPlan};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Complete configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GiftwireConfig {
    /// Game server endpoint.
    pub server: ServerConfig,
    /// The two accounts the engine acts as.
    pub identities: Identities,
    /// Read budgets, delays and limits.
    #[serde(default)]
    pub tuning: Tuning,
    /// Files the front-end owns.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl GiftwireConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on syntax errors, missing sections or
    /// invalid values.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] describing the first problem found.
    pub fn validate(&self) -> EngineResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(EngineError::Config("server.host is empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(EngineError::Config("server.port must be non-zero".to_string()));
        }
        for (role, identity) in [
            ("sender", &self.identities.sender),
            ("receiver", &self.identities.receiver),
        ] {
            if identity.login.trim().is_empty() {
                return Err(EngineError::Config(format!("identities.{role}.login is empty")));
            }
        }
        self.tuning.validate()
    }

    /// Server endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.host.clone(), self.server.port)
    }
}

/// `[server]` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ServerConfig {
    /// Connect timeout as a duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

/// `[identities]` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identities {
    /// Runs catalog queries and sends gifts.
    pub sender: Identity,
    /// Farms, disposes and inspects; receives sent gifts.
    pub receiver: Identity,
}

/// `[paths]` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Durable drop log.
    pub drop_log: PathBuf,
    /// Container allow-list.
    pub allow_list: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            drop_log: PathBuf::from("drop_statistics.log"),
            allow_list: PathBuf::from("present_list.toml"),
        }
    }
}

// =============================================================================
// TUNING
// =============================================================================

/// Read budget for one response type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBudget {
    /// Maximum read attempts.
    pub attempts: u32,
    /// Timeout of each attempt.
    pub timeout_ms: u64,
    /// Bytes requested per attempt.
    pub chunk_size: usize,
}

impl ReadBudget {
    /// Creates a budget.
    #[must_use]
    pub const fn new(attempts: u32, timeout_ms: u64, chunk_size: usize) -> Self {
        Self {
            attempts,
            timeout_ms,
            chunk_size,
        }
    }

    /// Read plan without a terminator.
    #[must_use]
    pub const fn plan(&self) -> ReadPlan {
        ReadPlan::new(
            self.attempts,
            Duration::from_millis(self.timeout_ms),
            self.chunk_size,
        )
    }
}

/// `[tuning]` section: read budgets, cooperative delays and run limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Inventory query (`GETME`).
    pub inventory: ReadBudget,
    /// Container open (`USE`).
    pub open: ReadBudget,
    /// Login acknowledgement.
    pub login: ReadBudget,
    /// Diagnostic read after a delete.
    pub delete: ReadBudget,
    /// Purchase/send acknowledgement.
    pub send: ReadBudget,
    /// Catalog query.
    pub catalog: ReadBudget,
    /// Wait between sending an open and reading its response.
    pub open_settle_ms: u64,
    /// Wait between two container opens.
    pub open_pacing_ms: u64,
    /// Wait between two deletes.
    pub delete_pacing_ms: u64,
    /// Wait between two sends.
    pub send_pacing_ms: u64,
    /// Wait after a stalled disposal pass.
    pub stall_backoff_ms: u64,
    /// Stalled passes tolerated before disposal gives up.
    pub stall_tolerance: u32,
    /// Hard cap on disposal passes.
    pub max_disposal_iterations: u32,
    /// Deepest container nesting that will be opened.
    pub max_gift_depth: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            inventory: ReadBudget::new(8, 1300, 65_536),
            open: ReadBudget::new(8, 1000, 65_536),
            login: ReadBudget::new(1, 5000, 8192),
            delete: ReadBudget::new(1, 500, 1024),
            send: ReadBudget::new(1, 5000, 8192),
            catalog: ReadBudget::new(16, 2000, 4096),
            open_settle_ms: 50,
            open_pacing_ms: 300,
            delete_pacing_ms: 200,
            send_pacing_ms: 70,
            stall_backoff_ms: 3000,
            stall_tolerance: 2,
            max_disposal_iterations: 50,
            max_gift_depth: 16,
        }
    }
}

impl Tuning {
    /// Same budgets and limits with every cooperative delay removed.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.open_settle_ms = 0;
        self.open_pacing_ms = 0;
        self.delete_pacing_ms = 0;
        self.send_pacing_ms = 0;
        self.stall_backoff_ms = 0;
        self
    }

    /// Rejects budgets that could never read anything.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] naming the offending budget.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, budget) in [
            ("inventory", &self.inventory),
            ("open", &self.open),
            ("login", &self.login),
            ("delete", &self.delete),
            ("send", &self.send),
            ("catalog", &self.catalog),
        ] {
            if budget.attempts == 0 || budget.chunk_size == 0 {
                return Err(EngineError::Config(format!(
                    "tuning.{name} needs at least one attempt and a non-zero chunk size"
                )));
            }
        }
        if self.max_disposal_iterations == 0 {
            return Err(EngineError::Config(
                "tuning.max_disposal_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sleeps for `ms` milliseconds; zero returns immediately.
pub(crate) fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
