//! Login fingerprint and credentials.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One account's credentials plus the client fingerprint it presents.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account login (`l`).
    pub login: String,
    /// Account key (`p`).
    pub key: String,
    /// Declared local network address (`v3`).
    pub local_ip: String,
    /// Client build version (`v2`).
    pub client_version: String,
    /// Protocol version (`v`).
    pub version: String,
    /// Locale (`lang`).
    pub lang: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("login", &self.login)
            .field("key", &"<redacted>")
            .field("local_ip", &self.local_ip)
            .field("client_version", &self.client_version)
            .field("version", &self.version)
            .field("lang", &self.lang)
            .finish()
    }
}

/// Server endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
