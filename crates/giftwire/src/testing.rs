//! # Scripted Game Server
//!
//! An in-memory stand-in for the game server, speaking the same tags over
//! the [`Transport`] trait. Shared state lets a test inspect what the
//! engine did after the session is gone.
//!
//! ```rust,ignore
//! let server = ScriptedServer::new()
//!     .with_container("a", "Box", 0, vec![ServerItem::new("c1", "Coin", 0, 5)]);
//! let mut session = server.session(&identity("bob"))?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use giftwire_protocol::protocol::escape_attr;
use giftwire_protocol::{
    elements, Element, Identity, ReadOutcome, ReadPlan, Session, SessionResult, Transport,
};
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::engine::{Connector, Role};
use crate::error::EngineResult;
use crate::inventory::is_player_partition;

/// An item as the server stores it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerItem {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Partition.
    pub partition: u32,
    /// Quantity.
    pub quantity: u32,
}

impl ServerItem {
    /// Creates an item.
    #[must_use]
    pub fn new(id: &str, name: &str, partition: u32, quantity: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            partition,
            quantity,
        }
    }

    fn render(&self, out: &mut String) {
        let _ = write!(
            out,
            r#"<O id="{}" txt="{}" section="{}" count="{}" max_count="999"/>"#,
            escape_attr(&self.id),
            escape_attr(&self.name),
            self.partition,
            self.quantity
        );
    }
}

/// What the server does with `DROP`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteBehavior {
    /// Removes the item.
    #[default]
    Remove,
    /// Acknowledges and keeps the item.
    Ignore,
}

#[derive(Debug, Default)]
struct ServerState {
    inventory: Vec<ServerItem>,
    contents: HashMap<String, Vec<ServerItem>>,
    catalog: Vec<(String, String)>,
    delete_behavior: DeleteBehavior,
    visible_limit: Option<usize>,
    lagging_opens: bool,
    silent_login: bool,
    send_budget: u32,
    chunk_limit: Option<usize>,
    cancel_after: Option<(u32, CancelToken)>,
    frames: Vec<String>,
    opens: HashMap<String, u32>,
    deletes: Vec<(String, u32)>,
    purchases: Vec<(String, String)>,
    logins: Vec<String>,
}

impl ServerState {
    fn respond(&mut self, command: &Element) -> String {
        match command.name.as_str() {
            "LOGIN" => {
                self.logins.push(command.attr("l").unwrap_or_default().to_string());
                if self.silent_login {
                    String::new()
                } else {
                    "<OK />".to_string()
                }
            }
            "GETME" => self.render_inventory(),
            "USE" => self.open(command.attr("gift").unwrap_or_default()),
            "DROP" => {
                let id = command.attr("id").unwrap_or_default().to_string();
                let count = command.parse_attr("count").unwrap_or(0);
                self.deletes.push((id.clone(), count));
                if self.delete_behavior == DeleteBehavior::Remove {
                    self.inventory.retain(|item| item.id != id);
                }
                format!(r#"<DROP id="{}" code="0"/>"#, escape_attr(&id))
            }
            "GH" => match command.attr("buysouvenir") {
                Some(souvenir) => {
                    let recipient = command.attr("login").unwrap_or_default();
                    self.purchases.push((recipient.to_string(), souvenir.to_string()));
                    let code = if self.send_budget > 0 {
                        self.send_budget -= 1;
                        0
                    } else {
                        7
                    };
                    format!(r#"<GH code="{code}"/>"#)
                }
                None => {
                    let mut out = String::from("<GH>");
                    for (id, name) in &self.catalog {
                        let _ = write!(out, r#"<O id="{}" txt="{}"/>"#, escape_attr(id), escape_attr(name));
                    }
                    out.push_str("</GH>");
                    out
                }
            },
            _ => String::new(),
        }
    }

    fn render_inventory(&self) -> String {
        let mut out = String::from(r#"<MYPARAM money="0">"#);
        let mut visible_player = 0;
        for item in &self.inventory {
            if is_player_partition(item.partition) {
                if self.visible_limit.is_some_and(|limit| visible_player >= limit) {
                    continue;
                }
                visible_player += 1;
            }
            item.render(&mut out);
        }
        out.push_str("</MYPARAM>");
        out
    }

    fn open(&mut self, id: &str) -> String {
        *self.opens.entry(id.to_string()).or_insert(0) += 1;
        if let Some((limit, token)) = &self.cancel_after {
            if self.opens.values().sum::<u32>() >= *limit {
                token.cancel();
            }
        }

        let Some(position) = self.inventory.iter().position(|item| item.id == id) else {
            return r#"<ERR code="2"/>"#.to_string();
        };
        let Some(yields) = self.contents.remove(id) else {
            return r#"<ERR code="3"/>"#.to_string();
        };

        if !self.lagging_opens {
            self.inventory.remove(position);
        }
        let mut out = String::from("<GIFT>");
        for item in &yields {
            item.render(&mut out);
        }
        out.push_str("</GIFT>");
        self.inventory.extend(yields);
        out
    }
}

/// Handle to a scripted server. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ScriptedServer {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedServer {
    /// Creates a server with an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Adds a plain item.
    #[must_use]
    pub fn with_item(self, item: ServerItem) -> Self {
        self.state.lock().inventory.push(item);
        self
    }

    /// Adds `count` plain items `prefix0..prefixN` in partition 0.
    #[must_use]
    pub fn with_items(self, prefix: &str, count: usize) -> Self {
        {
            let mut state = self.state.lock();
            for i in 0..count {
                state
                    .inventory
                    .push(ServerItem::new(&format!("{prefix}{i}"), &format!("Item {i}"), 0, 1));
            }
        }
        self
    }

    /// Adds a container that yields `contents` when opened.
    #[must_use]
    pub fn with_container(self, id: &str, name: &str, partition: u32, contents: Vec<ServerItem>) -> Self {
        {
            let mut state = self.state.lock();
            state.inventory.push(ServerItem::new(id, name, partition, 1));
            state.contents.insert(id.to_string(), contents);
        }
        self
    }

    /// Registers what an identifier yields once it exists, for containers
    /// that only appear out of other containers.
    #[must_use]
    pub fn with_contents(self, id: &str, contents: Vec<ServerItem>) -> Self {
        self.state.lock().contents.insert(id.to_string(), contents);
        self
    }

    /// Sets what `DROP` does.
    #[must_use]
    pub fn with_delete_behavior(self, behavior: DeleteBehavior) -> Self {
        self.state.lock().delete_behavior = behavior;
        self
    }

    /// Shows at most `limit` player-partition items per inventory response.
    #[must_use]
    pub fn with_visible_limit(self, limit: usize) -> Self {
        self.state.lock().visible_limit = Some(limit);
        self
    }

    /// Opened containers stay listed in the inventory.
    #[must_use]
    pub fn with_lagging_opens(self) -> Self {
        self.state.lock().lagging_opens = true;
        self
    }

    /// Accepts logins without answering.
    #[must_use]
    pub fn with_silent_login(self) -> Self {
        self.state.lock().silent_login = true;
        self
    }

    /// Catalog entries `(id, name)`.
    #[must_use]
    pub fn with_catalog(self, entries: &[(&str, &str)]) -> Self {
        self.state.lock().catalog = entries
            .iter()
            .map(|(id, name)| ((*id).to_string(), (*name).to_string()))
            .collect();
        self
    }

    /// Purchases that succeed before the server starts refusing.
    #[must_use]
    pub fn with_send_budget(self, budget: u32) -> Self {
        self.state.lock().send_budget = budget;
        self
    }

    /// Sets `token` once `opens` containers were opened in total, as if a
    /// supervisor cancelled while that open was in flight.
    #[must_use]
    pub fn with_cancel_after_opens(self, opens: u32, token: CancelToken) -> Self {
        self.state.lock().cancel_after = Some((opens, token));
        self
    }

    /// Delivers responses in chunks of at most `limit` bytes.
    #[must_use]
    pub fn with_chunk_limit(self, limit: usize) -> Self {
        self.state.lock().chunk_limit = Some(limit.max(1));
        self
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// A fresh connection.
    #[must_use]
    pub fn open_transport(&self) -> ScriptedTransport {
        ScriptedTransport {
            state: Arc::clone(&self.state),
            outbound: VecDeque::new(),
            closed: false,
        }
    }

    /// A fresh connection with LOGIN already exchanged.
    ///
    /// # Errors
    ///
    /// Only if the transport was closed, which a fresh one never is.
    pub fn session(&self, identity: &Identity) -> SessionResult<Session<ScriptedTransport>> {
        Session::establish(
            self.open_transport(),
            "scripted",
            identity,
            &ReadPlan::once(Duration::ZERO, 8192),
        )
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Times `USE` was received for `id`.
    #[must_use]
    pub fn open_count(&self, id: &str) -> u32 {
        self.state.lock().opens.get(id).copied().unwrap_or(0)
    }

    /// Every `(id, count)` received in `DROP`, in order.
    #[must_use]
    pub fn deletes(&self) -> Vec<(String, u32)> {
        self.state.lock().deletes.clone()
    }

    /// Every `(recipient, souvenir)` purchase received.
    #[must_use]
    pub fn purchases(&self) -> Vec<(String, String)> {
        self.state.lock().purchases.clone()
    }

    /// Logins received, in order.
    #[must_use]
    pub fn logins(&self) -> Vec<String> {
        self.state.lock().logins.clone()
    }

    /// Every frame received, NUL stripped.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.state.lock().frames.clone()
    }

    /// Current inventory, every partition.
    #[must_use]
    pub fn inventory(&self) -> Vec<ServerItem> {
        self.state.lock().inventory.clone()
    }

    /// Current player-partition items.
    #[must_use]
    pub fn player_items(&self) -> Vec<ServerItem> {
        self.state
            .lock()
            .inventory
            .iter()
            .filter(|item| is_player_partition(item.partition))
            .cloned()
            .collect()
    }
}

/// One connection to a [`ScriptedServer`].
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ServerState>>,
    outbound: VecDeque<u8>,
    closed: bool,
}

impl Transport for ScriptedTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted connection closed"));
        }
        let body = frame.strip_suffix(&[0u8]).unwrap_or(frame);
        let text = String::from_utf8_lossy(body).into_owned();

        let mut state = self.state.lock();
        if let Some(command) = elements(&text).next() {
            let reply = state.respond(&command);
            self.outbound.extend(reply.into_bytes());
        }
        state.frames.push(text);
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<ReadOutcome> {
        if self.closed {
            return Ok(ReadOutcome::Closed);
        }
        if self.outbound.is_empty() {
            return Ok(ReadOutcome::TimedOut);
        }
        let limit = self.state.lock().chunk_limit.unwrap_or(usize::MAX);
        let n = buf.len().min(self.outbound.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(self.outbound.drain(..n)) {
            *slot = byte;
        }
        Ok(ReadOutcome::Data(n))
    }

    fn shutdown(&mut self) {
        self.closed = true;
    }
}

impl Connector for ScriptedServer {
    type Transport = ScriptedTransport;

    fn connect(&self, role: Role) -> EngineResult<Session<ScriptedTransport>> {
        Ok(self.session(&identity(role.as_str()))?)
    }
}

/// An identity for tests.
#[must_use]
pub fn identity(login: &str) -> Identity {
    Identity {
        login: login.to_string(),
        key: format!("{login}-key"),
        local_ip: "127.0.0.1".to_string(),
        client_version: "1.0".to_string(),
        version: "1".to_string(),
        lang: "en".to_string(),
    }
}
