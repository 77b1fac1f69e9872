//! # Protocol Session
//!
//! One authenticated connection to one server endpoint.
//!
//! ## Command Discipline
//!
//! ```text
//! session.send(cmd) ──> Outstanding<'_> ──> receive_until(plan) ──> Capture
//!        │                    │
//!        │                    └── holds &mut Session: no second send
//!        │                        compiles until this one is consumed
//!        └── LOGIN is always the first frame on a new connection
//! ```
//!
//! The wire carries no sequence numbers. A response is attributed to the
//! last command purely by position, so exactly one command may be in flight.
//! Dropping an [`Outstanding`] without reading is the fire-and-forget path.

mod capture;
mod identity;

pub use capture::{Capture, CaptureEnd, ReadPlan, DEFAULT_CHUNK_SIZE};
pub use identity::{Endpoint, Identity};

use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::protocol::Command;
use crate::transport::{ReadOutcome, TcpTransport, Transport};
use capture::contains_subslice;

/// An authenticated connection. Owned by one unit of work, closed when it
/// ends (explicitly or on drop).
pub struct Session<T: Transport = TcpTransport> {
    /// Byte stream.
    transport: T,
    /// `host:port`, for logs and errors.
    endpoint: String,
    /// Set by `close()` or when the peer closed the stream.
    closed: bool,
    /// Whether the LOGIN produced any bytes at all.
    login_acknowledged: bool,
    /// Frames written so far.
    commands_sent: u64,
}

impl Session<TcpTransport> {
    /// Connects and authenticates.
    ///
    /// Failing to reach the server is a [`SessionError::Connect`]. A server
    /// that accepts the stream but rejects the login still yields a session;
    /// later commands will simply come back empty.
    pub fn open(
        endpoint: &Endpoint,
        identity: &Identity,
        connect_timeout: Duration,
        login_plan: &ReadPlan,
    ) -> SessionResult<Self> {
        let transport = TcpTransport::connect(&endpoint.host, endpoint.port, connect_timeout)
            .map_err(|source| SessionError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        tracing::info!(endpoint = %endpoint, peer = %transport.peer_addr(), "connected");
        Self::establish(transport, endpoint.to_string(), identity, login_plan)
    }
}

impl<T: Transport> Session<T> {
    /// Wraps an already-connected transport without authenticating.
    #[must_use]
    pub fn from_transport(transport: T, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            closed: false,
            login_acknowledged: false,
            commands_sent: 0,
        }
    }

    /// Wraps a connected transport and performs the LOGIN exchange.
    pub fn establish(
        transport: T,
        endpoint: impl Into<String>,
        identity: &Identity,
        login_plan: &ReadPlan,
    ) -> SessionResult<Self> {
        let mut session = Self::from_transport(transport, endpoint);
        let ack = session
            .send(&Command::Login(identity.clone()))?
            .receive_until(login_plan)?;

        session.login_acknowledged = !ack.is_empty();
        if session.login_acknowledged {
            tracing::info!(login = %identity.login, bytes = ack.len(), "login acknowledged");
        } else {
            tracing::warn!(login = %identity.login, "login produced no acknowledgement");
        }

        Ok(session)
    }

    /// Sends one command. The returned guard must be consumed (or dropped)
    /// before the next command can be sent.
    pub fn send(&mut self, command: &Command) -> SessionResult<Outstanding<'_, T>> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        let frame = command.encode();
        if let Err(e) = self.transport.write_frame(&frame) {
            self.close();
            return Err(SessionError::ConnectionLost(e));
        }
        self.commands_sent += 1;
        tracing::debug!(command = %command.describe(), bytes = frame.len(), "sent");

        Ok(Outstanding {
            session: self,
            tag: command.tag(),
        })
    }

    /// Closes the connection. Safe to call repeatedly, and between any two
    /// protocol operations.
    pub fn close(&mut self) {
        if !self.closed {
            self.transport.shutdown();
            self.closed = true;
            tracing::debug!(endpoint = %self.endpoint, commands = self.commands_sent, "session closed");
        }
    }

    /// Returns true once the session can no longer send.
    #[inline]
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns whether the LOGIN produced any bytes.
    #[inline]
    #[must_use]
    pub const fn login_acknowledged(&self) -> bool {
        self.login_acknowledged
    }

    /// Frames written so far, LOGIN included.
    #[inline]
    #[must_use]
    pub const fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Endpoint label.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Borrows the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Best-effort capture: read until the terminator appears, an attempt
    /// times out, the stream closes, or the attempt budget runs out.
    fn capture(&mut self, plan: &ReadPlan) -> SessionResult<Capture> {
        let mut bytes = Vec::new();
        let mut buf = vec![0u8; plan.chunk_size.max(1)];
        let mut attempts_used = 0;
        let mut end = CaptureEnd::BudgetExhausted;

        while attempts_used < plan.attempts {
            attempts_used += 1;

            match self.transport.read_chunk(&mut buf, plan.attempt_timeout) {
                Ok(ReadOutcome::Data(n)) => {
                    let overlap = plan.terminator.map_or(0, |t| t.len().saturating_sub(1));
                    let search_from = bytes.len().saturating_sub(overlap);
                    bytes.extend_from_slice(&buf[..n]);

                    if let Some(terminator) = plan.terminator {
                        if contains_subslice(&bytes[search_from..], terminator.as_bytes()) {
                            end = CaptureEnd::Terminator;
                            break;
                        }
                    }
                }
                Ok(ReadOutcome::TimedOut) => {
                    end = CaptureEnd::TimedOut;
                    break;
                }
                Ok(ReadOutcome::Closed) => {
                    tracing::warn!(endpoint = %self.endpoint, "peer closed the stream");
                    self.close();
                    end = CaptureEnd::Closed;
                    break;
                }
                Err(e) => {
                    self.close();
                    return Err(SessionError::ConnectionLost(e));
                }
            }
        }

        Ok(Capture {
            bytes,
            end,
            attempts_used,
        })
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The single command in flight on a session.
#[must_use = "read the response with receive_until, or call discard"]
pub struct Outstanding<'s, T: Transport> {
    /// Exclusive borrow of the session until the response is consumed.
    session: &'s mut Session<T>,
    /// Tag of the command awaiting its response.
    tag: &'static str,
}

impl<T: Transport> Outstanding<'_, T> {
    /// Captures the response according to `plan`.
    pub fn receive_until(self, plan: &ReadPlan) -> SessionResult<Capture> {
        let capture = self.session.capture(plan)?;
        tracing::debug!(
            tag = self.tag,
            bytes = capture.len(),
            attempts = capture.attempts_used,
            end = ?capture.end,
            "captured"
        );
        Ok(capture)
    }

    /// Abandons the response without reading it.
    pub fn discard(self) {}

    /// Tag of the command awaiting its response.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        self.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Replays a fixed list of read outcomes and records written frames.
    #[derive(Default)]
    struct QueuedTransport {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<Vec<u8>>,
        shutdowns: u32,
    }

    impl QueuedTransport {
        fn with_chunks(chunks: &[&[u8]]) -> Self {
            Self {
                reads: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                ..Self::default()
            }
        }
    }

    impl Transport for QueuedTransport {
        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            self.written.push(frame.to_vec());
            Ok(())
        }

        fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<ReadOutcome> {
            match self.reads.pop_front() {
                None => Ok(ReadOutcome::TimedOut),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) if chunk.is_empty() => Ok(ReadOutcome::Closed),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(ReadOutcome::Data(chunk.len()))
                }
            }
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn plan() -> ReadPlan {
        ReadPlan::new(8, Duration::from_millis(10), 1024)
    }

    #[test]
    fn test_terminator_split_across_chunks() {
        let transport = QueuedTransport::with_chunks(&[b"<GIFT><O id=\"1\"/></GI", b"FT>", b"extra"]);
        let mut session = Session::from_transport(transport, "test");
        let capture = session
            .send(&Command::Open { gift: "1".to_string() })
            .unwrap()
            .receive_until(&plan().until("</GIFT>"))
            .unwrap();

        assert_eq!(capture.end, CaptureEnd::Terminator);
        assert_eq!(capture.attempts_used, 2);
        assert_eq!(capture.text(), "<GIFT><O id=\"1\"/></GIFT>");
    }

    #[test]
    fn test_timeout_ends_capture() {
        let transport = QueuedTransport::with_chunks(&[b"<MYPARAM>"]);
        let mut session = Session::from_transport(transport, "test");
        let capture = session
            .send(&Command::InventoryQuery)
            .unwrap()
            .receive_until(&plan().until("</MYPARAM>"))
            .unwrap();

        assert_eq!(capture.end, CaptureEnd::TimedOut);
        assert_eq!(capture.attempts_used, 2);
        assert!(!session.is_closed());
    }

    #[test]
    fn test_attempt_budget_is_respected() {
        let transport = QueuedTransport::with_chunks(&[b"a", b"b", b"c", b"d"]);
        let mut session = Session::from_transport(transport, "test");
        let capture = session
            .send(&Command::InventoryQuery)
            .unwrap()
            .receive_until(&ReadPlan::new(3, Duration::from_millis(1), 16).until("</MYPARAM>"))
            .unwrap();

        assert_eq!(capture.end, CaptureEnd::BudgetExhausted);
        assert_eq!(capture.bytes, b"abc".to_vec());
    }

    #[test]
    fn test_peer_close_closes_session() {
        let transport = QueuedTransport::with_chunks(&[b"bye", b""]);
        let mut session = Session::from_transport(transport, "test");
        let capture = session
            .send(&Command::InventoryQuery)
            .unwrap()
            .receive_until(&plan())
            .unwrap();

        assert_eq!(capture.end, CaptureEnd::Closed);
        assert!(session.is_closed());
        assert!(matches!(
            session.send(&Command::InventoryQuery),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn test_read_error_is_connection_lost() {
        let mut transport = QueuedTransport::default();
        transport
            .reads
            .push_back(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        let mut session = Session::from_transport(transport, "test");
        let result = session.send(&Command::InventoryQuery).unwrap().receive_until(&plan());

        assert!(matches!(result, Err(SessionError::ConnectionLost(_))));
        assert!(session.is_closed());
    }

    #[test]
    fn test_login_is_first_frame() {
        let identity = Identity {
            login: "farmer".to_string(),
            key: "k".to_string(),
            local_ip: "1.2.3.4".to_string(),
            client_version: "1".to_string(),
            version: "2".to_string(),
            lang: "en".to_string(),
        };
        let transport = QueuedTransport::with_chunks(&[b"<OK/>"]);
        let mut session =
            Session::establish(transport, "test", &identity, &ReadPlan::once(Duration::from_millis(5), 64))
                .unwrap();

        assert!(session.login_acknowledged());
        session.send(&Command::InventoryQuery).unwrap().discard();
        let written = &session.transport().written;
        assert!(written[0].starts_with(b"<LOGIN "));
        assert_eq!(written[1], b"<GETME />\0".to_vec());
        assert_eq!(session.commands_sent(), 2);
    }

    #[test]
    fn test_silent_login_still_yields_session() {
        let identity = Identity {
            login: "farmer".to_string(),
            key: "wrong".to_string(),
            local_ip: "1.2.3.4".to_string(),
            client_version: "1".to_string(),
            version: "2".to_string(),
            lang: "en".to_string(),
        };
        let session = Session::establish(
            QueuedTransport::default(),
            "test",
            &identity,
            &ReadPlan::once(Duration::from_millis(5), 64),
        )
        .unwrap();
        assert!(!session.login_acknowledged());
        assert!(!session.is_closed());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = Session::from_transport(QueuedTransport::default(), "test");
        session.close();
        session.close();
        assert_eq!(session.transport().shutdowns, 1);
    }
}
