//! # Transport Layer
//!
//! Byte-stream transport beneath a [`Session`](crate::Session).
//!
//! ## Design
//!
//! - Plain TCP, one stream per session
//! - Every read is bounded by a caller-supplied timeout
//! - A trait seam so engine logic runs against scripted servers in tests

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Smallest read timeout handed to the socket; a zero timeout is rejected
/// by the OS API.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Result of one bounded read attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were read into the front of the buffer.
    Data(usize),
    /// Nothing arrived within the attempt's timeout.
    TimedOut,
    /// The peer closed the stream.
    Closed,
}

/// A bidirectional byte stream to the game server.
///
/// Implementations must never block longer than the timeout passed to
/// [`read_chunk`](Transport::read_chunk).
pub trait Transport {
    /// Writes one complete frame.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Reads whatever is available, waiting at most `timeout`.
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadOutcome>;

    /// Closes the stream. Must be idempotent.
    fn shutdown(&mut self);
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    /// Frames written.
    pub frames_sent: u64,
    /// Bytes written.
    pub bytes_sent: u64,
    /// Read attempts that returned data.
    pub chunks_received: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Read attempts that timed out.
    pub read_timeouts: u64,
}

/// TCP transport.
///
/// A thin wrapper around [`TcpStream`] with:
/// - Connect timeout across every resolved address
/// - `TCP_NODELAY` (frames are small and latency-bound)
/// - Per-read timeouts
pub struct TcpTransport {
    /// The underlying stream.
    stream: TcpStream,
    /// Remote address actually connected to.
    peer_addr: SocketAddr,
    /// Read timeout currently configured on the socket.
    current_timeout: Option<Duration>,
    /// Statistics.
    stats: TransportStats,
    /// Set once `shutdown` ran.
    shut: bool,
}

impl TcpTransport {
    /// Connects to `host:port`, trying each resolved address in turn.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;

        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(Self {
                        stream,
                        peer_addr: addr,
                        current_timeout: None,
                        stats: TransportStats::default(),
                        shut: false,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{host}: no addresses resolved"))
        }))
    }

    /// Returns the remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

impl Transport for TcpTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadOutcome> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        if self.current_timeout != Some(timeout) {
            self.stream.set_read_timeout(Some(timeout))?;
            self.current_timeout = Some(timeout);
        }

        read_classified(&mut self.stream, buf, &mut self.stats)
    }

    fn shutdown(&mut self) {
        if !self.shut {
            // Peer may already be gone; nothing useful to do with the error.
            let _ = self.stream.shutdown(Shutdown::Both);
            self.shut = true;
        }
    }
}

/// One read, classified. A signal interrupting the read retries it
/// instead of ending the attempt early.
fn read_classified<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    stats: &mut TransportStats,
) -> io::Result<ReadOutcome> {
    let result = loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            other => break other,
        }
    };

    match result {
        Ok(0) => Ok(ReadOutcome::Closed),
        Ok(n) => {
            stats.chunks_received += 1;
            stats.bytes_received += n as u64;
            Ok(ReadOutcome::Data(n))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            stats.read_timeouts += 1;
            Ok(ReadOutcome::TimedOut)
        }
        Err(e) => Err(e),
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
