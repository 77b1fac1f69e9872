//! # Giftwire Protocol - The Tag Wire
//!
//! Session engine for a game server that speaks a framed, tag-based text
//! protocol over a plain TCP stream.
//!
//! ## Architecture
//!
//! - **Protocol**: self-closing tag commands terminated by a NUL byte, and
//!   attribute decoding of self-closing response elements
//! - **Transport**: bounded-read byte stream behind a trait (TCP in
//!   production, scripted servers in tests)
//! - **Session**: LOGIN-first connection with best-effort response capture
//!
//! ## Correlation Model
//!
//! ```text
//! CLIENT                           SERVER
//!   |                                 |
//!   |--- <GETME />\0 ---------------->|
//!   |<-- chunk, chunk, ... </MYPARAM> |   <- captured until terminator,
//!   |                                 |      timeout, or attempt budget
//!   |--- <USE gift="42" />\0 -------->|   <- only after the read above
//! ```
//!
//! Nothing on the wire ties a response to its command. One command in
//! flight per session is the whole correlation scheme.
//!
//! ## Example
//!
//! ```rust,ignore
//! use giftwire_protocol::{Command, Endpoint, ReadPlan, Session, INVENTORY_TERMINATOR};
//!
//! let mut session = Session::open(&endpoint, &identity, timeout, &login_plan)?;
//! let capture = session
//!     .send(&Command::InventoryQuery)?
//!     .receive_until(&inventory_plan.until(INVENTORY_TERMINATOR))?;
//! for element in giftwire_protocol::elements_named(&capture.text(), "O") {
//!     println!("{:?}", element.attr("txt"));
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::{SessionError, SessionResult};
pub use protocol::{
    elements, elements_named, status_code, Command, Element, INVENTORY_TERMINATOR, ITEM_TAG,
    OPEN_TERMINATOR,
};
pub use session::{Capture, CaptureEnd, Endpoint, Identity, Outstanding, ReadPlan, Session};
pub use transport::{ReadOutcome, TcpTransport, Transport, TransportStats};
