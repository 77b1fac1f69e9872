//! # Tag Protocol
//!
//! Text commands and responses exchanged with the game server.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ <TAG a="v" b="w" />                                    │ \0  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ one self-closing tag, UTF-8            │ NUL terminator      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Responses are arbitrary markup streamed in server-sized chunks. The only
//! structure we rely on is the self-closing element (`<O id=".." txt=".."/>`)
//! and a closing tag that marks the end of a response type.
//!
//! ## Design Philosophy
//!
//! - No sequence numbers exist on the wire; correlation is positional
//! - Attribute lookup is exact-key (`max_count` never answers for `count`)
//! - Malformed input yields fewer elements, never an error

mod command;
mod element;

pub use command::{escape_attr, Command, CATALOG_FILTER};
pub use element::{elements, elements_named, status_code, unescape_attr, Element};

/// Frame terminator appended to every outbound command.
pub const FRAME_TERMINATOR: u8 = 0;

/// Closing tag that ends an inventory response.
pub const INVENTORY_TERMINATOR: &str = "</MYPARAM>";

/// Closing tag that ends a container-open response.
pub const OPEN_TERMINATOR: &str = "</GIFT>";

/// Element tag used for every item-like object in responses.
pub const ITEM_TAG: &str = "O";
