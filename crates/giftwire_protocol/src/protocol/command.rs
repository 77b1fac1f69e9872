//! Outbound command catalogue and frame encoding.

use std::borrow::Cow;

use super::FRAME_TERMINATOR;
use crate::session::Identity;

/// Fixed filter the catalog query sends; the server answers with the
/// souvenir (container) catalog matching it.
pub const CATALOG_FILTER: &str = "808.5,808.21,802.0,899.0,905.0,873.0,900.0,901.0,0.89,943.0";

/// Every command the engine knows how to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Authenticate; always the first command on a new connection.
    Login(Identity),
    /// Request the full inventory (`GETME`).
    InventoryQuery,
    /// Open a container by identifier (`USE`).
    Open {
        /// Container identifier.
        gift: String,
    },
    /// Delete an inventory item (`DROP`). Quantity is always sent.
    Delete {
        /// Item identifier.
        id: String,
        /// Quantity to delete.
        count: u32,
    },
    /// Request the container catalog (`GH` with the fixed filter).
    CatalogQuery,
    /// Buy a catalog container and send it to another player (`GH`).
    Purchase {
        /// Recipient login.
        recipient: String,
        /// Catalog identifier of the container.
        souvenir: String,
    },
}

impl Command {
    /// Returns the wire tag name.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Login(_) => "LOGIN",
            Self::InventoryQuery => "GETME",
            Self::Open { .. } => "USE",
            Self::Delete { .. } => "DROP",
            Self::CatalogQuery | Self::Purchase { .. } => "GH",
        }
    }

    /// Returns the attributes in wire order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        match self {
            Self::Login(identity) => vec![
                ("v3", Cow::Borrowed(identity.local_ip.as_str())),
                ("lang", Cow::Borrowed(identity.lang.as_str())),
                ("v2", Cow::Borrowed(identity.client_version.as_str())),
                ("v", Cow::Borrowed(identity.version.as_str())),
                ("p", Cow::Borrowed(identity.key.as_str())),
                ("l", Cow::Borrowed(identity.login.as_str())),
            ],
            Self::InventoryQuery => Vec::new(),
            Self::Open { gift } => vec![("gift", Cow::Borrowed(gift.as_str()))],
            Self::Delete { id, count } => vec![
                ("id", Cow::Borrowed(id.as_str())),
                ("count", Cow::Owned(count.to_string())),
            ],
            Self::CatalogQuery => vec![("souvenir", Cow::Borrowed(CATALOG_FILTER))],
            Self::Purchase { recipient, souvenir } => vec![
                ("d", Cow::Borrowed("0")),
                ("t1", Cow::Borrowed("")),
                ("p", Cow::Borrowed("0")),
                ("login", Cow::Borrowed(recipient.as_str())),
                ("buysouvenir", Cow::Borrowed(souvenir.as_str())),
            ],
        }
    }

    /// Encodes the command as a complete NUL-terminated frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = String::with_capacity(64);
        frame.push('<');
        frame.push_str(self.tag());
        for (key, value) in self.attributes() {
            frame.push(' ');
            frame.push_str(key);
            frame.push_str("=\"");
            frame.push_str(&escape_attr(&value));
            frame.push('"');
        }
        frame.push_str(" />");

        let mut bytes = frame.into_bytes();
        bytes.push(FRAME_TERMINATOR);
        bytes
    }

    /// Short description for logs. Never includes credentials.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Login(identity) => format!("LOGIN l={}", identity.login),
            Self::Open { gift } => format!("USE gift={gift}"),
            Self::Delete { id, count } => format!("DROP id={id} count={count}"),
            Self::Purchase { recipient, souvenir } => {
                format!("GH login={recipient} buysouvenir={souvenir}")
            }
            Self::InventoryQuery | Self::CatalogQuery => self.tag().to_string(),
        }
    }
}

/// Escapes an attribute value for a double-quoted attribute.
#[must_use]
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '"', '<', '>']) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            login: "farmer".to_string(),
            key: "secret".to_string(),
            local_ip: "10.0.0.2".to_string(),
            client_version: "2.0.1".to_string(),
            version: "94".to_string(),
            lang: "ru".to_string(),
        }
    }

    #[test]
    fn test_inventory_query_frame() {
        assert_eq!(Command::InventoryQuery.encode(), b"<GETME />\0".to_vec());
    }

    #[test]
    fn test_login_attribute_order() {
        let frame = Command::Login(identity()).encode();
        assert_eq!(
            frame,
            b"<LOGIN v3=\"10.0.0.2\" lang=\"ru\" v2=\"2.0.1\" v=\"94\" p=\"secret\" l=\"farmer\" />\0"
                .to_vec()
        );
    }

    #[test]
    fn test_delete_always_carries_count() {
        let frame = Command::Delete { id: "77".to_string(), count: 1 }.encode();
        assert_eq!(frame, b"<DROP id=\"77\" count=\"1\" />\0".to_vec());
    }

    #[test]
    fn test_purchase_frame() {
        let frame = Command::Purchase {
            recipient: "farmer".to_string(),
            souvenir: "808.5".to_string(),
        }
        .encode();
        assert_eq!(
            frame,
            b"<GH d=\"0\" t1=\"\" p=\"0\" login=\"farmer\" buysouvenir=\"808.5\" />\0".to_vec()
        );
    }

    #[test]
    fn test_single_terminator_per_frame() {
        let frame = Command::CatalogQuery.encode();
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_TERMINATOR).count(), 1);
        assert_eq!(frame.last(), Some(&FRAME_TERMINATOR));
    }

    #[test]
    fn test_escape_attr() {
        assert!(matches!(escape_attr("plain"), Cow::Borrowed("plain")));
        assert_eq!(escape_attr("a\"b<c>&d"), "a&quot;b&lt;c&gt;&amp;d");
    }

    #[test]
    fn test_describe_hides_key() {
        let text = Command::Login(identity()).describe();
        assert!(!text.contains("secret"));
        assert!(text.contains("farmer"));
    }
}
