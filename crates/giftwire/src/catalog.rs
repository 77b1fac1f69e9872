//! Catalog query: which containers the server currently sells.

use giftwire_protocol::{elements, Command, Session, SessionResult, Transport, ITEM_TAG};

use crate::config::Tuning;

/// One purchasable container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Catalog identifier, used as `buysouvenir`.
    pub id: String,
    /// Display name; becomes an allow-list entry.
    pub name: String,
}

/// Decodes every element carrying both `id` and `txt`, in response order.
#[must_use]
pub fn parse_catalog(text: &str) -> Vec<CatalogEntry> {
    elements(text)
        .filter(|e| e.name == ITEM_TAG)
        .filter_map(|e| {
            let id = e.attr("id").filter(|v| !v.is_empty())?;
            let name = e.attr("txt").filter(|v| !v.is_empty())?;
            Some(CatalogEntry {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Sends the catalog query and reads until the server goes quiet.
///
/// # Errors
///
/// Only connection failures.
pub fn request_catalog<T: Transport>(
    session: &mut Session<T>,
    tuning: &Tuning,
) -> SessionResult<Vec<CatalogEntry>> {
    let capture = session
        .send(&Command::CatalogQuery)?
        .receive_until(&tuning.catalog.plan())?;
    let entries = parse_catalog(&capture.text());
    tracing::info!(entries = entries.len(), bytes = capture.len(), "catalog received");
    Ok(entries)
}
