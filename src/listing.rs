//! Resource listing: the newline-delimited index of image names.
//!
//! The listing is fetched once, before any pipeline work starts. The body is
//! decoded as UTF-8 text directly (invalid sequences become U+FFFD), split on
//! `\n`, and a trailing `\r` is removed from each line. Identifiers are
//! otherwise kept as listed. Empty lines are dropped, so a trailing
//! newline or CRLF line endings never produce phantom identifiers.

use crate::transport::{Transport, TransportError};
use crate::types::ItemId;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Could not fetch listing from {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("Listing {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Split a listing body into identifiers, preserving order.
pub fn parse_listing(body: &[u8]) -> Vec<ItemId> {
    String::from_utf8_lossy(body)
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(ItemId::new)
        .collect()
}

/// Fetch and parse the listing at `base_url`.
///
/// Any non-2xx status is fatal for the run.
pub async fn fetch_listing(
    transport: &dyn Transport,
    base_url: &str,
) -> Result<Vec<ItemId>, ListingError> {
    debug!(url = base_url, "requesting listing");
    let response = transport
        .get(base_url)
        .await
        .map_err(|source| ListingError::Transport {
            url: base_url.to_string(),
            source,
        })?;

    if !response.is_success() {
        return Err(ListingError::Status {
            url: base_url.to_string(),
            status: response.status,
        });
    }

    let ids = parse_listing(&response.body);
    info!(count = ids.len(), "listing parsed");
    Ok(ids)
}
