//! Types shared between pipeline stages.
//!
//! Payloads are plain owned byte buffers. Each stage takes its input by value
//! and hands its output on by value, so a buffer is only ever reachable from
//! the unit of work currently holding it.

use serde::Serialize;
use std::fmt;

/// Opaque name of one remote image, appended verbatim to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An identifier together with its position in the listing.
///
/// The index carries no meaning beyond labelling log and progress lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub id: ItemId,
}

impl WorkItem {
    /// Number every identifier by its listing position.
    pub fn enumerate(ids: Vec<ItemId>) -> Vec<WorkItem> {
        ids.into_iter()
            .enumerate()
            .map(|(index, id)| WorkItem { index, id })
            .collect()
    }
}

/// Bytes exactly as received from the fetch request.
#[derive(Debug)]
pub struct RawPayload {
    pub item: WorkItem,
    pub bytes: Vec<u8>,
}

/// Mirrored, re-encoded bytes ready to be posted back.
#[derive(Debug)]
pub struct TransformedPayload {
    pub item: WorkItem,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
