//! This modules defines the common functionality for paging data with cursors.
//!
//! A page is requested with an optional cursor naming the last record the
//! client has already seen. Cursors are opaque to clients: they are the
//! URL-safe base64 encoding of the record's sort key.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::DatabaseId};

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The number of records per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest number of records a request may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Decide how many records to return for a request asking for `requested`.
    ///
    /// Missing sizes fall back to the default, everything else is clamped to
    /// `1..=max_page_size`.
    pub fn resolve_page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// The position of a record in the ledger's `(date, id)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The date of the last record on the previous page.
    pub date: Date,
    /// The ID of the last record on the previous page.
    pub id: DatabaseId,
}

impl Cursor {
    /// Encode the cursor as an opaque, URL-safe token.
    ///
    /// # Errors
    /// Returns [Error::JSONSerializationError] if the cursor cannot be serialized.
    pub fn encode(&self) -> Result<String, Error> {
        let bytes = serde_json::to_vec(self)
            .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decode a token created by [Cursor::encode].
    ///
    /// # Errors
    /// Returns [Error::InvalidCursor] if `token` was not created by [Cursor::encode].
    pub fn decode(token: &str) -> Result<Self, Error> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| Error::InvalidCursor)?;

        serde_json::from_slice(&bytes).map_err(|_| Error::InvalidCursor)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The records on this page.
    pub items: Vec<T>,
    /// The cursor to request the following page with, `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from a query that fetched up to `page_size + 1` rows.
    ///
    /// The extra row only signals that another page exists and is dropped.
    ///
    /// # Errors
    /// Returns an error if the next cursor cannot be encoded.
    pub fn from_overfetched(
        mut rows: Vec<T>,
        page_size: u64,
        cursor_of: impl Fn(&T) -> Cursor,
    ) -> Result<Self, Error> {
        let page_size = usize::try_from(page_size).unwrap_or(usize::MAX);
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);

        let next_cursor = match rows.last() {
            Some(last) if has_more => Some(cursor_of(last).encode()?),
            _ => None,
        };

        Ok(Self {
            items: rows,
            next_cursor,
        })
    }
}
