pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{ClickRecord, LinkRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistent mapping from short code to link record.
///
/// Uniqueness lives here: `insert_if_absent` is a single atomic conditional
/// write, never a check followed by an insert, so two racing creates for the
/// same code can never both succeed.
#[async_trait]
pub trait ShortLinkStore: Send + Sync + 'static {
    /// Create a record for `code` only if none exists. Returns `None`,
    /// mutating nothing, when the code is already taken.
    async fn insert_if_absent(
        &self,
        code: &str,
        original_url: &str,
        expiry_at: DateTime<Utc>,
    ) -> Result<Option<LinkRecord>, StoreError>;

    /// Fetch the current record, including whatever clicks have been
    /// appended so far. A concurrent append may or may not be visible;
    /// the click list is always a consistent prefix.
    async fn get(&self, code: &str) -> Result<Option<LinkRecord>, StoreError>;

    /// Append a click to the record's history. Returns `false` if the code
    /// does not exist. Concurrent appends to one code are all preserved.
    async fn append_click(&self, code: &str, click: ClickRecord) -> Result<bool, StoreError>;
}
