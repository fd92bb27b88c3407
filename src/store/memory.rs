use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::{ClickRecord, LinkRecord};
use crate::store::ShortLinkStore;

/// In-memory store backed by a DashMap.
///
/// DashMap shards its locks, so operations on different codes proceed in
/// parallel while operations on one code serialize on its shard. The entry
/// API makes `insert_if_absent` a single atomic step, and appends under
/// `get_mut` can never lose a click.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    links: Arc<DashMap<String, LinkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            links: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl ShortLinkStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        code: &str,
        original_url: &str,
        expiry_at: DateTime<Utc>,
    ) -> Result<Option<LinkRecord>, StoreError> {
        match self.links.entry(code.to_owned()) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let record = LinkRecord {
                    short_code: code.to_owned(),
                    original_url: original_url.to_owned(),
                    created_at: Utc::now(),
                    expiry_at,
                    clicks: Vec::new(),
                };
                slot.insert(record.clone());
                Ok(Some(record))
            }
        }
    }

    async fn get(&self, code: &str) -> Result<Option<LinkRecord>, StoreError> {
        Ok(self.links.get(code).map(|entry| entry.value().clone()))
    }

    async fn append_click(&self, code: &str, click: ClickRecord) -> Result<bool, StoreError> {
        match self.links.get_mut(code) {
            Some(mut entry) => {
                entry.clicks.push(click);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
