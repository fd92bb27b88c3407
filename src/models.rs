use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resolved-redirect event with its contextual metadata.
///
/// The sequence inside a [`LinkRecord`] is append-only; insertion order is
/// chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRecord {
    pub timestamp: DateTime<Utc>,
    /// Referrer header value, `"direct"` if the request carried none.
    pub referrer: String,
    /// Raw client address (first entry of a forwarded-for chain if present).
    pub ip: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    /// Country code, `"unknown"` if geolocation failed.
    pub location: String,
}

/// A stored short link: the redirect target plus its click history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "shortCode")]
    pub short_code: String,
    #[serde(rename = "originalURL")]
    pub original_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiryAt")]
    pub expiry_at: DateTime<Utc>,
    pub clicks: Vec<ClickRecord>,
}

impl LinkRecord {
    /// A record is expired once the current time reaches `expiry_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_at <= now
    }
}

/// Request metadata captured by the caller for click recording.
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Result of a successful `create`: the allocated code and its expiry.
#[derive(Debug, Clone)]
pub struct CreatedLink {
    pub short_code: String,
    pub expiry_at: DateTime<Utc>,
}

/// Stats view of a link, visible even after expiry.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStats {
    #[serde(rename = "originalURL")]
    pub original_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiryAt")]
    pub expiry_at: DateTime<Utc>,
    #[serde(rename = "totalClicks")]
    pub total_clicks: usize,
    pub clicks: Vec<ClickRecord>,
}

impl From<LinkRecord> for LinkStats {
    fn from(record: LinkRecord) -> Self {
        Self {
            original_url: record.original_url,
            created_at: record.created_at,
            expiry_at: record.expiry_at,
            total_clicks: record.clicks.len(),
            clicks: record.clicks,
        }
    }
}
