use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Black-box geolocation collaborator: IP in, country out.
///
/// `None` means the address could not be located; callers record the click
/// with location `"unknown"` in that case.
#[async_trait]
pub trait GeoLocator: Send + Sync + 'static {
    async fn lookup(&self, ip: &str) -> Option<String>;
}

/// Locator that never resolves anything. Used in tests and when geolocation
/// is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLocator;

#[async_trait]
impl GeoLocator for NullLocator {
    async fn lookup(&self, _ip: &str) -> Option<String> {
        None
    }
}

// ── ip-api.com backed locator ──────────────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

/// Country lookup via ip-api.com with an in-memory result cache.
///
/// Every outcome is cached, including misses, so a given IP triggers at most
/// one network request per server lifetime. Lookups run with a 3-second
/// timeout and can never stall a caller for long.
pub struct IpApiLocator {
    client: reqwest::Client,
    cache: Arc<DashMap<String, Option<String>>>,
}

impl IpApiLocator {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self {
            client,
            cache: Arc::new(DashMap::new()),
        })
    }

    async fn fetch_country(&self, ip: &str) -> Option<String> {
        let url = format!("http://ip-api.com/json/{}?fields=status,countryCode", ip);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| tracing::debug!("geo lookup network error for {}: {}", ip, e))
            .ok()?;

        let body: IpApiResponse = resp
            .json()
            .await
            .map_err(|e| tracing::debug!("geo lookup parse error for {}: {}", ip, e))
            .ok()?;

        if body.status != "success" {
            tracing::debug!("geo lookup returned non-success status for {}", ip);
            return None;
        }

        body.country_code.filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: &str) -> Option<String> {
        // Addresses that can never be geolocated
        if is_private(ip) {
            return None;
        }

        // Cache covers both successful hits and known misses
        if let Some(entry) = self.cache.get(ip) {
            return entry.clone();
        }

        let result = self.fetch_country(ip).await;

        // Store regardless of outcome so we don't retry endlessly
        self.cache.insert(ip.to_owned(), result.clone());

        result
    }
}

/// Return `true` for addresses that should never be sent to a public
/// geolocation API: loopback, link-local, private ranges, and IPv6 special
/// addresses.
fn is_private(ip_str: &str) -> bool {
    // Strip IPv6-mapped IPv4 prefix: "::ffff:1.2.3.4" → "1.2.3.4"
    let ip_str = ip_str.strip_prefix("::ffff:").unwrap_or(ip_str);

    match IpAddr::from_str(ip_str) {
        Ok(IpAddr::V4(addr)) => {
            let octets = addr.octets();
            addr.is_loopback()          // 127.x.x.x
            || addr.is_link_local()     // 169.254.x.x
            || addr.is_unspecified()    // 0.0.0.0
            || addr.is_broadcast()
            // 10.x.x.x
            || octets[0] == 10
            // 172.16.x.x – 172.31.x.x
            || (octets[0] == 172 && (16..=31).contains(&octets[1]))
            // 192.168.x.x
            || (octets[0] == 192 && octets[1] == 168)
        }
        Ok(IpAddr::V6(addr)) => {
            addr.is_loopback()       // ::1
            || addr.is_unspecified() // ::
            // fe80::/10  link-local
            || (addr.segments()[0] & 0xffc0) == 0xfe80
            // fc00::/7   unique-local
            || (addr.segments()[0] & 0xfe00) == 0xfc00
        }
        Err(_) => true, // unparseable → treat as private / skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_and_special_addresses_are_skipped() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.20.0.1",
            "192.168.1.50",
            "169.254.0.1",
            "0.0.0.0",
            "::1",
            "fe80::1",
            "fc00::1",
            "::ffff:192.168.0.1",
            "not-an-ip",
        ] {
            assert!(is_private(ip), "{ip} should be treated as private");
        }
    }

    #[test]
    fn public_addresses_are_not_skipped() {
        for ip in ["8.8.8.8", "203.0.113.7", "2001:4860:4860::8888", "::ffff:8.8.4.4"] {
            assert!(!is_private(ip), "{ip} should be treated as public");
        }
    }
}
