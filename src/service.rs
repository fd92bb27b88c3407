use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::codegen::CodeGenerator;
use crate::error::ServiceError;
use crate::geo::GeoLocator;
use crate::models::{ClickContext, ClickRecord, CreatedLink, LinkStats};
use crate::oplog::{LogLevel, LogPackage, LogStack, OperatorLog};
use crate::store::ShortLinkStore;

/// Validity applied when the caller omits one or supplies a non-positive
/// value, in minutes.
const DEFAULT_VALIDITY_MINUTES: i64 = 30;

/// How many random codes to try before declaring the space exhausted.
///
/// With a 62^6 code space this colliding six times in a row is a practical
/// failure signal, not a true capacity check.
const MAX_GENERATE_ATTEMPTS: u32 = 6;

/// Orchestrates link creation, redirect resolution and stats over an
/// injected store, code generator, geolocator and operator log.
pub struct LinkService {
    store: Arc<dyn ShortLinkStore>,
    geo: Arc<dyn GeoLocator>,
    generator: CodeGenerator,
    oplog: OperatorLog,
}

impl LinkService {
    pub fn new(store: Arc<dyn ShortLinkStore>, geo: Arc<dyn GeoLocator>, oplog: OperatorLog) -> Self {
        Self {
            store,
            geo,
            generator: CodeGenerator::new(),
            oplog,
        }
    }

    /// Allocate a short code for `original_url`.
    ///
    /// A caller-supplied code gets exactly one insert attempt — a taken code
    /// is `CodeTaken`, never silently replaced by a generated one. Without a
    /// requested code, generation retries up to [`MAX_GENERATE_ATTEMPTS`]
    /// times before giving up with `CodeSpaceExhausted`.
    pub async fn create(
        &self,
        original_url: &str,
        validity_minutes: Option<i64>,
        requested_code: Option<&str>,
    ) -> Result<CreatedLink, ServiceError> {
        if original_url.trim().is_empty() {
            return Err(ServiceError::InvalidInput("url is required".into()));
        }

        let validity = match validity_minutes {
            Some(minutes) if minutes > 0 => minutes,
            _ => DEFAULT_VALIDITY_MINUTES,
        };
        // Converted to an absolute timestamp once, never re-evaluated.
        let expiry_at = Utc::now() + Duration::minutes(validity);

        let requested = requested_code.map(str::trim).filter(|code| !code.is_empty());

        let record = match requested {
            Some(code) => self
                .store
                .insert_if_absent(code, original_url, expiry_at)
                .await?
                .ok_or_else(|| ServiceError::CodeTaken(code.to_owned()))?,
            None => {
                let mut allocated = None;
                for _ in 0..MAX_GENERATE_ATTEMPTS {
                    let candidate = self.generator.generate();
                    if let Some(record) = self
                        .store
                        .insert_if_absent(&candidate, original_url, expiry_at)
                        .await?
                    {
                        allocated = Some(record);
                        break;
                    }
                }
                allocated.ok_or(ServiceError::CodeSpaceExhausted)?
            }
        };

        self.oplog.emit(
            LogStack::Backend,
            LogLevel::Info,
            LogPackage::Controller,
            format!("short URL created: {}", record.short_code),
            serde_json::json!({
                "shortCode": record.short_code,
                "expiry": record.expiry_at.to_rfc3339(),
            }),
        );

        Ok(CreatedLink {
            short_code: record.short_code,
            expiry_at: record.expiry_at,
        })
    }

    /// Resolve `code` to its original URL, recording the click.
    ///
    /// The redirect decision is made on the pre-append state: once the
    /// record is found and unexpired, a click-persistence failure is
    /// reported to the operator log and swallowed so the caller's redirect
    /// never breaks.
    pub async fn resolve(&self, code: &str, ctx: ClickContext) -> Result<String, ServiceError> {
        let record = self.store.get(code).await?.ok_or(ServiceError::NotFound)?;

        if record.is_expired(Utc::now()) {
            // Intact and queryable via stats, but no longer redirecting.
            // No click is recorded for an expired access.
            return Err(ServiceError::Expired);
        }

        let location = match ctx.ip.as_deref() {
            Some(ip) => self.geo.lookup(ip).await,
            None => None,
        };

        let click = ClickRecord {
            timestamp: Utc::now(),
            referrer: ctx.referrer.unwrap_or_else(|| "direct".into()),
            ip: ctx.ip.unwrap_or_default(),
            user_agent: ctx.user_agent.unwrap_or_default(),
            location: location.unwrap_or_else(|| "unknown".into()),
        };

        match self.store.append_click(code, click).await {
            Ok(true) => {}
            // Deletion is out of scope here, so a vanished record is not
            // expected; surface it rather than pretending the click landed.
            Ok(false) => return Err(ServiceError::NotFound),
            Err(e) => {
                tracing::warn!("click append failed for '{}': {}", code, e);
                self.oplog.emit(
                    LogStack::Backend,
                    LogLevel::Error,
                    LogPackage::Service,
                    format!("click recording failed for {code}"),
                    serde_json::json!({ "error": e.to_string() }),
                );
            }
        }

        Ok(record.original_url)
    }

    /// Pure read of a link's stats. Expired links remain visible.
    pub async fn stats(&self, code: &str) -> Result<LinkStats, ServiceError> {
        let record = self.store.get(code).await?.ok_or(ServiceError::NotFound)?;
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::geo::NullLocator;
    use crate::models::LinkRecord;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service_over(store: Arc<dyn ShortLinkStore>) -> LinkService {
        LinkService::new(store, Arc::new(NullLocator), OperatorLog::disabled())
    }

    fn memory_service() -> (LinkService, MemoryStore) {
        let store = MemoryStore::new();
        (service_over(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn create_then_resolve_round_trips_the_url() {
        let (service, _) = memory_service();

        let created = service
            .create("https://example.com/some?page=1", Some(30), None)
            .await
            .unwrap();
        assert_eq!(created.short_code.len(), 6);
        assert!(created.short_code.chars().all(|c| c.is_ascii_alphanumeric()));

        let stats = service.stats(&created.short_code).await.unwrap();
        assert_eq!(stats.original_url, "https://example.com/some?page=1");
        assert_eq!(stats.total_clicks, 0);

        let url = service
            .resolve(&created.short_code, ClickContext::default())
            .await
            .unwrap();
        assert_eq!(url, "https://example.com/some?page=1");
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let (service, _) = memory_service();
        let err = service.create("   ", Some(30), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn validity_defaults_to_thirty_minutes() {
        let (service, _) = memory_service();

        for validity in [None, Some(0), Some(-5)] {
            let before = Utc::now();
            let created = service
                .create("https://example.com", validity, None)
                .await
                .unwrap();
            let expected = before + Duration::minutes(30);
            let drift = (created.expiry_at - expected).num_seconds().abs();
            assert!(drift <= 1, "expiry drifted {drift}s for validity {validity:?}");
        }
    }

    #[tokio::test]
    async fn requested_code_is_honored_and_not_replaced_when_taken() {
        let (service, _) = memory_service();

        let created = service
            .create("https://a.example", Some(30), Some("promo"))
            .await
            .unwrap();
        assert_eq!(created.short_code, "promo");

        let err = service
            .create("https://b.example", Some(30), Some("promo"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CodeTaken(code) if code == "promo"));

        // The winner's target is untouched.
        let stats = service.stats("promo").await.unwrap();
        assert_eq!(stats.original_url, "https://a.example");
    }

    #[tokio::test]
    async fn blank_requested_code_falls_back_to_generation() {
        let (service, _) = memory_service();
        let created = service
            .create("https://example.com", Some(30), Some("  "))
            .await
            .unwrap();
        assert_eq!(created.short_code.len(), 6);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found_for_resolve_and_stats() {
        let (service, _) = memory_service();
        assert!(matches!(
            service.resolve("nosuch", ClickContext::default()).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(service.stats("nosuch").await, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn expired_links_reject_redirects_without_recording_clicks() {
        let (service, store) = memory_service();

        // Seed a record whose expiry is already in the past.
        store
            .insert_if_absent("oldone", "https://example.com", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert!(matches!(
            service.resolve("oldone", ClickContext::default()).await,
            Err(ServiceError::Expired)
        ));

        // Stats stay visible after expiry and show no click was appended.
        let stats = service.stats("oldone").await.unwrap();
        assert_eq!(stats.total_clicks, 0);
    }

    #[tokio::test]
    async fn resolve_records_click_metadata_with_defaults() {
        let (service, _) = memory_service();
        let created = service
            .create("https://example.com", Some(30), None)
            .await
            .unwrap();

        service
            .resolve(
                &created.short_code,
                ClickContext {
                    ip: Some("203.0.113.7".into()),
                    user_agent: Some("curl/8.0".into()),
                    referrer: None,
                },
            )
            .await
            .unwrap();

        let stats = service.stats(&created.short_code).await.unwrap();
        assert_eq!(stats.total_clicks, 1);
        let click = &stats.clicks[0];
        assert_eq!(click.referrer, "direct");
        assert_eq!(click.ip, "203.0.113.7");
        assert_eq!(click.user_agent, "curl/8.0");
        assert_eq!(click.location, "unknown");
    }

    #[tokio::test]
    async fn concurrent_resolves_lose_no_clicks() {
        let (service, store) = memory_service();
        let created = service
            .create("https://example.com", Some(30), None)
            .await
            .unwrap();

        let service = Arc::new(service_over(Arc::new(store)));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let service = service.clone();
            let code = created.short_code.clone();
            handles.push(tokio::spawn(async move {
                service.resolve(&code, ClickContext::default()).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = service.stats(&created.short_code).await.unwrap();
        assert_eq!(stats.total_clicks, 50);
    }

    // ── Stub stores for the failure paths ──────────────────────────────────

    /// Store whose code space is "full": every insert reports a collision.
    struct SaturatedStore {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ShortLinkStore for SaturatedStore {
        async fn insert_if_absent(
            &self,
            _code: &str,
            _original_url: &str,
            _expiry_at: DateTime<Utc>,
        ) -> Result<Option<LinkRecord>, StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn get(&self, _code: &str) -> Result<Option<LinkRecord>, StoreError> {
            Ok(None)
        }

        async fn append_click(
            &self,
            _code: &str,
            _click: ClickRecord,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn generation_gives_up_after_bounded_attempts() {
        let store = Arc::new(SaturatedStore {
            attempts: AtomicU32::new(0),
        });
        let service = service_over(store.clone());

        let err = service
            .create("https://example.com", Some(30), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CodeSpaceExhausted));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 6);
    }

    /// Store that is down: every operation fails.
    struct DownStore;

    #[async_trait]
    impl ShortLinkStore for DownStore {
        async fn insert_if_absent(
            &self,
            _code: &str,
            _original_url: &str,
            _expiry_at: DateTime<Utc>,
        ) -> Result<Option<LinkRecord>, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }

        async fn get(&self, _code: &str) -> Result<Option<LinkRecord>, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }

        async fn append_click(
            &self,
            _code: &str,
            _click: ClickRecord,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_unavailable() {
        let service = service_over(Arc::new(DownStore));

        assert!(matches!(
            service.create("https://example.com", Some(30), None).await,
            Err(ServiceError::StorageUnavailable(_))
        ));
        assert!(matches!(
            service.resolve("abc123", ClickContext::default()).await,
            Err(ServiceError::StorageUnavailable(_))
        ));
        assert!(matches!(
            service.stats("abc123").await,
            Err(ServiceError::StorageUnavailable(_))
        ));
    }

    /// Store where reads succeed but appends fail, to pin down the
    /// best-effort click contract.
    struct AppendFailsStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ShortLinkStore for AppendFailsStore {
        async fn insert_if_absent(
            &self,
            code: &str,
            original_url: &str,
            expiry_at: DateTime<Utc>,
        ) -> Result<Option<LinkRecord>, StoreError> {
            self.inner.insert_if_absent(code, original_url, expiry_at).await
        }

        async fn get(&self, code: &str) -> Result<Option<LinkRecord>, StoreError> {
            self.inner.get(code).await
        }

        async fn append_click(
            &self,
            _code: &str,
            _click: ClickRecord,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("disk full")))
        }
    }

    #[tokio::test]
    async fn click_persistence_failure_does_not_break_the_redirect() {
        let store = Arc::new(AppendFailsStore {
            inner: MemoryStore::new(),
        });
        let service = service_over(store);

        let created = service
            .create("https://example.com", Some(30), None)
            .await
            .unwrap();

        let url = service
            .resolve(&created.short_code, ClickContext::default())
            .await
            .unwrap();
        assert_eq!(url, "https://example.com");
    }
}
