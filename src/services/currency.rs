//! Exchange-rate lookup with a TTL cache and tiered fallback.
//!
//! A lookup degrades through four tiers and never fails because of the
//! upstream provider:
//!
//! 1. fresh cache (`(base, "USD")` younger than the TTL, non-empty set)
//! 2. live fetch, persisted into the cache
//! 3. stale cache for the base, whatever its age
//! 4. a small built-in table for USD and EUR
//!
//! Concurrent lookups for the same base may both hit the provider; the last
//! write to the cache wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::CurrencyConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::storage::{CurrencyRate, Storage};

/// Target used to decide whether a base's cached set is fresh.
const FRESHNESS_TARGET: &str = "USD";

/// A validated ISO-4217-style code: exactly three ASCII uppercase letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(code: &str) -> ToolboxResult<Self> {
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code.to_string()))
        } else {
            Err(ToolboxError::InvalidInput(format!(
                "'{}' is not a 3-letter currency code",
                code
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a snapshot's rates came from. Anything but `Live` and `Cache` should
/// be presented as approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateSource {
    Cache,
    Live,
    StaleCache,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatesSnapshot {
    pub rates: BTreeMap<String, f64>,
    pub base: String,
    pub timestamp: DateTime<Utc>,
    pub source: RateSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionQuote {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub result: f64,
    pub timestamp: DateTime<Utc>,
    pub source: RateSource,
}

/// Upstream source of exchange-rate tables.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch every `target -> rate` pair quoted against `base`.
    async fn fetch_rates(&self, base: &CurrencyCode) -> ToolboxResult<HashMap<String, f64>>;
}

#[derive(Deserialize)]
struct UpstreamResponse {
    rates: HashMap<String, f64>,
}

/// Provider for exchangerate-api style endpoints returning `{"rates": {...}}`.
pub struct HttpRateProvider {
    client: reqwest::Client,
    url_template: String,
}

impl HttpRateProvider {
    pub fn new(config: &CurrencyConfig) -> ToolboxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("toolbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url_template: config.api_url.clone(),
        })
    }

    fn url_for(&self, base: &CurrencyCode) -> String {
        self.url_template.replace("{base}", base.as_str())
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self, base: &CurrencyCode) -> ToolboxResult<HashMap<String, f64>> {
        let url = self.url_for(base);
        tracing::debug!("Fetching exchange rates from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolboxError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolboxError::Upstream(format!(
                "rate provider returned {}",
                status
            )));
        }

        let body: UpstreamResponse = response
            .json()
            .await
            .map_err(|e| ToolboxError::Upstream(format!("malformed response: {}", e)))?;

        Ok(body.rates)
    }
}

/// Approximate rates served when neither the provider nor the cache can
/// answer. Only USD and EUR bases are covered.
fn fallback_rates(base: &str) -> BTreeMap<String, f64> {
    let table: &[(&str, f64)] = match base {
        "USD" => &[
            ("EUR", 0.92),
            ("GBP", 0.79),
            ("JPY", 150.0),
            ("INR", 83.0),
            ("CAD", 1.36),
            ("AUD", 1.52),
            ("CHF", 0.88),
            ("CNY", 7.2),
        ],
        "EUR" => &[
            ("USD", 1.09),
            ("GBP", 0.86),
            ("JPY", 163.0),
            ("INR", 90.0),
            ("CAD", 1.48),
            ("AUD", 1.65),
            ("CHF", 0.96),
            ("CNY", 7.8),
        ],
        _ => &[],
    };

    table.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Drop pairs that would break the `rate > 0` invariant.
fn sanitize(rates: HashMap<String, f64>) -> BTreeMap<String, f64> {
    rates
        .into_iter()
        .filter(|(code, rate)| {
            let ok = rate.is_finite() && *rate > 0.0;
            if !ok {
                tracing::warn!("Ignoring invalid rate {} for {}", rate, code);
            }
            ok
        })
        .collect()
}

pub struct CurrencyService {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn RateProvider>,
    ttl: chrono::Duration,
}

impl CurrencyService {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn RateProvider>,
        ttl: std::time::Duration,
    ) -> Self {
        Self {
            storage,
            provider,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }

    /// Rates for `base`, degrading through cache, live fetch, stale cache and
    /// the built-in table.
    pub async fn get_exchange_rates(&self, base: &CurrencyCode) -> RatesSnapshot {
        self.get_exchange_rates_at(base, Utc::now()).await
    }

    pub async fn get_exchange_rates_at(
        &self,
        base: &CurrencyCode,
        now: DateTime<Utc>,
    ) -> RatesSnapshot {
        match self.fresh_cached(base, now) {
            Ok(Some(snapshot)) => {
                tracing::debug!("Serving cached rates for {}", base);
                return snapshot;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Rate cache lookup failed for {}: {}", base, e),
        }

        match self.provider.fetch_rates(base).await {
            Ok(rates) => {
                let rates = sanitize(rates);
                if !rates.is_empty() {
                    self.persist(base, &rates, now);
                    return RatesSnapshot {
                        rates,
                        base: base.to_string(),
                        timestamp: now,
                        source: RateSource::Live,
                    };
                }
                tracing::warn!("Rate provider returned no usable rates for {}", base);
            }
            Err(e) => tracing::warn!("Rate fetch failed for {}: {}", base, e),
        }

        if let Some(snapshot) = self.stale_cached(base) {
            tracing::info!("Serving stale cached rates for {}", base);
            return snapshot;
        }

        tracing::warn!("No rates available for {}, using built-in table", base);
        RatesSnapshot {
            rates: fallback_rates(base.as_str()),
            base: base.to_string(),
            timestamp: now,
            source: RateSource::Fallback,
        }
    }

    /// Convert `amount` from one currency into another.
    pub async fn convert(
        &self,
        amount: f64,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> ToolboxResult<ConversionQuote> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ToolboxError::InvalidInput(
                "amount must be a non-negative number".to_string(),
            ));
        }

        let snapshot = self.get_exchange_rates(from).await;
        let rate = if from == to {
            1.0
        } else {
            *snapshot
                .rates
                .get(to.as_str())
                .ok_or_else(|| ToolboxError::NotFound(format!("no rate for {} -> {}", from, to)))?
        };

        Ok(ConversionQuote {
            amount,
            from: from.to_string(),
            to: to.to_string(),
            rate,
            result: amount * rate,
            timestamp: snapshot.timestamp,
            source: snapshot.source,
        })
    }

    fn fresh_cached(
        &self,
        base: &CurrencyCode,
        now: DateTime<Utc>,
    ) -> ToolboxResult<Option<RatesSnapshot>> {
        let Some(marker) = self.storage.get_rate(base.as_str(), FRESHNESS_TARGET)? else {
            return Ok(None);
        };
        if !marker.is_fresh(now, self.ttl) {
            return Ok(None);
        }

        let cached = self.storage.rates_for_base(base.as_str())?;
        if cached.is_empty() {
            return Ok(None);
        }

        Ok(Some(RatesSnapshot {
            rates: to_map(&cached),
            base: base.to_string(),
            timestamp: marker.last_updated,
            source: RateSource::Cache,
        }))
    }

    fn stale_cached(&self, base: &CurrencyCode) -> Option<RatesSnapshot> {
        let cached = match self.storage.rates_for_base(base.as_str()) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Rate cache lookup failed for {}: {}", base, e);
                return None;
            }
        };
        let timestamp = cached.iter().map(|r| r.last_updated).max()?;

        Some(RatesSnapshot {
            rates: to_map(&cached),
            base: base.to_string(),
            timestamp,
            source: RateSource::StaleCache,
        })
    }

    fn persist(&self, base: &CurrencyCode, rates: &BTreeMap<String, f64>, now: DateTime<Utc>) {
        for (target, rate) in rates {
            let entry = CurrencyRate::new(base.as_str(), target, *rate, now);
            if let Err(e) = self.storage.upsert_rate(entry) {
                tracing::warn!("Failed to cache rate {}/{}: {}", base, target, e);
            }
        }
    }
}

fn to_map(rates: &[CurrencyRate]) -> BTreeMap<String, f64> {
    rates
        .iter()
        .map(|r| (r.target_currency.clone(), r.rate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockProvider {
        calls: AtomicUsize,
        fail: AtomicBool,
        rates: HashMap<String, f64>,
    }

    impl MockProvider {
        fn new(rates: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                rates: rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            })
        }

        fn failing() -> Arc<Self> {
            let provider = Self::new(&[]);
            provider.fail.store(true, Ordering::SeqCst);
            provider
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        async fn fetch_rates(&self, _base: &CurrencyCode) -> ToolboxResult<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(ToolboxError::Upstream("network unreachable".into()))
            } else {
                Ok(self.rates.clone())
            }
        }
    }

    fn service(provider: Arc<MockProvider>) -> CurrencyService {
        CurrencyService::new(
            Arc::new(MemStorage::new()),
            provider,
            Duration::from_secs(3600),
        )
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[test]
    fn test_currency_code_validation() {
        assert!(CurrencyCode::parse("USD").is_ok());
        for bad in ["usd", "US", "USDX", "U$D", "", "ÉUR"] {
            assert!(CurrencyCode::parse(bad).is_err(), "{} accepted", bad);
        }
    }

    #[tokio::test]
    async fn test_unreachable_network_uses_fallback() {
        let service = service(MockProvider::failing());

        let usd = service.get_exchange_rates(&code("USD")).await;
        assert_eq!(usd.source, RateSource::Fallback);
        assert!(usd.rates.contains_key("EUR"));
        assert!(!usd.rates.contains_key("USD"));

        let chf = service.get_exchange_rates(&code("CHF")).await;
        assert_eq!(chf.source, RateSource::Fallback);
        assert!(chf.rates.is_empty());
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cached() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", 0.9), ("GBP", 0.8)]);
        let service = service(provider.clone());
        let now = Utc::now();

        let first = service.get_exchange_rates_at(&code("USD"), now).await;
        assert_eq!(first.source, RateSource::Live);

        let second = service
            .get_exchange_rates_at(&code("USD"), now + chrono::Duration::minutes(59))
            .await;
        assert_eq!(second.source, RateSource::Cache);
        assert_eq!(second.timestamp, now);
        assert_eq!(second.rates, first.rates);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", 0.9)]);
        let service = service(provider.clone());
        let now = Utc::now();

        service.get_exchange_rates_at(&code("USD"), now).await;
        let later = service
            .get_exchange_rates_at(&code("USD"), now + chrono::Duration::hours(2))
            .await;
        assert_eq!(later.source, RateSource::Live);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_network_failure_serves_stale_cache() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", 0.9)]);
        let service = service(provider.clone());
        let now = Utc::now();

        service.get_exchange_rates_at(&code("USD"), now).await;
        provider.fail.store(true, Ordering::SeqCst);

        let stale = service
            .get_exchange_rates_at(&code("USD"), now + chrono::Duration::hours(3))
            .await;
        assert_eq!(stale.source, RateSource::StaleCache);
        assert_eq!(stale.rates.get("EUR"), Some(&0.9));
        assert_eq!(stale.timestamp, now);
    }

    #[tokio::test]
    async fn test_failure_within_ttl_still_returns_first_rates() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", 0.9)]);
        let service = service(provider.clone());

        let first = service.get_exchange_rates(&code("USD")).await;
        provider.fail.store(true, Ordering::SeqCst);
        let second = service.get_exchange_rates(&code("USD")).await;

        assert_eq!(second.rates, first.rates);
        assert_ne!(second.source, RateSource::Fallback);
    }

    #[tokio::test]
    async fn test_missing_freshness_marker_refetches() {
        // Upstream omits USD, so the cached set is never considered fresh.
        let provider = MockProvider::new(&[("EUR", 0.9)]);
        let service = service(provider.clone());

        service.get_exchange_rates(&code("GBP")).await;
        service.get_exchange_rates(&code("GBP")).await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_rates_are_dropped() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", -2.0), ("XXX", f64::NAN)]);
        let service = service(provider);

        let snapshot = service.get_exchange_rates(&code("USD")).await;
        assert_eq!(snapshot.rates.len(), 1);
        assert!(snapshot.rates.contains_key("USD"));
    }

    #[tokio::test]
    async fn test_convert() {
        let provider = MockProvider::new(&[("USD", 1.0), ("EUR", 0.5)]);
        let service = service(provider);

        let quote = service.convert(10.0, &code("USD"), &code("EUR")).await.unwrap();
        assert_eq!(quote.result, 5.0);
        assert_eq!(quote.rate, 0.5);

        let same = service.convert(3.0, &code("USD"), &code("USD")).await.unwrap();
        assert_eq!(same.result, 3.0);

        assert!(service.convert(1.0, &code("USD"), &code("ZZZ")).await.is_err());
        assert!(service.convert(-1.0, &code("USD"), &code("EUR")).await.is_err());
    }

    async fn spawn_upstream() -> String {
        use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};

        let app = Router::new()
            .route(
                "/ok/:base",
                get(|Path(base): Path<String>| async move {
                    Json(serde_json::json!({"base": base, "rates": {"USD": 1, "EUR": 0.91}}))
                }),
            )
            .route(
                "/down/:base",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/garbage/:base", get(|| async { "not json" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn http_provider(url: String) -> HttpRateProvider {
        HttpRateProvider::new(&CurrencyConfig {
            api_url: url,
            ttl_secs: 3600,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_provider() {
        let root = spawn_upstream().await;

        let ok = http_provider(format!("{}/ok/{{base}}", root));
        let rates = ok.fetch_rates(&code("USD")).await.unwrap();
        assert_eq!(rates.get("EUR"), Some(&0.91));
        assert_eq!(rates.get("USD"), Some(&1.0));

        let down = http_provider(format!("{}/down/{{base}}", root));
        assert!(matches!(
            down.fetch_rates(&code("USD")).await,
            Err(ToolboxError::Upstream(_))
        ));

        let garbage = http_provider(format!("{}/garbage/{{base}}", root));
        assert!(matches!(
            garbage.fetch_rates(&code("USD")).await,
            Err(ToolboxError::Upstream(_))
        ));
    }
}
