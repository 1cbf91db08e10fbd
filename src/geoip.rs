//! Country / ISP enrichment for IP addresses via an ip-api.com style service.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GeoError;

pub const DEFAULT_GEOIP_URL: &str = "http://ip-api.com/json/";
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const FIELDS: &str = "status,country,countryCode,city,isp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoInfo {
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub isp: String,
}

impl GeoInfo {
    fn marker(country: &str) -> Self {
        Self {
            country: country.to_string(),
            country_code: "XX".to_string(),
            city: String::new(),
            isp: String::new(),
        }
    }

    pub fn private() -> Self {
        Self {
            country: "Private".to_string(),
            country_code: "XX".to_string(),
            city: "Local Network".to_string(),
            isp: "Local".to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::marker("Unknown")
    }

    pub fn timeout() -> Self {
        Self::marker("Timeout")
    }

    pub fn error() -> Self {
        Self::marker("Error")
    }

    fn is_transient(&self) -> bool {
        self.country_code == "XX" && (self.country == "Timeout" || self.country == "Error")
    }
}

/// Body returned by the lookup service for `?fields=status,country,countryCode,city,isp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub status: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
}

impl From<LookupResponse> for GeoInfo {
    fn from(resp: LookupResponse) -> Self {
        if resp.status.as_deref() != Some("success") {
            return GeoInfo::unknown();
        }
        GeoInfo {
            country: resp.country.unwrap_or_else(|| "Unknown".to_string()),
            country_code: resp.country_code.unwrap_or_else(|| "XX".to_string()),
            city: resp.city.unwrap_or_default(),
            isp: resp.isp.unwrap_or_default(),
        }
    }
}

/// 10/8, 172.16/12, 192.168/16 and loopback.
pub fn is_private_ip(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.is_private() || addr.is_loopback())
        .unwrap_or(false)
}

/// Process-wide memo of lookups, least recently used entries evicted once
/// `capacity` is reached.
#[derive(Clone)]
pub struct GeoCache {
    inner: Arc<Mutex<LruCache<String, GeoInfo>>>,
}

impl GeoCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, ip: &str) -> Option<GeoInfo> {
        self.inner.lock().get(ip).cloned()
    }

    pub fn insert(&self, ip: impl Into<String>, info: GeoInfo) {
        self.inner.lock().put(ip.into(), info);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}

impl Default for GeoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[derive(Clone)]
pub struct GeoIpService {
    http: reqwest::Client,
    base_url: String,
    cache: GeoCache,
}

impl GeoIpService {
    pub fn new(base_url: impl Into<String>, cache: GeoCache) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            cache,
        })
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }

    async fn fetch(&self, ip: &str) -> Result<GeoInfo, GeoError> {
        let url = format!("{}{}", self.base_url, ip);
        let response = self
            .http
            .get(&url)
            .query(&[("fields", FIELDS)])
            .send()
            .await
            .map_err(|err| if err.is_timeout() { GeoError::Timeout } else { err.into() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body: LookupResponse = response.json().await?;
        Ok(body.into())
    }

    /// Location of `ip`. Never fails: private addresses, upstream errors and
    /// timeouts map to marker records. Markers for transient failures are not
    /// cached.
    pub async fn lookup(&self, ip: &str) -> GeoInfo {
        if is_private_ip(ip) {
            return GeoInfo::private();
        }
        if let Some(hit) = self.cache.get(ip) {
            return hit;
        }

        let info = match self.fetch(ip).await {
            Ok(info) => info,
            Err(GeoError::Status(code)) => {
                debug!(ip, code, "geolocation service refused lookup");
                GeoInfo::unknown()
            }
            Err(GeoError::Timeout) => {
                warn!(ip, "geolocation lookup timed out");
                GeoInfo::timeout()
            }
            Err(err) => {
                warn!(ip, error = %err, "geolocation lookup failed");
                GeoInfo::error()
            }
        };

        if !info.is_transient() {
            self.cache.insert(ip, info.clone());
        }
        info
    }

    pub async fn lookup_many<'a, I>(&self, ips: I) -> HashMap<String, GeoInfo>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut results = HashMap::new();
        for ip in ips {
            if !results.contains_key(ip) {
                let info = self.lookup(ip).await;
                results.insert(ip.to_string(), info);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(country: &str) -> GeoInfo {
        GeoInfo {
            country: country.to_string(),
            country_code: "DE".to_string(),
            city: "Berlin".to_string(),
            isp: "Example".to_string(),
        }
    }

    #[test]
    fn private_ranges() {
        for ip in ["10.1.2.3", "172.16.0.1", "172.31.255.254", "192.168.1.1", "127.0.0.1"] {
            assert!(is_private_ip(ip), "{ip}");
        }
        for ip in ["172.32.0.1", "8.8.8.8", "192.169.0.1", "not-an-ip", "::1"] {
            assert!(!is_private_ip(ip), "{ip}");
        }
    }

    #[test]
    fn successful_response_maps_fields() {
        let body = r#"{"status":"success","country":"Germany","countryCode":"DE","city":"Berlin","isp":"Hetzner"}"#;
        let resp: LookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            GeoInfo::from(resp),
            GeoInfo {
                country: "Germany".into(),
                country_code: "DE".into(),
                city: "Berlin".into(),
                isp: "Hetzner".into(),
            }
        );
    }

    #[test]
    fn failed_or_missing_status_is_unknown() {
        for body in [r#"{"status":"fail","message":"reserved range"}"#, r#"{}"#] {
            let resp: LookupResponse = serde_json::from_str(body).unwrap();
            assert_eq!(GeoInfo::from(resp), GeoInfo::unknown());
        }
    }

    #[test]
    fn partial_success_fills_defaults() {
        let resp: LookupResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        let geo = GeoInfo::from(resp);
        assert_eq!(geo.country, "Unknown");
        assert_eq!(geo.country_code, "XX");
        assert_eq!(geo.city, "");
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let cache = GeoCache::new(2);
        cache.insert("1.1.1.1", info("A"));
        cache.insert("2.2.2.2", info("B"));
        assert!(cache.get("1.1.1.1").is_some());

        cache.insert("3.3.3.3", info("C"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("2.2.2.2").is_none());
        assert_eq!(cache.get("1.1.1.1").unwrap().country, "A");
        assert_eq!(cache.get("3.3.3.3").unwrap().country, "C");
    }

    #[test]
    fn default_capacity() {
        assert_eq!(GeoCache::default().capacity(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(GeoCache::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn private_addresses_skip_the_network() {
        let service = GeoIpService::new("http://127.0.0.1:9/json/", GeoCache::default()).unwrap();
        assert_eq!(service.lookup("192.168.0.10").await, GeoInfo::private());
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn cached_entries_are_served_without_lookup() {
        let cache = GeoCache::default();
        cache.insert("203.0.113.5", info("Cached"));
        // port 9 (discard) is not listening; a real lookup would fail
        let service = GeoIpService::new("http://127.0.0.1:9/json/", cache).unwrap();
        assert_eq!(service.lookup("203.0.113.5").await.country, "Cached");
    }

    #[tokio::test]
    async fn unreachable_service_yields_uncached_error_marker() {
        let service = GeoIpService::new("http://127.0.0.1:9/json/", GeoCache::default()).unwrap();
        let geo = service.lookup("203.0.113.6").await;
        assert_eq!(geo.country_code, "XX");
        assert!(geo.country == "Error" || geo.country == "Timeout");
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn batch_lookup_deduplicates() {
        let service = GeoIpService::new("http://127.0.0.1:9/json/", GeoCache::default()).unwrap();
        let results = service.lookup_many(["10.0.0.1", "10.0.0.1", "127.0.0.1"]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["10.0.0.1"], GeoInfo::private());
    }
}
